use tracing::{event, Level};

use crate::auth::{Redirect, Store};
use crate::core::types::{ClientId, RedirectUri};

use super::OidcProvider;

#[derive(Debug, serde::Deserialize)]
pub struct EndSessionRequest {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<RedirectUri>,
    pub state: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct EndSessionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Where the user-agent ends up after the OP session is destroyed.
#[derive(Debug)]
pub enum EndSessionOutcome {
    Redirect(Redirect<EndSessionParams>),
    /// No (valid) continuation target; a plain confirmation page is shown.
    Page,
}

#[derive(Debug)]
pub struct BadEndSessionRequest;

impl OidcProvider {
    /// RP-initiated logout. A post-logout redirect is only followed when the
    /// id_token_hint identifies the client and the URI is literally
    /// registered for it; nothing is ever corrected or guessed.
    #[tracing::instrument(skip_all)]
    pub async fn end_session_request(
        &self,
        req: EndSessionRequest,
    ) -> Result<EndSessionOutcome, BadEndSessionRequest> {
        let uri = match req.post_logout_redirect_uri {
            Some(uri) => uri,
            None => return Ok(EndSessionOutcome::Page),
        };

        let hint = req.id_token_hint.ok_or(BadEndSessionRequest)?;
        let claims = self
            .token
            .decode_own_id_token(&hint)
            .map_err(|_| BadEndSessionRequest)?;

        let client = self
            .store
            .get_client(&ClientId(claims.aud.clone()))
            .await
            .ok()
            .flatten()
            .ok_or(BadEndSessionRequest)?;

        if !client.allows_post_logout_redirect_uri(&uri) {
            event!(
                Level::WARN,
                client_id = ?client.id,
                uri = %uri.0,
                "Rejecting unregistered post-logout redirect"
            );
            return Err(BadEndSessionRequest);
        }

        event!(Level::DEBUG, client_id = ?client.id, "Ending session");
        Ok(EndSessionOutcome::Redirect(Redirect::query(
            uri,
            EndSessionParams { state: req.state },
        )))
    }
}
