use tracing::{event, Level};

use crate::auth::{error::ErrorResponse, Store};
use crate::core::types::{BearerToken, OpaqueToken};

use super::claims::UserInfoClaims;
use super::OidcProvider;

pub type UserInfoError = ErrorResponse<UserInfoErrorKind>;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserInfoErrorKind {
    InvalidToken,
}

impl OidcProvider {
    /// Resolve an opaque bearer access token into the subject's claims,
    /// filtered by the scope the token was granted with.
    #[tracing::instrument(skip_all)]
    pub async fn userinfo_request(
        &self,
        token: BearerToken,
    ) -> Result<UserInfoClaims, UserInfoError> {
        let opaque = OpaqueToken(token.0);
        let hashed = self.hasher.hash_without_salt(&opaque);

        let data = self
            .store
            .get_access_token(&hashed, self.clock.now_unix())
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                event!(Level::DEBUG, "Rejecting unknown or expired access token");
                ErrorResponse::new(UserInfoErrorKind::InvalidToken)
            })?;

        Ok(UserInfoClaims::for_subject(&data.subject, &data.scope))
    }
}
