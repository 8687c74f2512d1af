use tracing::{event, Level};

use crate::auth::{
    AuthorizationError, AuthorizationErrorKind, AuthorizationRequest, AuthorizationResponse,
    BadAuthorizationRequest, Challenge, ChallengeData, ChallengeInfo, CodeResponse, Decision,
    HybridResponse, ImplicitResponse, MaybeChallenge, Redirect, ResponseMode, Store,
};
use crate::core::models::AuthCodeData;
use crate::core::types::{AuthCode, ChallengeId, Expiry};
use crate::util::random::FromRandom;

use super::token::TokenService;
use super::OidcProvider;

/// Fallback subject when dev interactions auto-approve a request that names
/// no login_hint, mirroring a development-mode "any user" prompt.
const DEV_SUBJECT: &str = "user";

impl OidcProvider {
    /// Run an authorization request through validation and, when no
    /// interaction is needed, straight to artifact issuance.
    ///
    /// `session_user` is the subject bound to the OP's own browser session,
    /// if any. `prompt=login`/`prompt=consent` ignores it.
    #[tracing::instrument(skip_all)]
    pub async fn authorization_request(
        &self,
        req: AuthorizationRequest,
        session_user: Option<String>,
    ) -> Result<MaybeChallenge<Redirect<AuthorizationResponse>>, AuthorizationError> {
        let parts = req.as_parts();

        let client = self
            .store
            .get_client(parts.client_id)
            .await
            .map_err(|_| AuthorizationError::direct(BadAuthorizationRequest::ServerError))?
            .ok_or_else(|| AuthorizationError::direct(BadAuthorizationRequest::UnknownClient))?;

        // No redirect may be trusted until the URI is known to be registered.
        if !client.allows_redirect_uri(parts.redirect_uri) {
            return Err(AuthorizationError::direct(
                BadAuthorizationRequest::BadRedirect,
            ));
        }

        let uri = parts.redirect_uri.clone();
        let state = parts.state.clone();
        let mode = req.effective_response_mode();

        if !client.allows_response_type(req.response_type()) {
            return Err(AuthorizationError::redirect(
                uri,
                mode,
                AuthorizationErrorKind::UnsupportedResponseType.with_state(state),
            ));
        }

        if !parts.scope.has_openid() {
            return Err(AuthorizationError::redirect(
                uri,
                mode,
                AuthorizationErrorKind::InvalidScope
                    .describe("scope must include openid", state),
            ));
        }

        if req.front_channels_tokens() && parts.response_mode == Some(ResponseMode::Query) {
            return Err(AuthorizationError::redirect(
                uri,
                mode,
                AuthorizationErrorKind::InvalidRequest
                    .describe("response_mode=query cannot deliver credentials", state),
            ));
        }

        if let Some(challenge) = req.pkce_challenge() {
            use crate::auth::pkce::Transformation;
            if challenge.method == Transformation::Plain && !self.config.allow_plain_pkce {
                return Err(AuthorizationError::redirect(
                    uri,
                    mode,
                    AuthorizationErrorKind::InvalidRequest
                        .describe("code_challenge_method must be S256", state),
                ));
            }
        }

        let forced_interaction = req
            .prompt()
            .map(|p| p.requires_interaction())
            .unwrap_or(false);

        let subject = if forced_interaction {
            None
        } else if let Some(user) = session_user {
            Some(user)
        } else if self.config.dev_auto_approve {
            Some(req.login_hint().unwrap_or(DEV_SUBJECT).to_string())
        } else {
            None
        };

        match subject {
            Some(subject) => self
                .finish_authorization(req, &subject)
                .await
                .map(MaybeChallenge::Accept),
            None => {
                let info = ChallengeData::new(&req, self.clock.now_unix());
                let challenge = Challenge {
                    id: info.id.clone(),
                };

                self.store.store_challenge_data(info).await.map_err(|_| {
                    AuthorizationError::redirect(
                        uri,
                        mode,
                        AuthorizationErrorKind::ServerError.with_state(state),
                    )
                })?;

                event!(
                    Level::DEBUG,
                    client_id = ?parts.client_id,
                    challenge_id = ?challenge.id,
                    "Parking request for interaction"
                );
                Ok(MaybeChallenge::Challenge(challenge))
            }
        }
    }

    /// Issue the artifacts the response type asks for and wrap them for
    /// delivery in the effective response mode.
    pub(crate) async fn finish_authorization(
        &self,
        req: AuthorizationRequest,
        subject: &str,
    ) -> Result<Redirect<AuthorizationResponse>, AuthorizationError> {
        let now = self.clock.now_unix();
        let mode = req.effective_response_mode();
        let parts = req.as_parts();
        let uri = parts.redirect_uri.clone();
        let state = parts.state.clone();
        let client_id = parts.client_id.clone();
        let scope = parts.scope.clone();

        let server_error = |state: &Option<String>| {
            AuthorizationErrorKind::ServerError.with_state(state.clone())
        };

        let response = match req {
            AuthorizationRequest::Code(ref data) => {
                let code = self
                    .mint_code(&req, subject, now)
                    .await
                    .map_err(|_| AuthorizationError::redirect(
                        uri.clone(),
                        mode,
                        server_error(&state),
                    ))?;
                AuthorizationResponse::Code(CodeResponse {
                    code,
                    state: data.state.clone(),
                })
            }
            AuthorizationRequest::IdToken(ref data) => {
                let id_token = self
                    .token
                    .new_id_token(&client_id, subject, Some(&data.ext.oidc.nonce), now, None)
                    .map_err(|_| AuthorizationError::redirect(
                        uri.clone(),
                        mode,
                        server_error(&state),
                    ))?;
                AuthorizationResponse::Implicit(ImplicitResponse {
                    id_token,
                    access_token: None,
                    token_type: None,
                    expires_in: None,
                    state: data.state.clone(),
                })
            }
            AuthorizationRequest::IdTokenToken(ref data) => {
                let issued = async {
                    let access_token = self
                        .issue_access_token(&client_id, subject, &scope)
                        .await?;
                    let id_token = self.token.new_id_token(
                        &client_id,
                        subject,
                        Some(&data.ext.oidc.nonce),
                        now,
                        Some(&access_token),
                    )?;
                    Ok::<_, super::error::Error>((access_token, id_token))
                }
                .await
                .map_err(|_| AuthorizationError::redirect(
                    uri.clone(),
                    mode,
                    server_error(&state),
                ))?;

                AuthorizationResponse::Implicit(ImplicitResponse {
                    id_token: issued.1,
                    access_token: Some(issued.0),
                    token_type: Some(TokenService::token_type()),
                    expires_in: Some(self.token.ttl().access_secs),
                    state: data.state.clone(),
                })
            }
            AuthorizationRequest::CodeIdToken(ref data) => {
                let issued = async {
                    let code = self.mint_code(&req, subject, now).await?;
                    let id_token = self.token.new_id_token(
                        &client_id,
                        subject,
                        Some(&data.ext.oidc.nonce),
                        now,
                        None,
                    )?;
                    Ok::<_, super::error::Error>((code, id_token))
                }
                .await
                .map_err(|_| AuthorizationError::redirect(
                    uri.clone(),
                    mode,
                    server_error(&state),
                ))?;

                AuthorizationResponse::Hybrid(HybridResponse {
                    code: issued.0,
                    id_token: issued.1,
                    state: data.state.clone(),
                })
            }
        };

        event!(
            Level::DEBUG,
            client_id = ?client_id,
            subject = %subject,
            "Issuing authorization response"
        );
        Ok(Redirect::with_mode(uri, mode, response))
    }

    async fn mint_code(
        &self,
        req: &AuthorizationRequest,
        subject: &str,
        now: u64,
    ) -> Result<AuthCode, super::error::Error> {
        let parts = req.as_parts();
        let code = AuthCode::from_random();
        let hashed = self.hasher.hash_without_salt(&code);

        let data = AuthCodeData {
            code: hashed,
            client_id: parts.client_id.clone(),
            redirect_uri: parts.redirect_uri.clone(),
            scope: parts.scope.clone(),
            subject: subject.to_string(),
            nonce: req.nonce().cloned(),
            pkce_challenge: req.pkce_challenge().cloned(),
            auth_time: now,
            expires_at: Expiry::after(now, self.token.ttl().code_secs),
        };

        self.store.store_code(data).await?;
        Ok(code)
    }

    pub async fn get_challenge_info(&self, id: &ChallengeId) -> Option<ChallengeInfo> {
        self.store
            .get_challenge_data(id, self.clock.now_unix())
            .await
            .ok()
            .flatten()
            .map(|data| ChallengeInfo::from(&data))
    }

    /// Resume a parked request with the end-user's decision. The challenge
    /// is taken, not read: a decision can only be applied once.
    pub async fn decide_challenge(
        &self,
        id: &ChallengeId,
        decision: Decision,
    ) -> Result<(String, Redirect<AuthorizationResponse>), AuthorizationError> {
        let data = self
            .store
            .take_challenge_data(id, self.clock.now_unix())
            .await
            .map_err(|_| AuthorizationError::direct(BadAuthorizationRequest::BadChallenge))?;

        let parts = data.req.as_parts();
        let uri = parts.redirect_uri.clone();
        let state = parts.state.clone();
        let mode = data.req.effective_response_mode();

        match decision {
            Decision::Accept { subject } => {
                let redirect = self.finish_authorization(data.req, &subject).await?;
                Ok((subject, redirect))
            }
            Decision::Reject => Err(AuthorizationError::redirect(
                uri,
                mode,
                AuthorizationErrorKind::AccessDenied.with_state(state),
            )),
        }
    }
}
