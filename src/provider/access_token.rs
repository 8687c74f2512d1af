use tracing::{event, Level};

use crate::auth::{
    pkce, AccessTokenError, AccessTokenErrorKind, AccessTokenResponse, ClientCredentials,
    MaybeTokenRequest, Store, TokenRequest,
};
use crate::core::models::GrantType;
use crate::oidc::IdTokenResponse;

use super::token::TokenService;
use super::OidcProvider;

impl OidcProvider {
    #[tracing::instrument(skip_all, fields(client_id = ?credentials.client_id))]
    pub async fn access_token_request(
        &self,
        credentials: ClientCredentials,
        req: MaybeTokenRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError> {
        event!(Level::TRACE, "Handling access token request");
        let client = self.check_client_authentication(&credentials).await?;

        let req = match req {
            MaybeTokenRequest::Known(req) => req,
            MaybeTokenRequest::Unknown(grant) => {
                // A known grant_type that failed to parse is a malformed
                // request, not an unsupported grant.
                let kind = match grant.grant_type.as_str() {
                    "authorization_code" | "refresh_token" => AccessTokenErrorKind::InvalidRequest,
                    _ => AccessTokenErrorKind::UnsupportedGrantType,
                };
                event!(Level::DEBUG, grant_type = %grant.grant_type, "Rejecting grant");
                return Err(kind.into());
            }
        };

        let now = self.clock.now_unix();

        match req {
            TokenRequest::AuthorizationCode(req) => {
                event!(Level::TRACE, "Handling authorization_code grant");
                if !client.allows_grant_type(GrantType::AuthorizationCode) {
                    return Err(AccessTokenErrorKind::UnauthorizedClient.into());
                }

                let hashed_code = self.hasher.hash_without_salt(&req.code);

                // Atomic take: replaying a consumed code lands here again and
                // fails, whatever happened to the first redemption.
                let data = self
                    .store
                    .take_authcode_data(&client.id, &hashed_code, now)
                    .await
                    .map_err(|_| AccessTokenErrorKind::InvalidGrant)?;

                if let Some(challenge) = &data.pkce_challenge {
                    event!(Level::DEBUG, "Verifying PKCE challenge");
                    pkce::verify(challenge, req.pkce_verifier.as_ref())
                        .map_err(|_| AccessTokenErrorKind::InvalidGrant)?;
                }

                if data.redirect_uri != req.redirect_uri {
                    return Err(AccessTokenErrorKind::InvalidGrant.into());
                }

                let access_token = self
                    .issue_access_token(&client.id, &data.subject, &data.scope)
                    .await
                    .map_err(|_| AccessTokenErrorKind::InvalidRequest)?;

                let oidc = if data.scope.has_openid() {
                    event!(Level::DEBUG, "Attaching id_token to code grant");
                    let id_token = self
                        .token
                        .new_id_token(
                            &client.id,
                            &data.subject,
                            data.nonce.as_ref(),
                            data.auth_time,
                            Some(&access_token),
                        )
                        .map_err(|_| AccessTokenErrorKind::InvalidRequest)?;
                    Some(IdTokenResponse { id_token })
                } else {
                    None
                };

                let refresh_token = if client.allows_grant_type(GrantType::RefreshToken) {
                    Some(
                        self.issue_refresh_token(&client.id, &data.subject, &data.scope)
                            .await
                            .map_err(|_| AccessTokenErrorKind::InvalidRequest)?,
                    )
                } else {
                    None
                };

                Ok(AccessTokenResponse {
                    access_token,
                    token_type: TokenService::token_type(),
                    expires_in: Some(self.token.ttl().access_secs),
                    refresh_token,
                    oidc,
                })
            }
            TokenRequest::RefreshToken(req) => {
                event!(Level::TRACE, "Handling refresh_token grant");
                if !client.allows_grant_type(GrantType::RefreshToken) {
                    return Err(AccessTokenErrorKind::UnauthorizedClient.into());
                }

                let hashed = self.hasher.hash_without_salt(&req.refresh_token);

                // Rotation policy: always rotate. The presented token is
                // taken here; a replacement is issued below.
                let seed = self
                    .store
                    .take_refresh_token(&hashed, now)
                    .await
                    .map_err(|_| AccessTokenErrorKind::InvalidGrant)?;

                if client.id != seed.client_id {
                    event!(
                        Level::WARN,
                        original_client_id = ?seed.client_id,
                        refresh_client_id = ?client.id,
                        "client_ids do not match"
                    );
                    return Err(AccessTokenErrorKind::InvalidGrant.into());
                }

                let scope = match req.scope {
                    Some(scope) => {
                        if seed.scope.contains_all(&scope) {
                            scope
                        } else {
                            // This scope was not in the original grant
                            return Err(AccessTokenErrorKind::InvalidScope.into());
                        }
                    }
                    None => seed.scope.clone(),
                };

                let access_token = self
                    .issue_access_token(&client.id, &seed.subject, &scope)
                    .await
                    .map_err(|_| AccessTokenErrorKind::InvalidRequest)?;

                let oidc = if scope.has_openid() {
                    let id_token = self
                        .token
                        .new_id_token(&client.id, &seed.subject, None, now, Some(&access_token))
                        .map_err(|_| AccessTokenErrorKind::InvalidRequest)?;
                    Some(IdTokenResponse { id_token })
                } else {
                    None
                };

                let refresh_token = self
                    .issue_refresh_token(&client.id, &seed.subject, &seed.scope)
                    .await
                    .map_err(|_| AccessTokenErrorKind::InvalidRequest)?;

                Ok(AccessTokenResponse {
                    access_token,
                    token_type: TokenService::token_type(),
                    expires_in: Some(self.token.ttl().access_secs),
                    refresh_token: Some(refresh_token),
                    oidc,
                })
            }
        }
    }
}
