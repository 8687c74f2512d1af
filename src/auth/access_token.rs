use crate::auth::pkce;
use crate::core::types::{AuthCode, OpaqueToken, RedirectUri, Scope};
use crate::oidc::IdTokenResponse;

use super::error::ErrorResponse;

pub type AccessTokenError = ErrorResponse<AccessTokenErrorKind>;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub enum TokenType {
    Bearer,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "grant_type")]
pub enum TokenRequest {
    #[serde(rename = "authorization_code")]
    AuthorizationCode(AuthorizationCodeTokenRequest),
    #[serde(rename = "refresh_token")]
    RefreshToken(RefreshTokenRequest),
}

/// Accepts any well-formed body so that an unrecognized grant_type can be
/// answered with `unsupported_grant_type` instead of a bare parse failure.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum MaybeTokenRequest {
    Known(TokenRequest),
    Unknown(UnknownGrant),
}

#[derive(Debug, serde::Deserialize)]
pub struct UnknownGrant {
    pub grant_type: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct AuthorizationCodeTokenRequest {
    pub redirect_uri: RedirectUri,
    pub code: AuthCode,
    #[serde(flatten)]
    pub pkce_verifier: Option<pkce::Verifier>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: OpaqueToken,
    pub scope: Option<Scope>,
}

#[derive(serde::Serialize, Debug)]
pub struct AccessTokenResponse {
    pub access_token: OpaqueToken,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<OpaqueToken>,
    #[serde(flatten)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc: Option<IdTokenResponse>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTokenErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
}

impl From<AccessTokenErrorKind> for AccessTokenError {
    fn from(kind: AccessTokenErrorKind) -> Self {
        ErrorResponse::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_code_grant_form() {
        let body = "grant_type=authorization_code&code=abc&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback&code_verifier=ver";
        let req: MaybeTokenRequest = serde_urlencoded::from_str(body).unwrap();
        match req {
            MaybeTokenRequest::Known(TokenRequest::AuthorizationCode(req)) => {
                assert_eq!(req.code.0, "abc");
                assert_eq!(req.pkce_verifier.unwrap().value, "ver");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn unknown_grant_type_is_captured() {
        let body = "grant_type=device_code&device_code=xyz";
        let req: MaybeTokenRequest = serde_urlencoded::from_str(body).unwrap();
        match req {
            MaybeTokenRequest::Unknown(grant) => assert_eq!(grant.grant_type, "device_code"),
            other => panic!("unexpected parse: {:?}", other),
        }
    }
}
