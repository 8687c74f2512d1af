use std::collections::HashSet;

use crate::auth::pkce;
use crate::oidc::types::Nonce;

use super::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Web,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Implicit,
    RefreshToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
}

/// A registered client. Redirect URIs are exact-match sets; a presented URI
/// that is not literally registered is rejected, never corrected.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub secret: HashedClientSecret,
    pub application_type: ApplicationType,
    pub redirect_uris: HashSet<RedirectUri>,
    pub post_logout_redirect_uris: HashSet<RedirectUri>,
    pub grant_types: HashSet<GrantType>,
    pub response_types: HashSet<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
}

impl Client {
    pub fn allows_redirect_uri(&self, uri: &RedirectUri) -> bool {
        self.redirect_uris.contains(uri)
    }

    pub fn allows_post_logout_redirect_uri(&self, uri: &RedirectUri) -> bool {
        self.post_logout_redirect_uris.contains(uri)
    }

    pub fn allows_response_type(&self, response_type: &str) -> bool {
        self.response_types.contains(response_type)
    }

    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

/// Everything a stored authorization code is bound to. The code itself is
/// kept only as a digest; redemption re-derives the digest and takes the row.
#[derive(Debug, Clone)]
pub struct AuthCodeData {
    pub code: HashedAuthCode,
    pub client_id: ClientId,
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    pub subject: String,
    pub nonce: Option<Nonce>,
    pub pkce_challenge: Option<pkce::Challenge>,
    pub auth_time: u64,
    pub expires_at: Expiry,
}

/// Server-side claims behind an opaque access token.
#[derive(Debug, Clone)]
pub struct AccessTokenData {
    pub client_id: ClientId,
    pub subject: String,
    pub scope: Scope,
    pub expires_at: Expiry,
}

/// Server-side claims behind an opaque refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenData {
    pub client_id: ClientId,
    pub subject: String,
    pub scope: Scope,
    pub expires_at: Expiry,
}
