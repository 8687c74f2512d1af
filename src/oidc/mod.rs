pub mod jwks;
pub mod types;

use crate::core::types::Scope;

impl Scope {
    pub fn has_openid(&self) -> bool {
        self.contains("openid")
    }
}

/// The OpenID Connect extension to a token response.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IdTokenResponse {
    pub id_token: String,
}
