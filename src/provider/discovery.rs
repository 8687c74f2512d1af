use super::Config;

/// The OP metadata published at `/.well-known/openid-configuration`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub end_session_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

impl DiscoveryDocument {
    pub fn new(config: &Config) -> Self {
        let issuer = config.issuer.trim_end_matches('/').to_string();
        let at = |path: &str| format!("{}{}", issuer, path);

        let code_challenge_methods_supported = if config.allow_plain_pkce {
            vec!["S256".to_string(), "plain".to_string()]
        } else {
            vec!["S256".to_string()]
        };

        Self {
            authorization_endpoint: at("/auth"),
            token_endpoint: at("/token"),
            userinfo_endpoint: at("/userinfo"),
            jwks_uri: at("/jwks"),
            end_session_endpoint: at("/session/end"),
            issuer,
            response_types_supported: ["code", "id_token", "id_token token", "code id_token"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            response_modes_supported: ["query", "fragment"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            grant_types_supported: ["authorization_code", "implicit", "refresh_token"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            scopes_supported: ["openid", "profile", "email"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            subject_types_supported: vec!["public".to_string()],
            id_token_signing_alg_values_supported: vec!["RS256".to_string()],
            token_endpoint_auth_methods_supported: ["client_secret_basic", "client_secret_post"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            code_challenge_methods_supported,
            claims_supported: ["sub", "name", "email", "auth_time"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::token::TokenTtl;

    #[test]
    fn endpoints_hang_off_issuer() {
        let config = Config {
            issuer: "http://localhost:4000/".to_string(),
            listen: "127.0.0.1:4000".parse().unwrap(),
            rp_base_url: "http://localhost:3000".to_string(),
            client_id: "rp-client".to_string(),
            client_secret: "rp-secret".to_string(),
            hash_secret: "hash".to_string(),
            dev_auto_approve: true,
            allow_plain_pkce: false,
            ttl: TokenTtl::default(),
        };

        let doc = DiscoveryDocument::new(&config);
        assert_eq!(doc.issuer, "http://localhost:4000");
        assert_eq!(doc.authorization_endpoint, "http://localhost:4000/auth");
        assert_eq!(doc.jwks_uri, "http://localhost:4000/jwks");
        assert_eq!(doc.end_session_endpoint, "http://localhost:4000/session/end");
        assert_eq!(doc.code_challenge_methods_supported, vec!["S256"]);
    }
}
