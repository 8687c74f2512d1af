use crate::core::types::Scope;
use crate::oidc::types::Nonce;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IdClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    pub auth_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
    pub azp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
}

/// Userinfo response, filtered by granted scope. The account directory is
/// synthesized from the subject; this OP exists to exercise the protocol,
/// not to manage users.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct UserInfoClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserInfoClaims {
    pub fn for_subject(subject: &str, scope: &Scope) -> Self {
        Self {
            sub: subject.to_string(),
            name: scope.contains("profile").then(|| subject.to_string()),
            email: scope
                .contains("email")
                .then(|| format!("{}@torii.example", subject)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinfo_respects_scope() {
        let full = UserInfoClaims::for_subject(
            "alice",
            &Scope::from_delimited_parts("openid profile email"),
        );
        assert_eq!(full.sub, "alice");
        assert_eq!(full.name.as_deref(), Some("alice"));
        assert_eq!(full.email.as_deref(), Some("alice@torii.example"));

        let bare = UserInfoClaims::for_subject("alice", &Scope::from_delimited_parts("openid"));
        assert_eq!(bare.sub, "alice");
        assert!(bare.name.is_none());
        assert!(bare.email.is_none());
    }
}
