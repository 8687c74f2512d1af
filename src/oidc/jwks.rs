use serde::{Deserialize, Serialize};

/// Published form of a verification key. Only the public RSA members are
/// carried; private key material never leaves the key store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_key_by_kid() {
        let jwks = Jwks {
            keys: vec![
                Jwk {
                    kty: "RSA".to_string(),
                    kid: "a".to_string(),
                    use_: "sig".to_string(),
                    alg: "RS256".to_string(),
                    n: Some("AQAB".to_string()),
                    e: Some("AQAB".to_string()),
                },
                Jwk {
                    kty: "RSA".to_string(),
                    kid: "b".to_string(),
                    use_: "sig".to_string(),
                    alg: "RS256".to_string(),
                    n: Some("AQAB".to_string()),
                    e: Some("AQAB".to_string()),
                },
            ],
        };

        assert_eq!(jwks.find_key("b").map(|k| k.kid.as_str()), Some("b"));
        assert!(jwks.find_key("missing").is_none());
    }
}
