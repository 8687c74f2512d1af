use sha2::{Digest, Sha256};

use crate::util::{hash, random};

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum Transformation {
    #[serde(rename = "plain")]
    Plain,
    S256,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::Plain
    }
}

#[derive(Debug, Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Challenge {
    #[serde(rename = "code_challenge")]
    pub code: String,
    #[serde(rename = "code_challenge_method")]
    #[serde(default)]
    pub method: Transformation,
}

#[derive(Debug, Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Verifier {
    #[serde(rename = "code_verifier")]
    pub value: String,
}

impl Verifier {
    /// Fresh verifier with its S256 challenge, for the requesting side.
    pub fn new_pair() -> (Verifier, Challenge) {
        let value = random::random_string(64);
        let challenge = Challenge {
            code: s256(&value),
            method: Transformation::S256,
        };
        (Verifier { value }, challenge)
    }
}

pub fn s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::encode_config(digest, base64::URL_SAFE_NO_PAD)
}

/// Check a presented verifier against the challenge bound at authorization
/// time. Comparisons are constant-time.
pub fn verify(challenge: &Challenge, verifier: Option<&Verifier>) -> Result<(), ()> {
    let verifier = verifier.ok_or(())?;

    let derived = match challenge.method {
        Transformation::S256 => s256(&verifier.value),
        Transformation::Plain => verifier.value.clone(),
    };

    if hash::constant_time_eq(&derived, &challenge.code) {
        Ok(())
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_known_vector() {
        // RFC 7636 appendix B
        assert_eq!(
            s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verify_matching_pair() {
        let (verifier, challenge) = Verifier::new_pair();
        assert!(verify(&challenge, Some(&verifier)).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_verifier() {
        let (_, challenge) = Verifier::new_pair();
        let wrong = Verifier {
            value: "some-other-verifier".to_string(),
        };
        assert!(verify(&challenge, Some(&wrong)).is_err());
    }

    #[test]
    fn verify_rejects_missing_verifier() {
        let (_, challenge) = Verifier::new_pair();
        assert!(verify(&challenge, None).is_err());
    }

    #[test]
    fn plain_compares_literally() {
        let challenge = Challenge {
            code: "plain-value".to_string(),
            method: Transformation::Plain,
        };
        let verifier = Verifier {
            value: "plain-value".to_string(),
        };
        assert!(verify(&challenge, Some(&verifier)).is_ok());
    }
}
