use crate::core::types::{AuthCode, ChallengeId, OpaqueToken};
use crate::oidc::types::Nonce;
use crate::rp::session::SessionId;

pub trait FromRandom {
    fn from_random() -> Self;
}

impl FromRandom for AuthCode {
    fn from_random() -> Self {
        AuthCode(random_string(64))
    }
}

impl FromRandom for ChallengeId {
    fn from_random() -> Self {
        ChallengeId(random_string(64))
    }
}

impl FromRandom for Nonce {
    fn from_random() -> Self {
        Nonce(random_string(32))
    }
}

impl FromRandom for SessionId {
    fn from_random() -> Self {
        SessionId(random_string(64))
    }
}

impl OpaqueToken {
    pub fn new_access() -> Self {
        OpaqueToken(random_string(64))
    }

    pub fn new_refresh() -> Self {
        OpaqueToken(random_string(128))
    }
}

pub fn random_state() -> String {
    random_string(32)
}

pub fn random_string(size: usize) -> String {
    use rand::Rng;

    let s: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(size)
        .map(|b| b as char)
        .collect();
    base64::encode_config(s, base64::URL_SAFE_NO_PAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_strings_are_unique() {
        let a = random_string(64);
        let b = random_string(64);
        assert_ne!(a, b);
    }

    #[test]
    fn random_strings_are_url_safe() {
        let s = random_string(64);
        assert!(s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
