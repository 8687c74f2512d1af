use crate::core::types::{
    AuthCode, ClientSecret, HashedAuthCode, HashedClientSecret, HashedToken, OpaqueToken,
};

use super::random;

#[derive(Debug)]
pub struct Salt(pub String);

impl Salt {
    fn from_random() -> Self {
        Salt(random::random_string(16))
    }
}

#[derive(Debug)]
pub struct HashingService {
    secret_key: String,
}

pub trait HashTo: AsRef<str> {
    type HashedType;
}

impl HashTo for ClientSecret {
    type HashedType = HashedClientSecret;
}

impl HashTo for AuthCode {
    type HashedType = HashedAuthCode;
}

impl HashTo for OpaqueToken {
    type HashedType = HashedToken;
}

impl HashingService {
    pub fn with_secret_key(secret_key: String) -> Self {
        Self { secret_key }
    }

    fn get_config(&self) -> argon2::Config {
        let mut config = argon2::Config::default();
        config.secret = &self.secret_key.as_bytes();
        config
    }

    pub fn hash<T, H>(&self, to_hash: &T) -> Result<H, ()>
    where
        T: HashTo<HashedType = H>,
        H: From<String>,
    {
        let s = to_hash.as_ref();
        let salt = Salt::from_random();
        let hash = argon2::hash_encoded(s.as_bytes(), salt.0.as_bytes(), &self.get_config())
            .map_err(|_| ())?;

        Ok(hash.into())
    }

    pub fn verify<T, H>(&self, secret: &T, hashed: &H) -> Result<bool, ()>
    where
        T: HashTo<HashedType = H>,
        H: AsRef<str>,
    {
        let hashed = hashed.as_ref();
        argon2::verify_encoded_ext(
            hashed,
            secret.as_ref().as_bytes(),
            &self.secret_key.as_bytes(),
            &[],
        )
        .map_err(|_| ())
    }

    /// Digest for single-use credentials (codes, opaque tokens). The store
    /// keys rows by this digest, so lookups never compare raw token bytes.
    pub fn hash_without_salt<T, H>(&self, to_hash: &T) -> H
    where
        T: HashTo<HashedType = H>,
        H: From<String>,
    {
        use sha2::Digest;

        let to_hash = to_hash.as_ref();
        let digest = sha2::Sha512::digest(to_hash.as_bytes());
        let hash = base64::encode_config(digest, base64::URL_SAFE);
        hash.into()
    }
}

/// Constant-time string equality for values an attacker may probe.
pub fn constant_time_eq(lhs: &str, rhs: &str) -> bool {
    use subtle::ConstantTimeEq;

    lhs.as_bytes().ct_eq(rhs.as_bytes()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_hash_verifies() {
        let hasher = HashingService::with_secret_key("test-hash-secret".to_string());
        let secret = ClientSecret("rp-secret".to_string());
        let hashed: HashedClientSecret = hasher.hash(&secret).unwrap();

        assert_eq!(hasher.verify(&secret, &hashed), Ok(true));
        let wrong = ClientSecret("not-the-secret".to_string());
        assert_eq!(hasher.verify(&wrong, &hashed), Ok(false));
    }

    #[test]
    fn unsalted_hash_is_stable() {
        let hasher = HashingService::with_secret_key("test-hash-secret".to_string());
        let code = AuthCode("abcdef".to_string());
        let a: HashedAuthCode = hasher.hash_without_salt(&code);
        let b: HashedAuthCode = hasher.hash_without_salt(&code);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_time_eq_matches() {
        assert!(constant_time_eq("same", "same"));
        assert!(!constant_time_eq("same", "Same"));
        assert!(!constant_time_eq("short", "longer-value"));
    }
}
