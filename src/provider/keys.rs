use std::sync::{Arc, RwLock};

use josekit::jws::RS256;

use crate::oidc::jwks::{Jwk, Jwks};
use crate::provider::error::Error;
use crate::util::random;

/// One signing keypair. The private half never leaves this struct; the
/// public half is what the JWKS endpoint publishes.
pub struct SigningKey {
    pub kid: String,
    jwk: josekit::jwk::Jwk,
    public: Jwk,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey {{ kid: {:?}, .. }}", self.kid)
    }
}

impl SigningKey {
    pub fn generate() -> Result<Self, Error> {
        let kid = format!("torii-{}", random::random_string(12));

        let mut jwk = josekit::jwk::Jwk::generate_rsa_key(2048)?;
        jwk.set_key_id(&kid);
        jwk.set_algorithm(RS256.name());
        jwk.set_key_use("sig");

        let parameter = |name: &str| {
            jwk.parameter(name)
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
        };

        let public = Jwk {
            kty: "RSA".to_string(),
            kid: kid.clone(),
            use_: "sig".to_string(),
            alg: RS256.name().to_string(),
            n: parameter("n"),
            e: parameter("e"),
        };

        Ok(Self { kid, jwk, public })
    }

    pub fn signer(&self) -> Result<impl josekit::jws::JwsSigner, Error> {
        Ok(RS256.signer_from_jwk(&self.jwk)?)
    }

    pub fn verifier(&self) -> Result<impl josekit::jws::JwsVerifier, Error> {
        Ok(RS256.verifier_from_jwk(&self.jwk)?)
    }
}

/// Immutable snapshot of the key material: every key still verifies, only
/// the active one signs.
#[derive(Debug)]
pub struct KeyRing {
    keys: Vec<SigningKey>,
    active: usize,
}

impl KeyRing {
    pub fn active(&self) -> &SigningKey {
        &self.keys[self.active]
    }

    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SigningKey> {
        self.keys.iter()
    }

    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self.keys.iter().map(|k| k.public.clone()).collect(),
        }
    }
}

/// Rotation swaps in a whole new snapshot; concurrent readers keep whatever
/// snapshot they already cloned.
#[derive(Debug)]
pub struct KeyStore {
    ring: RwLock<Arc<KeyRing>>,
}

impl KeyStore {
    pub fn generate() -> Result<Self, Error> {
        let key = SigningKey::generate()?;
        let ring = KeyRing {
            keys: vec![key],
            active: 0,
        };
        Ok(Self {
            ring: RwLock::new(Arc::new(ring)),
        })
    }

    pub fn snapshot(&self) -> Arc<KeyRing> {
        Arc::clone(&self.ring.read().expect("key ring lock poisoned"))
    }

    /// Generate a fresh key, make it active, and keep the previous keys for
    /// verification of already-issued tokens.
    pub fn rotate(&self) -> Result<String, Error> {
        let fresh = SigningKey::generate()?;
        let kid = fresh.kid.clone();

        let mut guard = self.ring.write().expect("key ring lock poisoned");
        let mut keys: Vec<SigningKey> = Vec::with_capacity(guard.keys.len() + 1);
        for key in guard.iter() {
            keys.push(SigningKey {
                kid: key.kid.clone(),
                jwk: key.jwk.clone(),
                public: key.public.clone(),
            });
        }
        keys.push(fresh);
        let active = keys.len() - 1;
        *guard = Arc::new(KeyRing { keys, active });

        Ok(kid)
    }

    pub fn jwks(&self) -> Jwks {
        self.snapshot().jwks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_publishes_rsa_members() {
        let store = KeyStore::generate().unwrap();
        let jwks = store.jwks();

        assert_eq!(jwks.keys.len(), 1);
        let jwk = &jwks.keys[0];
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");
        assert!(jwk.n.is_some());
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
    }

    #[test]
    fn rotation_keeps_old_keys_verifying() {
        let store = KeyStore::generate().unwrap();
        let old_kid = store.snapshot().active().kid.clone();

        let new_kid = store.rotate().unwrap();
        assert_ne!(old_kid, new_kid);

        let ring = store.snapshot();
        assert_eq!(ring.active().kid, new_kid);
        assert!(ring.find(&old_kid).is_some());
        assert_eq!(store.jwks().keys.len(), 2);
    }
}
