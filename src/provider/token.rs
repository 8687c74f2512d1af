use std::sync::Arc;

use josekit::{jws::JwsHeader, jwt};
use tracing::{event, Level};

use crate::auth::TokenType;
use crate::core::models::{AccessTokenData, RefreshTokenData};
use crate::core::types::{ClientId, Expiry, OpaqueToken, Scope};
use crate::oidc::types::Nonce;
use crate::provider::{claims::IdClaims, error::Error, keys::KeyStore};
use crate::util::clock::Clock;

#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access_secs: u64,
    pub refresh_secs: u64,
    pub id_secs: u64,
    pub code_secs: u64,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access_secs: 3600,
            refresh_secs: 24 * 3600,
            id_secs: 3600,
            code_secs: 600,
        }
    }
}

/// Issues the two token shapes the provider deals in: signed ID tokens
/// (structured claims, RS256, kid header) and opaque access/refresh tokens
/// whose claims only exist server-side.
pub struct TokenService {
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
    issuer: String,
    ttl: TokenTtl,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenService {{ issuer: {:?}, .. }}", self.issuer)
    }
}

impl TokenService {
    pub fn new(keys: Arc<KeyStore>, clock: Arc<dyn Clock>, issuer: String, ttl: TokenTtl) -> Self {
        Self {
            keys,
            clock,
            issuer,
            ttl,
        }
    }

    pub fn token_type() -> TokenType {
        TokenType::Bearer
    }

    pub fn ttl(&self) -> TokenTtl {
        self.ttl
    }

    #[tracing::instrument(skip_all, fields(client_id = ?client_id))]
    pub fn new_access_token(
        &self,
        client_id: &ClientId,
        subject: &str,
        scope: &Scope,
    ) -> (OpaqueToken, AccessTokenData) {
        let now = self.clock.now_unix();
        let token = OpaqueToken::new_access();
        let data = AccessTokenData {
            client_id: client_id.clone(),
            subject: subject.to_string(),
            scope: scope.clone(),
            expires_at: Expiry::after(now, self.ttl.access_secs),
        };

        event!(Level::DEBUG, "Issuing access_token");
        (token, data)
    }

    #[tracing::instrument(skip_all, fields(client_id = ?client_id))]
    pub fn new_refresh_token(
        &self,
        client_id: &ClientId,
        subject: &str,
        scope: &Scope,
    ) -> (OpaqueToken, RefreshTokenData) {
        let now = self.clock.now_unix();
        let token = OpaqueToken::new_refresh();
        let data = RefreshTokenData {
            client_id: client_id.clone(),
            subject: subject.to_string(),
            scope: scope.clone(),
            expires_at: Expiry::after(now, self.ttl.refresh_secs),
        };

        event!(Level::DEBUG, "Issuing refresh_token");
        (token, data)
    }

    #[tracing::instrument(skip_all, fields(client_id = ?client_id))]
    pub fn new_id_token(
        &self,
        client_id: &ClientId,
        subject: &str,
        nonce: Option<&Nonce>,
        auth_time: u64,
        access_token: Option<&OpaqueToken>,
    ) -> Result<String, Error> {
        let now = self.clock.now_unix();

        let claims = IdClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: client_id.0.to_string(),
            exp: now + self.ttl.id_secs,
            iat: now,
            auth_time,
            nonce: nonce.cloned(),
            azp: client_id.0.to_string(),
            at_hash: access_token.map(|t| at_hash(t.as_ref())),
        };

        event!(Level::DEBUG, "Issuing id_token");
        self.sign(claims)
    }

    fn sign(&self, claims: IdClaims) -> Result<String, Error> {
        let map = match serde_json::to_value(&claims)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(Error::BadRequest),
        };
        let payload = jwt::JwtPayload::from_map(map)?;

        let ring = self.keys.snapshot();
        let key = ring.active();

        let mut header = JwsHeader::new();
        header.set_token_type("JWT");
        header.set_key_id(&key.kid);

        let signer = key.signer()?;
        Ok(jwt::encode_with_signer(&payload, &header, &signer)?)
    }

    /// Decode an ID token this provider issued, e.g. an `id_token_hint` at
    /// the end-session endpoint. Signature and issuer are checked; expiry is
    /// not, since a logout hint may legitimately be stale.
    pub fn decode_own_id_token(&self, token: &str) -> Result<IdClaims, Error> {
        let ring = self.keys.snapshot();

        for key in ring.iter() {
            let verifier = key.verifier()?;
            if let Ok((payload, _header)) = jwt::decode_with_verifier(token, &verifier) {
                let value = serde_json::Value::Object(payload.claims_set().clone());
                let claims: IdClaims = serde_json::from_value(value)?;
                if claims.iss != self.issuer {
                    return Err(Error::Unauthorized);
                }
                return Ok(claims);
            }
        }

        Err(Error::Unauthorized)
    }
}

/// `at_hash` per OIDC Core: base64url of the left half of SHA-256 over the
/// access token octets.
pub fn at_hash(access_token: &str) -> String {
    use sha2::Digest;

    let digest = sha2::Sha256::digest(access_token.as_bytes());
    base64::encode_config(&digest[..16], base64::URL_SAFE_NO_PAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;

    fn service(clock: Arc<ManualClock>) -> TokenService {
        let keys = Arc::new(KeyStore::generate().unwrap());
        TokenService::new(
            keys,
            clock,
            "http://localhost:4000".to_string(),
            TokenTtl::default(),
        )
    }

    #[test]
    fn id_token_round_trips_through_own_verifier() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let svc = service(Arc::clone(&clock));

        let client = ClientId("rp-client".to_string());
        let nonce = Nonce("n-123".to_string());
        let token = svc
            .new_id_token(&client, "alice", Some(&nonce), 1_700_000_000, None)
            .unwrap();

        let claims = svc.decode_own_id_token(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, "rp-client");
        assert_eq!(claims.nonce.as_ref().map(AsRef::as_ref), Some("n-123"));
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_000 + 3600);
    }

    #[test]
    fn id_token_carries_at_hash_only_with_access_token() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let svc = service(Arc::clone(&clock));
        let client = ClientId("rp-client".to_string());

        let access = OpaqueToken("token-bytes".to_string());
        let with = svc
            .new_id_token(&client, "alice", None, 1_700_000_000, Some(&access))
            .unwrap();
        let claims = svc.decode_own_id_token(&with).unwrap();
        assert_eq!(claims.at_hash.as_deref(), Some(at_hash("token-bytes").as_str()));

        let without = svc
            .new_id_token(&client, "alice", None, 1_700_000_000, None)
            .unwrap();
        let claims = svc.decode_own_id_token(&without).unwrap();
        assert!(claims.at_hash.is_none());
    }

    #[test]
    fn foreign_token_is_rejected() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let ours = service(Arc::clone(&clock));
        let theirs = service(clock);

        let client = ClientId("rp-client".to_string());
        let token = theirs
            .new_id_token(&client, "alice", None, 1_700_000_000, None)
            .unwrap();

        assert!(ours.decode_own_id_token(&token).is_err());
    }

    #[test]
    fn opaque_tokens_expire_on_schedule() {
        let clock = Arc::new(ManualClock::new(1_000));
        let svc = service(Arc::clone(&clock));
        let client = ClientId("rp-client".to_string());
        let scope = Scope::from_delimited_parts("openid");

        let (_, data) = svc.new_access_token(&client, "alice", &scope);
        assert!(!data.expires_at.is_expired(1_000 + 3599));
        assert!(data.expires_at.is_expired(1_000 + 3600));
    }
}
