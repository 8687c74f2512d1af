use tokio::sync::{OnceCell, RwLock};
use tracing::{event, Level};

use crate::oidc::jwks::{Jwk, Jwks};

use super::error::{Error, Result};

/// The slice of OP metadata the relying party acts on.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Fetches and caches OP metadata and keys. Built once at startup and
/// injected into request handlers; the metadata fetch itself is deferred
/// behind a one-time initialization barrier so concurrent first requests
/// trigger exactly one fetch.
#[derive(Debug)]
pub struct DiscoveryClient {
    issuer: String,
    http: reqwest::Client,
    metadata: OnceCell<ProviderMetadata>,
    jwks: RwLock<Option<Jwks>>,
}

impl DiscoveryClient {
    pub fn new(issuer: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            issuer: issuer.into(),
            http,
            metadata: OnceCell::new(),
            jwks: RwLock::new(None),
        }
    }

    pub async fn metadata(&self) -> Result<&ProviderMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                match self.fetch_metadata().await {
                    Err(e) if e.is_retryable() => {
                        event!(Level::WARN, error = %e, "Discovery fetch failed, retrying once");
                        self.fetch_metadata().await
                    }
                    other => other,
                }
            })
            .await
    }

    async fn fetch_metadata(&self) -> Result<ProviderMetadata> {
        let issuer = self.issuer.trim_end_matches('/');
        let url = format!("{}/.well-known/openid-configuration", issuer);

        event!(Level::DEBUG, %url, "Fetching provider metadata");
        let metadata: ProviderMetadata = get_json(&self.http, &url).await?;

        if metadata.issuer.trim_end_matches('/') != issuer {
            return Err(Error::Discovery(format!(
                "issuer mismatch: expected '{}', got '{}'",
                issuer, metadata.issuer
            )));
        }
        for (value, name) in [
            (&metadata.authorization_endpoint, "authorization_endpoint"),
            (&metadata.token_endpoint, "token_endpoint"),
            (&metadata.jwks_uri, "jwks_uri"),
        ] {
            if value.is_empty() {
                return Err(Error::Discovery(format!("missing {}", name)));
            }
            url::Url::parse(value)
                .map_err(|e| Error::Discovery(format!("invalid {}: {}", name, e)))?;
        }

        Ok(metadata)
    }

    pub async fn jwks(&self) -> Result<Jwks> {
        if let Some(jwks) = self.jwks.read().await.clone() {
            return Ok(jwks);
        }
        self.refresh_jwks().await
    }

    pub async fn refresh_jwks(&self) -> Result<Jwks> {
        let uri = self.metadata().await?.jwks_uri.clone();

        event!(Level::DEBUG, %uri, "Fetching JWKS");
        let jwks: Jwks = get_json(&self.http, &uri).await?;

        *self.jwks.write().await = Some(jwks.clone());
        Ok(jwks)
    }

    /// Find a verification key by kid. On a miss the JWKS is re-fetched once
    /// before giving up, which is how key rotation is tolerated.
    pub async fn key_for(&self, kid: &str) -> Result<Jwk> {
        if let Some(key) = self.jwks().await?.find_key(kid) {
            return Ok(key.clone());
        }

        event!(Level::DEBUG, %kid, "Unknown kid, re-fetching JWKS");
        self.refresh_jwks()
            .await?
            .find_key(kid)
            .cloned()
            .ok_or_else(|| Error::Jwt(format!("no key with kid '{}' in JWKS", kid)))
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Transient(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Transient(format!("{} returned {}", url, status)));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Discovery(format!("bad response from {}: {}", url, e)))
}
