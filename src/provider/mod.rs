use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{event, Level};

use crate::auth::{AccessTokenError, AccessTokenErrorKind, ClientCredentials, Store};
use crate::core::models::{ApplicationType, Client, GrantType, TokenEndpointAuthMethod};
use crate::core::types::{ClientId, ClientSecret, HashedToken, OpaqueToken, RedirectUri, Scope};
use crate::http::server::Server;
use crate::store::MemoryStore;
use crate::util::clock::{Clock, SystemClock};
use crate::util::hash::HashingService;

pub mod access_token;
pub mod authorization;
pub mod claims;
pub mod discovery;
pub mod error;
pub mod keys;
pub mod session;
pub mod token;
pub mod userinfo;

use error::Error;
use keys::KeyStore;
use token::{TokenService, TokenTtl};

#[derive(Debug)]
pub struct OidcProvider {
    pub(crate) store: MemoryStore,
    pub(crate) hasher: HashingService,
    pub(crate) token: TokenService,
    pub(crate) keys: Arc<KeyStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Config,
}

impl OidcProvider {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let keys = Arc::new(KeyStore::generate()?);
        let token = TokenService::new(
            Arc::clone(&keys),
            Arc::clone(&clock),
            config.issuer.clone(),
            config.ttl,
        );
        let hasher = HashingService::with_secret_key(config.hash_secret.clone());

        Ok(Self {
            store: MemoryStore::new(),
            hasher,
            token,
            keys,
            clock,
            config,
        })
    }

    /// The token codec, exposed for callers that need to inspect tokens
    /// this provider issued.
    pub fn codec(&self) -> &TokenService {
        &self.token
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Register the configured relying party. Dynamic registration is out of
    /// scope; the registry is fixed after startup.
    pub async fn seed_clients(&self) -> Result<(), Error> {
        let config = &self.config;
        let secret = ClientSecret(config.client_secret.clone());
        let hashed = self.hasher.hash(&secret).map_err(|_| Error::BadRequest)?;

        let redirect_uris: HashSet<RedirectUri> = [
            format!("{}/callback", config.rp_base_url),
            format!("{}/callback/fragment", config.rp_base_url),
        ]
        .iter()
        .cloned()
        .map(RedirectUri)
        .collect();

        let post_logout_redirect_uris: HashSet<RedirectUri> =
            [format!("{}/logout/callback", config.rp_base_url)]
                .iter()
                .cloned()
                .map(RedirectUri)
                .collect();

        let application_type = if config.rp_base_url.starts_with("https://") {
            ApplicationType::Web
        } else {
            ApplicationType::Native
        };

        let client = Client {
            id: ClientId(config.client_id.clone()),
            secret: hashed,
            application_type,
            redirect_uris,
            post_logout_redirect_uris,
            grant_types: [
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::Implicit,
            ]
            .iter()
            .copied()
            .collect(),
            response_types: ["code", "id_token", "code id_token"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
        };

        event!(
            Level::INFO,
            client_id = %client.id.0,
            application_type = ?client.application_type,
            auth_method = ?client.token_endpoint_auth_method,
            "Registering client"
        );
        self.store.put_client(client).await
    }

    pub(crate) async fn check_client_authentication(
        &self,
        cred: &ClientCredentials,
    ) -> Result<Client, AccessTokenError> {
        let client = self.store.get_client(&cred.client_id).await;

        if let Ok(Some(c)) = client {
            let result = self
                .hasher
                .verify(&cred.client_secret, &c.secret)
                .unwrap_or(false);
            if result {
                return Ok(c);
            }
        }

        Err(AccessTokenError::with_description(
            AccessTokenErrorKind::InvalidClient,
            "Bad authentication",
        ))
    }

    pub(crate) async fn issue_access_token(
        &self,
        client_id: &ClientId,
        subject: &str,
        scope: &Scope,
    ) -> Result<OpaqueToken, Error> {
        let (token, data) = self.token.new_access_token(client_id, subject, scope);
        let hashed: HashedToken = self.hasher.hash_without_salt(&token);
        self.store.put_access_token(hashed, data).await?;
        Ok(token)
    }

    pub(crate) async fn issue_refresh_token(
        &self,
        client_id: &ClientId,
        subject: &str,
        scope: &Scope,
    ) -> Result<OpaqueToken, Error> {
        let (token, data) = self.token.new_refresh_token(client_id, subject, scope);
        let hashed: HashedToken = self.hasher.hash_without_salt(&token);
        self.store.put_refresh_token(hashed, data).await?;
        Ok(token)
    }

    async fn start_clean_up_worker(&self) {
        use std::time::Duration;
        use tokio::time::interval;

        let mut interval = interval(Duration::from_secs(15));

        loop {
            interval.tick().await;
            if self.store.clean_up(self.clock.now_unix()).await.is_err() {
                event!(Level::WARN, "Store clean-up pass failed");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub issuer: String,
    pub listen: SocketAddr,
    pub rp_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub hash_secret: String,
    pub dev_auto_approve: bool,
    pub allow_plain_pkce: bool,
    pub ttl: TokenTtl,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let host = env_or("OP_HOST", "127.0.0.1");
        let port = env_secs("OP_PORT", 4000);
        let listen = format!("{}:{}", host, port)
            .parse()
            .expect("Bad OP_HOST/OP_PORT");

        Self {
            issuer: env_or("OP_ISSUER", "http://localhost:4000"),
            listen,
            rp_base_url: env_or("RP_BASE_URL", "http://localhost:3000"),
            client_id: env_or("OP_CLIENT_ID", "rp-client"),
            client_secret: env_or("OP_CLIENT_SECRET", "rp-secret"),
            hash_secret: env_or("OP_HASH_SECRET", "replace-this-hash-secret"),
            dev_auto_approve: env_flag("OP_DEV_AUTO_APPROVE", true),
            allow_plain_pkce: env_flag("OP_ALLOW_PLAIN_PKCE", false),
            ttl: TokenTtl {
                access_secs: env_secs("OP_ACCESS_TOKEN_TTL", 3600),
                refresh_secs: env_secs("OP_REFRESH_TOKEN_TTL", 24 * 3600),
                id_secs: env_secs("OP_ID_TOKEN_TTL", 3600),
                code_secs: env_secs("OP_AUTH_CODE_TTL", 600),
            },
        }
    }
}

async fn opd(config: Config) -> Option<()> {
    let listen = config.listen;
    let issuer = config.issuer.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = Arc::new(OidcProvider::new(config, clock).ok()?);
    provider.seed_clients().await.ok()?;

    let _clean_up = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.start_clean_up_worker().await });
    };

    event!(Level::INFO, %issuer, "OIDC OP listening");
    let server = Server::new(provider);
    server.serve(listen).await;
    Some(())
}

pub async fn main() -> Result<(), ()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();
    let config = Config::from_env();
    opd(config).await.ok_or(())
}
