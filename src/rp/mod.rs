use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{event, Level};

use crate::util::clock::{Clock, SystemClock};

pub mod discovery;
pub mod error;
pub mod flow;
pub mod id_token;
pub mod pages;
pub mod server;
pub mod session;

use discovery::DiscoveryClient;
use flow::Orchestrator;
use server::RpContext;
use session::SessionStore;

/// How long any outbound call (discovery, token exchange, userinfo) may
/// take before it fails instead of hanging.
const OUTBOUND_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub listen: SocketAddr,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub cookie_name: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let host = env_or("RP_HOST", "0.0.0.0");
        let port = env_or("RP_PORT", "3000");
        let listen = format!("{}:{}", host, port)
            .parse()
            .expect("Bad RP_HOST/RP_PORT");

        Self {
            base_url: env_or("RP_BASE_URL", &format!("http://localhost:{}", port)),
            listen,
            issuer: env_or("OP_ISSUER", "http://localhost:4000"),
            client_id: env_or("RP_CLIENT_ID", "rp-client"),
            client_secret: env_or("RP_CLIENT_SECRET", "rp-secret"),
            cookie_name: env_or("RP_COOKIE_NAME", "torii_rp_session"),
        }
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(OUTBOUND_TIMEOUT_SECS))
        .build()
        .expect("Failed to build HTTP client")
}

/// Wire the orchestrator, discovery client, and session store into one
/// context. Everything is constructed up front and injected; nothing is
/// lazily initialized per request.
pub fn context(config: Config, clock: Arc<dyn Clock>) -> Arc<RpContext> {
    let http = http_client();
    let discovery = Arc::new(DiscoveryClient::new(config.issuer.clone(), http.clone()));
    let cookie_name: &'static str = Box::leak(config.cookie_name.clone().into_boxed_str());
    let orchestrator = Orchestrator::new(config, discovery, http, clock);

    Arc::new(RpContext {
        orchestrator,
        sessions: SessionStore::new(),
        cookie_name,
    })
}

async fn rpd(config: Config) -> Option<()> {
    let listen = config.listen;
    let base_url = config.base_url.clone();
    let ctx = context(config, Arc::new(SystemClock));

    event!(Level::INFO, %base_url, "OIDC RP listening");
    warp::serve(server::routes(ctx)).run(listen).await;
    Some(())
}

pub async fn main() -> Result<(), ()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();
    let config = Config::from_env();
    rpd(config).await.ok_or(())
}
