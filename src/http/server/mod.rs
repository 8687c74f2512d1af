use std::net::SocketAddr;
use std::sync::Arc;

use warp::Filter;

use crate::provider::OidcProvider;

mod endpoints;

use endpoints::{
    interaction::interaction_endpoint, metadata::metadata_endpoint, oauth::oauth_endpoint,
    session::session_endpoint,
};

use super::encoding::error::handle_reject;

/// The full OP route table; exposed separately from [`Server`] so tests can
/// serve it on an ephemeral port.
pub fn routes(
    provider: Arc<OidcProvider>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let oauth = oauth_endpoint(provider.clone());
    let interaction = interaction_endpoint(provider.clone());
    let metadata = metadata_endpoint(provider.clone());
    let session = session_endpoint(provider);

    let cors = warp::cors().allow_any_origin();

    metadata
        .or(oauth)
        .or(interaction)
        .or(session)
        .recover(handle_reject)
        .with(warp::log("http-api"))
        .with(cors)
}

#[derive(Debug)]
pub struct Server {
    provider: Arc<OidcProvider>,
}

impl Server {
    pub fn new(provider: Arc<OidcProvider>) -> Self {
        Self {
            provider: Arc::clone(&provider),
        }
    }

    pub async fn serve(self, addr: SocketAddr) {
        warp::serve(routes(self.provider)).run(addr).await;
    }
}
