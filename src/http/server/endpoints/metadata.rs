use std::sync::Arc;

use warp::Filter;

use crate::provider::{discovery::DiscoveryDocument, OidcProvider};

pub fn metadata_endpoint(
    provider: Arc<OidcProvider>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_provider = warp::any().map(move || provider.clone());

    let discovery = warp::path!(".well-known" / "openid-configuration")
        .and(warp::get())
        .and(with_provider.clone())
        .and_then(|provider: Arc<OidcProvider>| async move {
            let doc = DiscoveryDocument::new(&provider.config);
            Ok::<_, warp::Rejection>(warp::reply::json(&doc))
        });

    let jwks = warp::path("jwks")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_provider)
        .and_then(|provider: Arc<OidcProvider>| async move {
            Ok::<_, warp::Rejection>(warp::reply::json(&provider.keys.jwks()))
        });

    discovery.or(jwks)
}
