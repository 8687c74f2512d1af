use std::sync::Arc;

use warp::Filter;

use crate::auth::{ClientCredentials, MaybeTokenRequest};
use crate::http::encoding::{self, reply};
use crate::provider::OidcProvider;

use super::OP_SESSION_COOKIE;

pub fn oauth_endpoint(
    provider: Arc<OidcProvider>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_provider = warp::any().map(move || provider.clone());

    let authorize = warp::path("auth")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_provider.clone())
        .and(warp::query::query())
        .and(warp::cookie::optional(OP_SESSION_COOKIE))
        .and_then(
            |provider: Arc<OidcProvider>, req, session_user: Option<String>| async move {
                let result = provider.authorization_request(req, session_user).await;
                reply::reply(result)
            },
        );

    // Either a direct success or a direct error
    let token = warp::path("token")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_provider.clone())
        .and(encoding::body_with_credentials())
        .and_then(
            |provider: Arc<OidcProvider>,
             (credentials, req): (ClientCredentials, MaybeTokenRequest)| async move {
                let result = provider.access_token_request(credentials, req).await;
                reply::json_encode(result)
            },
        );

    // RFC 6750 allows the userinfo endpoint on both GET and POST
    let userinfo_get = warp::path("userinfo")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_provider.clone())
        .and(encoding::bearer())
        .and_then(userinfo_request);

    let userinfo_post = warp::path("userinfo")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_provider)
        .and(encoding::bearer())
        .and_then(userinfo_request);

    authorize.or(token).or(userinfo_get).or(userinfo_post)
}

async fn userinfo_request(
    provider: Arc<OidcProvider>,
    token: crate::core::types::BearerToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = provider.userinfo_request(token).await;
    reply::json_encode(result)
}
