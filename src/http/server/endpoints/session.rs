use std::sync::Arc;

use warp::Filter;

use crate::provider::session::EndSessionOutcome;
use crate::provider::OidcProvider;

use super::OP_SESSION_COOKIE;

const LOGGED_OUT_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\" /><title>Signed out</title></head>\n<body><h1>Signed out</h1><p>Your session at the provider has ended.</p></body>\n</html>\n";

pub fn session_endpoint(
    provider: Arc<OidcProvider>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_provider = warp::any().map(move || provider.clone());

    warp::path!("session" / "end")
        .and(warp::get())
        .and(with_provider)
        .and(warp::query::query())
        .and_then(|provider: Arc<OidcProvider>, req| async move {
            use warp::Reply;

            let clear_cookie = format!("{}=; Path=/; Max-Age=0", OP_SESSION_COOKIE);
            let response = match provider.end_session_request(req).await {
                Ok(EndSessionOutcome::Redirect(redirect)) => redirect.into_response(),
                Ok(EndSessionOutcome::Page) => warp::reply::html(LOGGED_OUT_PAGE).into_response(),
                Err(_) => warp::reply::with_status(
                    warp::reply::html("invalid end-session request"),
                    warp::http::StatusCode::BAD_REQUEST,
                )
                .into_response(),
            };

            Ok::<_, warp::Rejection>(warp::reply::with_header(
                response,
                "Set-Cookie",
                clear_cookie,
            ))
        })
}
