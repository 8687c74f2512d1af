use crate::auth::{MaybeChallenge, Redirect, ResponseMode};
use url::Url;
use warp::reply::{Reply, Response};

fn with_params(r: &Redirect<impl serde::Serialize>) -> Result<Url, ()> {
    let mut url = Url::parse(&r.uri.0).map_err(|_| ())?;
    let encoded = serde_urlencoded::to_string(&r.params).map_err(|_| ())?;

    match r.mode {
        ResponseMode::Query => {
            let pairs = form_urlencoded::parse(encoded.as_bytes());
            url.query_pairs_mut().extend_pairs(pairs);
        }
        ResponseMode::Fragment => {
            url.set_fragment(Some(&encoded));
        }
    }
    Ok(url)
}

pub fn see_other(location: &str) -> Response {
    warp::http::Response::builder()
        .header("Location", location)
        .status(303)
        .body(warp::hyper::Body::empty())
        .expect("static redirect response")
}

impl<T: serde::Serialize + Send> Reply for Redirect<T> {
    fn into_response(self) -> Response {
        match with_params(&self) {
            Ok(url) => see_other(url.as_str()),
            Err(()) => warp::http::StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<T: Reply> Reply for MaybeChallenge<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Challenge(c) => {
                let location = format!("/auth/interaction/{}", c.id.0);
                see_other(&location)
            }
            Self::Accept(r) => r.into_response(),
        }
    }
}
