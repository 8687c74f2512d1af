use crate::auth::{
    AccessTokenError, AccessTokenErrorKind, AuthorizationError, AuthorizationErrorResponse,
    BadAuthorizationRequest, MaybeRedirect, Redirect,
};
use crate::provider::userinfo::UserInfoError;
use tracing::{event, Level};
use warp::{Rejection, Reply};

#[derive(Debug, Clone)]
pub enum AuthRejection {
    Authorization(Redirect<AuthorizationErrorResponse>),
    BadAuthorization(BadAuthorizationRequest),
    AccessToken(AccessTokenError),
    UserInfo(UserInfoError),
    Unauthorized,
}

impl warp::reject::Reject for AuthRejection {}

impl From<Redirect<AuthorizationErrorResponse>> for AuthRejection {
    fn from(error: Redirect<AuthorizationErrorResponse>) -> Self {
        Self::Authorization(error)
    }
}

impl From<AuthorizationError> for AuthRejection {
    fn from(error: AuthorizationError) -> Self {
        match error {
            MaybeRedirect::Redirected(r) => Self::from(r),
            MaybeRedirect::Direct(d) => Self::BadAuthorization(d),
        }
    }
}

impl From<AccessTokenError> for AuthRejection {
    fn from(error: AccessTokenError) -> Self {
        Self::AccessToken(error)
    }
}

impl From<UserInfoError> for AuthRejection {
    fn from(error: UserInfoError) -> Self {
        Self::UserInfo(error)
    }
}

pub async fn handle_reject(err: Rejection) -> Result<impl Reply, Rejection> {
    use warp::http::StatusCode;

    if let Some(e) = err.find::<AuthRejection>() {
        let e = e.clone();
        return match e {
            AuthRejection::Authorization(e) => Ok(e.into_response()),
            AuthRejection::BadAuthorization(e) => {
                let resp = warp::reply::json(&ErrorBody::from(&e));
                Ok(warp::reply::with_status(resp, StatusCode::BAD_REQUEST).into_response())
            }
            AuthRejection::AccessToken(e) => {
                let status = match e.kind {
                    AccessTokenErrorKind::InvalidClient => StatusCode::UNAUTHORIZED,
                    _ => StatusCode::BAD_REQUEST,
                };
                let resp = warp::reply::json(&e);
                Ok(warp::reply::with_status(resp, status).into_response())
            }
            AuthRejection::UserInfo(e) => {
                let resp = warp::reply::json(&e);
                let resp = warp::reply::with_status(resp, StatusCode::UNAUTHORIZED);
                Ok(
                    warp::reply::with_header(resp, "WWW-Authenticate", "Bearer")
                        .into_response(),
                )
            }
            AuthRejection::Unauthorized => {
                Ok(StatusCode::UNAUTHORIZED.into_response())
            }
        };
    }

    if err.is_not_found() {
        return Err(err);
    }

    // Malformed query strings or form bodies never reach a handler; answer
    // with the protocol's invalid_request shape rather than warp's default.
    if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::filters::body::BodyDeserializeError>().is_some()
    {
        let resp = warp::reply::json(&ErrorBody {
            error: "invalid_request".to_string(),
            error_description: Some("malformed request parameters".to_string()),
        });
        return Ok(warp::reply::with_status(resp, StatusCode::BAD_REQUEST).into_response());
    }

    event!(Level::ERROR, rejection = ?err, "Unhandled rejection");
    Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<String>,
}

impl From<&BadAuthorizationRequest> for ErrorBody {
    fn from(e: &BadAuthorizationRequest) -> Self {
        let description = match e {
            BadAuthorizationRequest::UnknownClient => "unknown client",
            BadAuthorizationRequest::BadRedirect => "redirect_uri is not registered",
            BadAuthorizationRequest::BadChallenge => "unknown or expired interaction",
            BadAuthorizationRequest::ServerError => "internal error",
        };
        Self {
            error: "invalid_request".to_string(),
            error_description: Some(description.to_string()),
        }
    }
}
