#[derive(Debug)]
pub enum Error {
    NotFound,
    Expired,
    BadRequest,
    Unauthorized,
    Jose(josekit::JoseError),
    Serde(serde_json::Error),
}

impl From<josekit::JoseError> for Error {
    fn from(e: josekit::JoseError) -> Self {
        Self::Jose(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e)
    }
}
