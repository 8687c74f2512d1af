use crate::core::models::{AccessTokenData, AuthCodeData, Client, RefreshTokenData};
use crate::core::types::{
    ChallengeId, ClientId, ClientSecret, Expiry, HashedAuthCode, HashedToken, RedirectUri, Scope,
};
use crate::provider::error::Error;
use crate::util::random::FromRandom;

pub mod access_token;
pub mod authorization;
pub mod error;
pub mod pkce;

pub use access_token::*;
pub use authorization::*;

#[derive(Debug)]
pub enum MaybeRedirect<R, D> {
    Redirected(Redirect<R>),
    Direct(D),
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
pub struct WithState<T> {
    #[serde(flatten)]
    pub inner: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug)]
#[derive(serde::Deserialize)]
pub struct ClientCredentials {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
}

/// A parked authorization request awaiting the end-user's decision.
/// Single-use: resuming it takes the row.
#[derive(Debug, Clone)]
pub struct ChallengeData {
    pub id: ChallengeId,
    pub req: AuthorizationRequest,
    pub expires_at: Expiry,
}

impl ChallengeData {
    pub const EXPIRES_IN_SECS: u64 = 5 * 60;

    pub fn new(req: &AuthorizationRequest, now: u64) -> Self {
        Self {
            id: ChallengeId::from_random(),
            req: req.clone(),
            expires_at: Expiry::after(now, Self::EXPIRES_IN_SECS),
        }
    }
}

/// What the interaction form needs to render a decision page.
#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
pub struct ChallengeInfo {
    pub id: ChallengeId,
    pub client_id: ClientId,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
}

impl From<&ChallengeData> for ChallengeInfo {
    fn from(data: &ChallengeData) -> Self {
        let parts = data.req.as_parts();
        Self {
            id: data.id.clone(),
            client_id: parts.client_id.clone(),
            scope: parts.scope.clone(),
            login_hint: data.req.login_hint().map(ToString::to_string),
        }
    }
}

#[derive(Debug)]
#[derive(serde::Deserialize)]
#[serde(tag = "action")]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept { subject: String },
    Reject,
}

#[derive(Debug)]
pub struct Challenge {
    pub id: ChallengeId,
}

pub enum MaybeChallenge<T> {
    Challenge(Challenge),
    Accept(T),
}

#[derive(Debug, Clone)]
pub struct Redirect<T> {
    pub uri: RedirectUri,
    pub mode: ResponseMode,
    pub params: T,
}

impl<T> Redirect<T> {
    pub fn query(uri: RedirectUri, params: T) -> Self {
        Self::with_mode(uri, ResponseMode::Query, params)
    }

    pub fn with_mode(uri: RedirectUri, mode: ResponseMode, params: T) -> Self {
        Redirect { uri, mode, params }
    }
}

#[async_trait::async_trait]
pub trait Store {
    async fn get_client(&self, client_id: &ClientId) -> Result<Option<Client>, Error>;
    async fn put_client(&self, client: Client) -> Result<(), Error>;
    async fn store_code(&self, data: AuthCodeData) -> Result<(), Error>;
    /// Atomic take: at most one concurrent redemption can observe the row.
    async fn take_authcode_data(
        &self,
        client_id: &ClientId,
        code: &HashedAuthCode,
        now: u64,
    ) -> Result<AuthCodeData, Error>;
    async fn store_challenge_data(&self, data: ChallengeData) -> Result<ChallengeId, Error>;
    async fn get_challenge_data(
        &self,
        id: &ChallengeId,
        now: u64,
    ) -> Result<Option<ChallengeData>, Error>;
    async fn take_challenge_data(&self, id: &ChallengeId, now: u64)
        -> Result<ChallengeData, Error>;
    async fn put_access_token(
        &self,
        token: HashedToken,
        data: AccessTokenData,
    ) -> Result<(), Error>;
    async fn get_access_token(
        &self,
        token: &HashedToken,
        now: u64,
    ) -> Result<Option<AccessTokenData>, Error>;
    async fn put_refresh_token(
        &self,
        token: HashedToken,
        data: RefreshTokenData,
    ) -> Result<(), Error>;
    /// Atomic take; rotation invalidates the presented token in the same step.
    async fn take_refresh_token(
        &self,
        token: &HashedToken,
        now: u64,
    ) -> Result<RefreshTokenData, Error>;
    async fn clean_up(&self, now: u64) -> Result<(), Error>;
}
