use crate::auth::pkce;
use crate::core::types::{AuthCode, ClientId, OpaqueToken, RedirectUri, Scope};
use crate::oidc::types::{deserialize_opt_u64, Nonce, Prompt};

use super::error::ErrorResponse;
use super::{MaybeRedirect, Redirect, TokenType, WithState};

pub type AuthorizationErrorResponse = WithState<ErrorResponse<AuthorizationErrorKind>>;
pub type AuthorizationError = MaybeRedirect<AuthorizationErrorResponse, BadAuthorizationRequest>;

/// How artifacts travel back to the redirect URI. Query is only legal for
/// pure `code` responses; anything carrying a token goes in the fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Query,
    Fragment,
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "response_type")]
pub enum AuthorizationRequest {
    #[serde(rename = "code")]
    Code(AuthorizationRequestData<CodeRequestExt>),
    #[serde(rename = "id_token")]
    IdToken(AuthorizationRequestData<ImplicitRequestExt>),
    #[serde(rename = "id_token token")]
    IdTokenToken(AuthorizationRequestData<ImplicitRequestExt>),
    #[serde(rename = "code id_token")]
    CodeIdToken(AuthorizationRequestData<HybridRequestExt>),
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct AuthorizationRequestData<E> {
    pub client_id: ClientId,
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<ResponseMode>,
    #[serde(flatten)]
    pub ext: E,
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct CodeRequestExt {
    #[serde(flatten)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkce_challenge: Option<pkce::Challenge>,
    #[serde(flatten)]
    pub oidc: OidcRequestExt<Option<Nonce>>,
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct HybridRequestExt {
    #[serde(flatten)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkce_challenge: Option<pkce::Challenge>,
    #[serde(flatten)]
    pub oidc: OidcRequestExt<Nonce>,
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ImplicitRequestExt {
    #[serde(flatten)]
    pub oidc: OidcRequestExt<Nonce>,
}

/// OpenID Connect request parameters shared by every response type. The
/// nonce slot is `Nonce` where the flow front-channels an ID token and
/// `Option<Nonce>` for the plain code flow.
#[derive(Debug, Clone)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct OidcRequestExt<N> {
    pub nonce: N,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
    #[serde(default, deserialize_with = "deserialize_opt_u64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locales: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_values: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequestParts<'r> {
    pub client_id: &'r ClientId,
    pub redirect_uri: &'r RedirectUri,
    pub state: &'r Option<String>,
    pub scope: &'r Scope,
    pub response_mode: Option<ResponseMode>,
}

impl AuthorizationRequest {
    pub fn as_parts(&self) -> AuthorizationRequestParts<'_> {
        use AuthorizationRequest::*;

        match &self {
            Code(AuthorizationRequestData {
                client_id,
                redirect_uri,
                state,
                scope,
                response_mode,
                ..
            })
            | IdToken(AuthorizationRequestData {
                client_id,
                redirect_uri,
                state,
                scope,
                response_mode,
                ..
            })
            | IdTokenToken(AuthorizationRequestData {
                client_id,
                redirect_uri,
                state,
                scope,
                response_mode,
                ..
            })
            | CodeIdToken(AuthorizationRequestData {
                client_id,
                redirect_uri,
                state,
                scope,
                response_mode,
                ..
            }) => AuthorizationRequestParts {
                client_id,
                redirect_uri,
                state,
                scope,
                response_mode: *response_mode,
            },
        }
    }

    pub fn response_type(&self) -> &'static str {
        use AuthorizationRequest::*;
        match self {
            Code(_) => "code",
            IdToken(_) => "id_token",
            IdTokenToken(_) => "id_token token",
            CodeIdToken(_) => "code id_token",
        }
    }

    /// True when any credential is delivered on the front channel, which
    /// forbids query-mode delivery.
    pub fn front_channels_tokens(&self) -> bool {
        !matches!(self, AuthorizationRequest::Code(_))
    }

    /// Query for the bare code flow, fragment for everything else, unless
    /// the request named a mode itself.
    pub fn effective_response_mode(&self) -> ResponseMode {
        match self.as_parts().response_mode {
            Some(mode) => mode,
            None if self.front_channels_tokens() => ResponseMode::Fragment,
            None => ResponseMode::Query,
        }
    }

    pub fn prompt(&self) -> Option<Prompt> {
        use AuthorizationRequest::*;
        match self {
            Code(data) => data.ext.oidc.prompt,
            IdToken(data) | IdTokenToken(data) => data.ext.oidc.prompt,
            CodeIdToken(data) => data.ext.oidc.prompt,
        }
    }

    pub fn login_hint(&self) -> Option<&str> {
        use AuthorizationRequest::*;
        match self {
            Code(data) => data.ext.oidc.login_hint.as_deref(),
            IdToken(data) | IdTokenToken(data) => data.ext.oidc.login_hint.as_deref(),
            CodeIdToken(data) => data.ext.oidc.login_hint.as_deref(),
        }
    }

    pub fn nonce(&self) -> Option<&Nonce> {
        use AuthorizationRequest::*;
        match self {
            Code(data) => data.ext.oidc.nonce.as_ref(),
            IdToken(data) | IdTokenToken(data) => Some(&data.ext.oidc.nonce),
            CodeIdToken(data) => Some(&data.ext.oidc.nonce),
        }
    }

    pub fn pkce_challenge(&self) -> Option<&pkce::Challenge> {
        use AuthorizationRequest::*;
        match self {
            Code(data) => data.ext.pkce_challenge.as_ref(),
            CodeIdToken(data) => data.ext.pkce_challenge.as_ref(),
            IdToken(_) | IdTokenToken(_) => None,
        }
    }
}

#[derive(Debug)]
#[derive(serde::Serialize)]
#[serde(untagged)]
pub enum AuthorizationResponse {
    Code(CodeResponse),
    Hybrid(HybridResponse),
    Implicit(ImplicitResponse),
}

#[derive(Debug)]
#[derive(serde::Serialize)]
pub struct CodeResponse {
    pub code: AuthCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug)]
#[derive(serde::Serialize)]
pub struct HybridResponse {
    pub code: AuthCode,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug)]
#[derive(serde::Serialize)]
pub struct ImplicitResponse {
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<OpaqueToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationErrorKind {
    InvalidRequest,
    UnauthorizedClient,
    AccessDenied,
    UnsupportedResponseType,
    InvalidScope,
    ServerError,
    TemporarilyUnavailable,
}

impl AuthorizationErrorKind {
    pub fn with_state(self, state: Option<String>) -> AuthorizationErrorResponse {
        WithState {
            inner: ErrorResponse::new(self),
            state,
        }
    }

    pub fn describe(self, description: impl Into<String>, state: Option<String>) -> AuthorizationErrorResponse {
        WithState {
            inner: ErrorResponse::with_description(self, description),
            state,
        }
    }
}

/// Failures detected before any redirect URI can be trusted. These never
/// redirect; the user-agent gets a direct error status.
#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadAuthorizationRequest {
    UnknownClient,
    BadRedirect,
    BadChallenge,
    ServerError,
}

impl AuthorizationError {
    pub fn direct(kind: BadAuthorizationRequest) -> Self {
        MaybeRedirect::Direct(kind)
    }

    pub fn redirect(
        uri: RedirectUri,
        mode: ResponseMode,
        response: AuthorizationErrorResponse,
    ) -> Self {
        MaybeRedirect::Redirected(Redirect::with_mode(uri, mode, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_code_request_from_query() {
        let q = "response_type=code&client_id=rp-client&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback&scope=openid+profile&state=abc&code_challenge=xyz&code_challenge_method=S256";
        let req: AuthorizationRequest = serde_urlencoded::from_str(q).unwrap();

        assert_eq!(req.response_type(), "code");
        assert_eq!(req.effective_response_mode(), ResponseMode::Query);
        let challenge = req.pkce_challenge().unwrap();
        assert_eq!(challenge.code, "xyz");
        assert_eq!(challenge.method, pkce::Transformation::S256);
        assert!(req.nonce().is_none());
    }

    #[test]
    fn deserializes_hybrid_request_from_query() {
        let q = "response_type=code+id_token&client_id=rp-client&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback%2Ffragment&scope=openid&state=s1&nonce=n1";
        let req: AuthorizationRequest = serde_urlencoded::from_str(q).unwrap();

        assert_eq!(req.response_type(), "code id_token");
        assert_eq!(req.effective_response_mode(), ResponseMode::Fragment);
        assert_eq!(req.nonce().map(AsRef::as_ref), Some("n1"));
    }

    #[test]
    fn implicit_request_requires_nonce() {
        let q = "response_type=id_token&client_id=rp-client&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback%2Ffragment&scope=openid&state=s1";
        assert!(serde_urlencoded::from_str::<AuthorizationRequest>(q).is_err());
    }

    #[test]
    fn explicit_response_mode_wins() {
        let q = "response_type=code&client_id=c&redirect_uri=u&scope=openid&response_mode=fragment";
        let req: AuthorizationRequest = serde_urlencoded::from_str(q).unwrap();
        assert_eq!(req.effective_response_mode(), ResponseMode::Fragment);
    }
}
