use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{event, Level};
use url::Url;

use crate::auth::pkce;
use crate::oidc::types::deserialize_opt_u64;
use crate::util::clock::Clock;
use crate::util::random;

use super::discovery::DiscoveryClient;
use super::error::{Error, Result};
use super::id_token::{verify_id_token, VerifiedIdToken, VerifyOptions};
use super::Config;

/// Parameters a custom authorization request may carry through the form.
/// Anything else is dropped before the request is built.
pub const ALLOWED_QUERY_PARAMS: [&str; 8] = [
    "scope",
    "prompt",
    "max_age",
    "login_hint",
    "ui_locales",
    "acr_values",
    "response_type",
    "redirect_uri",
];

const DEFAULT_SCOPE: &str = "openid profile email";
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Code,
    Implicit,
    Hybrid,
}

impl FlowKind {
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Implicit => "id_token",
            Self::Hybrid => "code id_token",
        }
    }

    /// Code goes to the query callback; anything with a front-channel token
    /// lands on the fragment bridge.
    pub fn uses_fragment(&self) -> bool {
        !matches!(self, Self::Code)
    }

    pub fn uses_pkce(&self) -> bool {
        matches!(self, Self::Code | Self::Hybrid)
    }
}

/// The single-use binding between a dispatched authorization request and
/// the callback that answers it.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub state: String,
    pub nonce: String,
    pub code_verifier: Option<String>,
}

/// A request prepared for preview (`?show=1`) and reusable once with
/// `?use=1`.
#[derive(Debug, Clone)]
pub struct PreparedAuth {
    pub flow: FlowKind,
    pub pending: PendingAuth,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// What the OP sent back to the redirect URI, query- or fragment-delivered.
#[derive(Debug, Default, serde::Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_u64")]
    pub expires_in: Option<u64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// The authenticated session payload: the token set plus the userinfo
/// response, as the original keeps them side by side.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionUser {
    pub tokens: TokenSet,
    pub userinfo: Option<serde_json::Value>,
    pub claims: Option<VerifiedIdToken>,
}

/// Drives the RP side of every flow variant: builds authorization requests,
/// validates callbacks, exchanges codes, and fetches userinfo.
#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    discovery: Arc<DiscoveryClient>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        discovery: Arc<DiscoveryClient>,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            discovery,
            http,
            clock,
        }
    }

    pub fn callback_uri(&self) -> String {
        format!("{}/callback", self.config.base_url)
    }

    pub fn fragment_callback_uri(&self) -> String {
        format!("{}/callback/fragment", self.config.base_url)
    }

    pub fn post_logout_uri(&self) -> String {
        format!("{}/logout/callback", self.config.base_url)
    }

    /// Build a fresh authorization request for the flow: new state and
    /// nonce, and a PKCE pair where the flow redeems a code.
    pub fn prepare(&self, flow: FlowKind) -> PreparedAuth {
        let state = random::random_state();
        let nonce = random::random_string(32);

        let (code_verifier, code_challenge) = if flow.uses_pkce() {
            let (verifier, challenge) = pkce::Verifier::new_pair();
            (Some(verifier.value), Some(challenge))
        } else {
            (None, None)
        };

        let redirect_uri = if flow.uses_fragment() {
            self.fragment_callback_uri()
        } else {
            self.callback_uri()
        };

        let mut params = vec![
            ("response_type".to_string(), flow.response_type().to_string()),
            ("redirect_uri".to_string(), redirect_uri),
            ("scope".to_string(), DEFAULT_SCOPE.to_string()),
            ("state".to_string(), state.clone()),
            ("nonce".to_string(), nonce.clone()),
        ];
        if let Some(challenge) = code_challenge {
            params.push(("code_challenge".to_string(), challenge.code));
            params.push(("code_challenge_method".to_string(), "S256".to_string()));
        }

        PreparedAuth {
            flow,
            pending: PendingAuth {
                state,
                nonce,
                code_verifier,
            },
            params,
        }
    }

    /// Filter and normalize the custom-form parameters: unknown keys are
    /// dropped, state/nonce are always freshly generated, and redirect_uri
    /// accepts only the symbolic callback names.
    pub fn prepare_custom(&self, input: &BTreeMap<String, String>) -> Result<PreparedAuth> {
        let mut params: Vec<(String, String)> = ALLOWED_QUERY_PARAMS
            .iter()
            .filter_map(|key| {
                input
                    .get(*key)
                    .filter(|value| !value.is_empty())
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();

        let take = |params: &mut Vec<(String, String)>, name: &str| -> Option<String> {
            let index = params.iter().position(|(k, _)| k == name)?;
            Some(params.remove(index).1)
        };

        let response_type = take(&mut params, "response_type")
            .unwrap_or_else(|| "code".to_string());
        let flow = match response_type.as_str() {
            "code" => FlowKind::Code,
            "id_token" => FlowKind::Implicit,
            "code id_token" => FlowKind::Hybrid,
            _ => return Err(Error::Validation("unsupported response_type")),
        };

        let redirect_uri = match take(&mut params, "redirect_uri").as_deref() {
            Some("callback") | None => self.callback_uri(),
            Some("fragment") => self.fragment_callback_uri(),
            Some(_) => return Err(Error::Validation(
                "redirect_uri accepts only callback or fragment",
            )),
        };

        if take(&mut params, "scope").is_none() {
            params.push(("scope".to_string(), DEFAULT_SCOPE.to_string()));
        } else if let Some(scope) = input.get("scope") {
            params.push(("scope".to_string(), scope.clone()));
        }

        let state = random::random_state();
        let nonce = random::random_string(32);
        params.push(("response_type".to_string(), response_type));
        params.push(("redirect_uri".to_string(), redirect_uri));
        params.push(("state".to_string(), state.clone()));
        params.push(("nonce".to_string(), nonce.clone()));

        Ok(PreparedAuth {
            flow,
            pending: PendingAuth {
                state,
                nonce,
                code_verifier: None,
            },
            params,
        })
    }

    pub async fn authorization_url(&self, prepared: &PreparedAuth) -> Result<Url> {
        let metadata = self.discovery.metadata().await?;
        let mut url = Url::parse(&metadata.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .extend_pairs(prepared.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(url)
    }

    /// Validate a callback against the pending request and materialize the
    /// session. This is where state (CSRF) and nonce (replay) binding are
    /// enforced.
    pub async fn handle_callback(
        &self,
        pending: PendingAuth,
        redirect_uri: &str,
        params: CallbackParams,
    ) -> Result<SessionUser> {
        if let Some(error) = params.error {
            return Err(Error::protocol(error, params.error_description));
        }

        match params.state.as_deref() {
            Some(state) if state == pending.state => {}
            _ => {
                event!(Level::WARN, "Callback state does not match pending request");
                return Err(Error::Validation("state mismatch"));
            }
        }

        let issuer = self.discovery.metadata().await?.issuer.clone();
        let now = self.clock.now_unix();
        let verify_opts = VerifyOptions {
            issuer: &issuer,
            audience: &self.config.client_id,
            nonce: Some(&pending.nonce),
            now,
            clock_skew_secs: CLOCK_SKEW_SECS,
        };

        // Front-channel ID token (implicit and hybrid deliveries).
        let mut claims = match &params.id_token {
            Some(id_token) => {
                Some(verify_id_token(id_token, &self.discovery, verify_opts).await?)
            }
            None => None,
        };

        let mut tokens = TokenSet {
            access_token: params.access_token,
            token_type: params.token_type,
            expires_in: params.expires_in,
            id_token: params.id_token,
            ..TokenSet::default()
        };

        if let Some(code) = params.code {
            let exchanged = self
                .exchange_code(&code, redirect_uri, pending.code_verifier.as_deref())
                .await?;

            if let Some(id_token) = &exchanged.id_token {
                claims =
                    Some(verify_id_token(id_token, &self.discovery, verify_opts).await?);
            }
            tokens = exchanged;
        }

        let claims = claims.ok_or(Error::Validation("no id_token in response"))?;

        let userinfo = match &tokens.access_token {
            Some(access_token) => Some(self.userinfo(access_token).await?),
            None => None,
        };

        event!(Level::INFO, sub = %claims.sub, "Session established");
        Ok(SessionUser {
            tokens,
            userinfo,
            claims: Some(claims),
        })
    }

    /// Redeem an authorization code at the token endpoint with
    /// `client_secret_basic` authentication.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        let token_endpoint = self.discovery.metadata().await?.token_endpoint.clone();

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier.to_string()));
        }

        log_token_request(&token_endpoint, &form);

        let response = self
            .http
            .post(&token_endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Transient(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("bad token response: {}", e)))?;

        log_token_response(status.as_u16(), &body);

        if !status.is_success() {
            let error = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("invalid_request")
                .to_string();
            let description = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .map(ToString::to_string);
            return Err(Error::protocol(error, description));
        }

        Ok(serde_json::from_value(body)?)
    }

    /// Fetch the userinfo claims; one bounded retry on transient failure.
    pub async fn userinfo(&self, access_token: &str) -> Result<serde_json::Value> {
        match self.fetch_userinfo(access_token).await {
            Err(e) if e.is_retryable() => {
                event!(Level::WARN, error = %e, "Userinfo fetch failed, retrying once");
                self.fetch_userinfo(access_token).await
            }
            other => other,
        }
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<serde_json::Value> {
        let metadata = self.discovery.metadata().await?;
        let endpoint = metadata
            .userinfo_endpoint
            .clone()
            .ok_or(Error::Configuration(
                "provider publishes no userinfo_endpoint".to_string(),
            ))?;

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transient(format!(
                "userinfo returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("bad userinfo response: {}", e)))
    }

    /// RP-initiated logout target: the OP's end-session endpoint with an
    /// id_token_hint and a fresh opaque state.
    pub async fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        state: &str,
    ) -> Result<Url> {
        let metadata = self.discovery.metadata().await?;
        let endpoint = metadata
            .end_session_endpoint
            .clone()
            .ok_or(Error::Configuration(
                "provider publishes no end_session_endpoint".to_string(),
            ))?;

        let mut url = Url::parse(&endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(hint) = id_token_hint {
                pairs.append_pair("id_token_hint", hint);
            }
            pairs.append_pair("post_logout_redirect_uri", &self.post_logout_uri());
            pairs.append_pair("state", state);
        }
        Ok(url)
    }
}

/// Token-endpoint traffic is logged with credentials and token material
/// replaced by `***`; raw secrets never reach an observability sink.
fn log_token_request(url: &str, form: &[(&str, String)]) {
    let body: Vec<(&str, &str)> = form
        .iter()
        .map(|(k, v)| {
            if *k == "client_secret" {
                (*k, "***")
            } else {
                (*k, v.as_str())
            }
        })
        .collect();

    event!(
        target: "torii_rp::token",
        Level::INFO,
        %url,
        authorization = "***",
        body = ?body,
        "token_endpoint request"
    );
}

fn log_token_response(status: u16, body: &serde_json::Value) {
    event!(
        target: "torii_rp::token",
        Level::INFO,
        status,
        body = %redact_tokens(body),
        "token_endpoint response"
    );
}

fn redact_tokens(body: &serde_json::Value) -> serde_json::Value {
    let mut body = body.clone();
    if let Some(map) = body.as_object_mut() {
        for key in ["access_token", "refresh_token", "id_token"].iter() {
            if map.contains_key(*key) {
                map.insert(key.to_string(), serde_json::Value::String("***".to_string()));
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_masks_token_values() {
        let body = serde_json::json!({
            "access_token": "secret-a",
            "refresh_token": "secret-r",
            "id_token": "secret-i",
            "token_type": "Bearer",
            "expires_in": 3600,
        });

        let redacted = redact_tokens(&body);
        assert_eq!(redacted["access_token"], "***");
        assert_eq!(redacted["refresh_token"], "***");
        assert_eq!(redacted["id_token"], "***");
        assert_eq!(redacted["token_type"], "Bearer");
        assert_eq!(redacted["expires_in"], 3600);
    }
}
