use std::sync::Arc;

use warp::Filter;

use crate::auth::{ChallengeInfo, Decision};
use crate::core::types::ChallengeId;
use crate::http::encoding::error::AuthRejection;
use crate::provider::OidcProvider;

use super::OP_SESSION_COOKIE;

#[derive(Debug, serde::Deserialize)]
struct DecisionForm {
    challenge_id: ChallengeId,
    #[serde(flatten)]
    decision: Decision,
}

/// Built-in dev interaction: a login/consent form in place of a real
/// authentication stack, like the upstream provider's dev interactions.
pub fn interaction_endpoint(
    provider: Arc<OidcProvider>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_provider = warp::any().map(move || provider.clone());

    let form = warp::path!("auth" / "interaction" / ChallengeId)
        .and(warp::get())
        .and(with_provider.clone())
        .and_then(|id: ChallengeId, provider: Arc<OidcProvider>| async move {
            match provider.get_challenge_info(&id).await {
                Some(info) => Ok(warp::reply::html(render_form(&info))),
                None => Err(warp::reject::custom(AuthRejection::BadAuthorization(
                    crate::auth::BadAuthorizationRequest::BadChallenge,
                ))),
            }
        });

    let decision = warp::path!("auth" / "decision")
        .and(warp::post())
        .and(with_provider)
        .and(warp::body::form())
        .and_then(
            |provider: Arc<OidcProvider>, form: DecisionForm| async move {
                use warp::Reply;

                match provider
                    .decide_challenge(&form.challenge_id, form.decision)
                    .await
                {
                    Ok((subject, redirect)) => {
                        // Subjects that would not survive a cookie header
                        // simply don't get a persistent OP session.
                        if subject_is_cookie_safe(&subject) {
                            let cookie = format!(
                                "{}={}; Path=/; HttpOnly",
                                OP_SESSION_COOKIE, subject
                            );
                            Ok(warp::reply::with_header(
                                redirect.into_response(),
                                "Set-Cookie",
                                cookie,
                            )
                            .into_response())
                        } else {
                            Ok(redirect.into_response())
                        }
                    }
                    Err(e) => Err(warp::reject::custom(AuthRejection::from(e))),
                }
            },
        );

    form.or(decision)
}

fn subject_is_cookie_safe(subject: &str) -> bool {
    !subject.is_empty()
        && subject
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_form(info: &ChallengeInfo) -> String {
    let subject = escape_html(info.login_hint.as_deref().unwrap_or("user"));
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8" /><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<p>Client <code>{client_id}</code> requests <code>{scope}</code>.</p>
<form method="post" action="/auth/decision">
  <input type="hidden" name="challenge_id" value="{challenge_id}" />
  <p><label>Username: <input name="subject" value="{subject}" /></label></p>
  <p>
    <button type="submit" name="action" value="accept">Sign in and consent</button>
    <button type="submit" name="action" value="reject">Deny</button>
  </p>
</form>
</body>
</html>
"#,
        client_id = escape_html(&info.client_id.0),
        scope = escape_html(&info.scope.as_joined()),
        challenge_id = escape_html(&info.id.0),
        subject = subject,
    )
}
