use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{event, Level};
use warp::reply::Reply;
use warp::{Filter, Rejection};

use crate::http::response::see_other;

use super::error::Error;
use super::flow::{CallbackParams, FlowKind, Orchestrator, PreparedAuth};
use super::pages;
use super::session::{SessionId, SessionStore};

pub struct RpContext {
    pub orchestrator: Orchestrator,
    pub sessions: SessionStore,
    pub cookie_name: &'static str,
}

#[derive(Debug)]
struct RpRejection(Error);

impl warp::reject::Reject for RpRejection {}

fn reject(e: Error) -> Rejection {
    warp::reject::custom(RpRejection(e))
}

#[derive(Debug, serde::Deserialize)]
struct LoginQuery {
    show: Option<String>,
    #[serde(rename = "use")]
    use_pending: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct LogoutCallbackQuery {
    state: Option<String>,
}

pub fn routes(
    ctx: Arc<RpContext>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_ctx = {
        let ctx = Arc::clone(&ctx);
        warp::any().map(move || Arc::clone(&ctx))
    };

    let session = with_ctx
        .clone()
        .and(warp::cookie::optional::<String>(ctx.cookie_name))
        .and_then(|ctx: Arc<RpContext>, cookie: Option<String>| async move {
            Ok::<_, Rejection>(ctx.sessions.ensure(cookie).await)
        });

    let home = warp::path::end()
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and_then(home);

    let login_code = warp::path!("login")
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::query::query())
        .and_then(|ctx, session, q| login(ctx, session, q, FlowKind::Code, "/login"));

    let login_implicit = warp::path!("login" / "implicit")
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::query::query())
        .and_then(|ctx, session, q| {
            login(ctx, session, q, FlowKind::Implicit, "/login/implicit")
        });

    let login_hybrid = warp::path!("login" / "hybrid")
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::query::query())
        .and_then(|ctx, session, q| login(ctx, session, q, FlowKind::Hybrid, "/login/hybrid"));

    let custom_form = warp::path!("login" / "custom")
        .and(warp::get())
        .and(session.clone())
        .and(with_ctx.clone())
        .and_then(|session, ctx: Arc<RpContext>| async move {
            let (sid, created) = session;
            Ok::<_, Rejection>(with_session_cookie(
                warp::reply::html(pages::custom_form_page()),
                &ctx,
                &sid,
                created,
            ))
        });

    let custom_submit = warp::path!("login" / "custom")
        .and(warp::post())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::body::form::<BTreeMap<String, String>>())
        .and_then(custom_login);

    let query_callback = warp::path!("callback")
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::query::query())
        .and_then(|ctx, session, params| callback(ctx, session, params, false));

    let fragment_bridge = warp::path!("callback" / "fragment")
        .and(warp::get())
        .and(with_ctx.clone())
        .and_then(|ctx: Arc<RpContext>| async move {
            let page = pages::fragment_bridge_page(&ctx.orchestrator.fragment_callback_uri());
            Ok::<_, Rejection>(warp::reply::html(page))
        });

    let fragment_submit = warp::path!("callback" / "fragment")
        .and(warp::post())
        .and(with_ctx.clone())
        .and(session.clone())
        .and(warp::body::form::<CallbackParams>())
        .and_then(|ctx, session, params| callback(ctx, session, params, true));

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(with_ctx.clone())
        .and(session.clone())
        .and_then(logout);

    let logout_callback = warp::path!("logout" / "callback")
        .and(warp::get())
        .and(with_ctx)
        .and(session)
        .and(warp::query::query())
        .and_then(logout_callback);

    home.or(login_code)
        .or(login_implicit)
        .or(login_hybrid)
        .or(custom_form)
        .or(custom_submit)
        .or(query_callback)
        .or(fragment_bridge)
        .or(fragment_submit)
        .or(logout)
        .or(logout_callback)
        .recover(handle_reject)
        .with(warp::log("rp-http"))
}

fn with_session_cookie(
    reply: impl Reply,
    ctx: &RpContext,
    sid: &SessionId,
    created: bool,
) -> warp::reply::Response {
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly", ctx.cookie_name, sid.0);
        warp::reply::with_header(reply, "Set-Cookie", cookie).into_response()
    } else {
        reply.into_response()
    }
}

async fn home(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
) -> Result<warp::reply::Response, Rejection> {
    let data = ctx.sessions.get(&sid).await;
    let page = pages::home_page(data.user.as_ref());
    Ok(with_session_cookie(
        warp::reply::html(page),
        &ctx,
        &sid,
        created,
    ))
}

fn params_pretty(prepared: &PreparedAuth) -> String {
    let map: BTreeMap<&str, &str> = prepared
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
}

async fn login(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
    q: LoginQuery,
    flow: FlowKind,
    path: &'static str,
) -> Result<warp::reply::Response, Rejection> {
    let show = q.show.as_deref() == Some("1");
    let use_pending = q.use_pending.as_deref() == Some("1");

    // Reuse the previewed request only for the flow it was prepared for;
    // a mismatched preview stays parked.
    let prepared = if use_pending {
        match ctx.sessions.take_prepared(&sid).await {
            Some(p) if p.flow == flow => Some(p),
            Some(other) => {
                ctx.sessions
                    .update(&sid, move |data| data.prepared = Some(other))
                    .await;
                None
            }
            None => None,
        }
    } else {
        None
    };
    let prepared = prepared.unwrap_or_else(|| ctx.orchestrator.prepare(flow));

    let url = ctx
        .orchestrator
        .authorization_url(&prepared)
        .await
        .map_err(reject)?;

    if show {
        let params_json = params_pretty(&prepared);
        let page = pages::login_preview_page(
            &format!("Authorization request ({})", flow.response_type()),
            &params_json,
            url.as_str(),
            &format!("{}?use=1", path),
        );
        ctx.sessions
            .update(&sid, move |data| data.prepared = Some(prepared))
            .await;
        return Ok(with_session_cookie(
            warp::reply::html(page),
            &ctx,
            &sid,
            created,
        ));
    }

    let pending = prepared.pending.clone();
    ctx.sessions
        .update(&sid, move |data| data.pending = Some(pending))
        .await;

    Ok(with_session_cookie(
        see_other(url.as_str()),
        &ctx,
        &sid,
        created,
    ))
}

async fn custom_login(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
    input: BTreeMap<String, String>,
) -> Result<warp::reply::Response, Rejection> {
    let prepared = ctx.orchestrator.prepare_custom(&input).map_err(reject)?;
    let url = ctx
        .orchestrator
        .authorization_url(&prepared)
        .await
        .map_err(reject)?;

    let params_json = params_pretty(&prepared);
    let pending = prepared.pending.clone();
    ctx.sessions
        .update(&sid, move |data| data.pending = Some(pending))
        .await;

    let page = pages::custom_preview_page(&params_json, url.as_str());
    Ok(with_session_cookie(
        warp::reply::html(page),
        &ctx,
        &sid,
        created,
    ))
}

async fn callback(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
    params: CallbackParams,
    fragment: bool,
) -> Result<warp::reply::Response, Rejection> {
    let pending = ctx
        .sessions
        .take_pending(&sid)
        .await
        .ok_or_else(|| reject(Error::Validation("no pending authorization request")))?;

    let redirect_uri = if fragment {
        ctx.orchestrator.fragment_callback_uri()
    } else {
        ctx.orchestrator.callback_uri()
    };

    let user = ctx
        .orchestrator
        .handle_callback(pending, &redirect_uri, params)
        .await
        .map_err(reject)?;

    ctx.sessions
        .update(&sid, move |data| data.user = Some(user))
        .await;

    Ok(with_session_cookie(see_other("/"), &ctx, &sid, created))
}

async fn logout(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
) -> Result<warp::reply::Response, Rejection> {
    let data = ctx.sessions.get(&sid).await;
    let id_token = data.user.and_then(|user| user.tokens.id_token);

    let state = crate::util::random::random_state();
    let url = ctx
        .orchestrator
        .end_session_url(id_token.as_deref(), &state)
        .await
        .map_err(reject)?;

    ctx.sessions.destroy(&sid, Some(state)).await;

    Ok(with_session_cookie(
        see_other(url.as_str()),
        &ctx,
        &sid,
        created,
    ))
}

async fn logout_callback(
    ctx: Arc<RpContext>,
    (sid, created): (SessionId, bool),
    q: LogoutCallbackQuery,
) -> Result<warp::reply::Response, Rejection> {
    let stored = ctx.sessions.get(&sid).await.logout_state;
    if let Some(stored) = stored {
        if q.state.as_deref() != Some(stored.as_str()) {
            return Err(reject(Error::Validation("logout state mismatch")));
        }
        ctx.sessions
            .update(&sid, |data| data.logout_state = None)
            .await;
    }

    Ok(with_session_cookie(
        warp::reply::html(pages::logout_done_page()),
        &ctx,
        &sid,
        created,
    ))
}

async fn handle_reject(err: Rejection) -> Result<impl Reply, Rejection> {
    use warp::http::StatusCode;

    if let Some(RpRejection(e)) = err.find::<RpRejection>() {
        event!(Level::WARN, error = %e, "Request failed");
        let status = match e {
            Error::Protocol { .. } | Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let page = pages::error_page(&e.to_string());
        return Ok(warp::reply::with_status(warp::reply::html(page), status).into_response());
    }

    if err.is_not_found() {
        return Err(err);
    }

    if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        let page = pages::error_page("malformed request parameters");
        return Ok(
            warp::reply::with_status(warp::reply::html(page), StatusCode::BAD_REQUEST)
                .into_response(),
        );
    }

    event!(Level::ERROR, rejection = ?err, "Unhandled rejection");
    let page = pages::error_page("internal error");
    return Ok(warp::reply::with_status(
        warp::reply::html(page),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response());
}
