use std::sync::Arc;
use std::time::Duration;

use torii::provider::token::TokenTtl;
use torii::provider::OidcProvider;
use torii::rp::flow::{CallbackParams, FlowKind};
use torii::rp::server::RpContext;
use torii::util::clock::SystemClock;

const RP_BASE: &str = "http://localhost:3000";

/// Serve a full OP on an ephemeral localhost port and wait until its
/// discovery document answers.
async fn spawn_op(configure: impl FnOnce(&mut torii::provider::Config)) -> (String, Arc<OidcProvider>) {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let issuer = format!("http://127.0.0.1:{}", port);

    let mut config = torii::provider::Config {
        issuer: issuer.clone(),
        listen: format!("127.0.0.1:{}", port).parse().unwrap(),
        rp_base_url: RP_BASE.to_string(),
        client_id: "rp-client".to_string(),
        client_secret: "rp-secret".to_string(),
        hash_secret: "test-hash-secret".to_string(),
        dev_auto_approve: true,
        allow_plain_pkce: false,
        ttl: TokenTtl::default(),
    };
    configure(&mut config);
    let listen = config.listen;

    let provider = Arc::new(OidcProvider::new(config, Arc::new(SystemClock)).unwrap());
    provider.seed_clients().await.unwrap();

    let routes = torii::http::server::routes(Arc::clone(&provider));
    tokio::spawn(warp::serve(routes).run(listen));

    let http = reqwest::Client::new();
    let discovery_url = format!("{}/.well-known/openid-configuration", issuer);
    for _ in 0..50u32 {
        if let Ok(response) = http.get(&discovery_url).send().await {
            if response.status().is_success() {
                return (issuer, provider);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("OP did not come up on {}", issuer);
}

fn rp_context(issuer: &str) -> Arc<RpContext> {
    let config = torii::rp::Config {
        base_url: RP_BASE.to_string(),
        listen: "127.0.0.1:3000".parse().unwrap(),
        issuer: issuer.to_string(),
        client_id: "rp-client".to_string(),
        client_secret: "rp-secret".to_string(),
        cookie_name: "torii_rp_session".to_string(),
    };
    torii::rp::context(config, Arc::new(SystemClock))
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Follow the authorization redirect and split the callback parameters out
/// of the Location header, from the query or the fragment.
async fn authorize(url: url::Url) -> (String, CallbackParams) {
    let response = no_redirect_client().get(url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 303);

    let location = response
        .headers()
        .get("Location")
        .expect("authorization response must redirect")
        .to_str()
        .unwrap()
        .to_string();
    let target = url::Url::parse(&location).unwrap();

    let raw = match target.fragment() {
        Some(fragment) => fragment.to_string(),
        None => target.query().unwrap_or("").to_string(),
    };
    let params: CallbackParams = serde_urlencoded::from_str(&raw).unwrap();
    (location, params)
}

#[tokio::test]
async fn discovery_client_resolves_op_metadata() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let url = ctx
        .orchestrator
        .authorization_url(&ctx.orchestrator.prepare(FlowKind::Code))
        .await
        .unwrap();
    assert!(url.as_str().starts_with(&format!("{}/auth", issuer)));
}

#[tokio::test]
async fn code_flow_end_to_end() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Code);
    assert!(prepared.pending.code_verifier.is_some());

    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (location, params) = authorize(url).await;
    assert!(location.starts_with(&format!("{}/callback?", RP_BASE)));
    assert!(params.code.is_some());
    assert_eq!(params.state.as_deref(), Some(prepared.pending.state.as_str()));

    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .unwrap();

    let claims = user.claims.as_ref().unwrap();
    assert_eq!(claims.sub, "user");
    assert_eq!(
        claims.nonce.as_deref(),
        Some(prepared.pending.nonce.as_str())
    );
    assert!(user.tokens.access_token.is_some());
    assert!(user.tokens.refresh_token.is_some());
    assert!(user.tokens.id_token.is_some());

    // Userinfo subject matches the ID token's
    let userinfo = user.userinfo.as_ref().unwrap();
    assert_eq!(userinfo["sub"].as_str(), Some(claims.sub.as_str()));
}

#[tokio::test]
async fn implicit_flow_establishes_session_without_refresh_token() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Implicit);
    assert!(prepared.pending.code_verifier.is_none());

    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (location, params) = authorize(url).await;
    assert!(location.starts_with(&format!("{}/callback/fragment#", RP_BASE)));
    assert!(params.id_token.is_some());
    assert!(params.code.is_none());

    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.fragment_callback_uri(),
            params,
        )
        .await
        .unwrap();

    assert!(user.tokens.refresh_token.is_none());
    assert!(user.tokens.access_token.is_none());
    assert_eq!(user.claims.unwrap().sub, "user");
    assert!(user.userinfo.is_none());
}

#[tokio::test]
async fn hybrid_flow_exchanges_the_code_half() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Hybrid);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    assert!(params.code.is_some());
    assert!(params.id_token.is_some());

    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.fragment_callback_uri(),
            params,
        )
        .await
        .unwrap();

    // The code half was redeemed for the full token set
    assert!(user.tokens.access_token.is_some());
    assert!(user.tokens.refresh_token.is_some());
    assert_eq!(user.claims.unwrap().sub, "user");
    assert!(user.userinfo.is_some());
}

#[tokio::test]
async fn state_mismatch_prevents_session() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Code);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, mut params) = authorize(url).await;

    params.state = Some("attacker-chosen".to_string());
    let err = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        torii::rp::error::Error::Validation("state mismatch")
    ));
}

#[tokio::test]
async fn missing_state_prevents_session() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Code);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, mut params) = authorize(url).await;

    params.state = None;
    assert!(ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .is_err());
}

#[tokio::test]
async fn nonce_mismatch_invalidates_id_token() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Implicit);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;

    let mut pending = prepared.pending.clone();
    pending.nonce = "some-other-nonce".to_string();

    let err = ctx
        .orchestrator
        .handle_callback(pending, &ctx.orchestrator.fragment_callback_uri(), params)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        torii::rp::error::Error::Validation("nonce mismatch")
    ));
}

#[tokio::test]
async fn code_replay_fails_at_the_token_endpoint() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let prepared = ctx.orchestrator.prepare(FlowKind::Code);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    let code = params.code.clone().unwrap();

    ctx.orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .unwrap();

    let err = ctx
        .orchestrator
        .exchange_code(
            &code,
            &ctx.orchestrator.callback_uri(),
            prepared.pending.code_verifier.as_deref(),
        )
        .await
        .unwrap_err();
    match err {
        torii::rp::error::Error::Protocol { error, .. } => assert_eq!(error, "invalid_grant"),
        other => panic!("expected invalid_grant, got {}", other),
    }
}

#[tokio::test]
async fn jwks_rotation_is_tolerated_via_refetch() {
    let (issuer, provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    // Prime the JWKS cache with the original key
    let prepared = ctx.orchestrator.prepare(FlowKind::Implicit);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    ctx.orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.fragment_callback_uri(),
            params,
        )
        .await
        .unwrap();

    // Rotate: new tokens are signed with a kid the cache has not seen
    provider.key_store().rotate().unwrap();

    let prepared = ctx.orchestrator.prepare(FlowKind::Implicit);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.fragment_callback_uri(),
            params,
        )
        .await
        .unwrap();
    assert_eq!(user.claims.unwrap().sub, "user");
}

#[tokio::test]
async fn logout_round_trip_lands_on_registered_uri() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    // Establish a session to get an id_token_hint
    let prepared = ctx.orchestrator.prepare(FlowKind::Code);
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .unwrap();

    let id_token = user.tokens.id_token.unwrap();
    let end_session = ctx
        .orchestrator
        .end_session_url(Some(&id_token), "logout-state-1")
        .await
        .unwrap();
    assert!(end_session
        .as_str()
        .starts_with(&format!("{}/session/end", issuer)));

    let response = no_redirect_client().get(end_session).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 303);
    let location = response
        .headers()
        .get("Location")
        .unwrap()
        .to_str()
        .unwrap();
    let target = url::Url::parse(location).unwrap();
    assert_eq!(
        &target[..url::Position::AfterPath],
        format!("{}/logout/callback", RP_BASE)
    );
    assert!(target
        .query_pairs()
        .any(|(k, v)| k == "state" && v == "logout-state-1"));
}

#[tokio::test]
async fn custom_request_filters_unknown_parameters() {
    let (issuer, _provider) = spawn_op(|_| {}).await;
    let ctx = rp_context(&issuer);

    let mut input = std::collections::BTreeMap::new();
    input.insert("response_type".to_string(), "code".to_string());
    input.insert("redirect_uri".to_string(), "callback".to_string());
    input.insert("login_hint".to_string(), "alice".to_string());
    input.insert("evil_param".to_string(), "1".to_string());

    let prepared = ctx.orchestrator.prepare_custom(&input).unwrap();
    assert!(prepared
        .params
        .iter()
        .all(|(k, _)| k != "evil_param"));
    assert!(prepared
        .params
        .iter()
        .any(|(k, v)| k == "login_hint" && v == "alice"));
    assert!(prepared.params.iter().any(|(k, v)| k == "scope" && v == "openid profile email"));

    // The hinted subject comes back in the session
    let url = ctx.orchestrator.authorization_url(&prepared).await.unwrap();
    let (_, params) = authorize(url).await;
    let user = ctx
        .orchestrator
        .handle_callback(
            prepared.pending.clone(),
            &ctx.orchestrator.callback_uri(),
            params,
        )
        .await
        .unwrap();
    assert_eq!(user.claims.unwrap().sub, "alice");

    // Forged symbolic names are refused outright
    let mut forged = std::collections::BTreeMap::new();
    forged.insert(
        "redirect_uri".to_string(),
        "http://evil.example/callback".to_string(),
    );
    assert!(ctx.orchestrator.prepare_custom(&forged).is_err());
}
