//! HTTP relay tests: auth gate, round-robin selection, and failure mapping.

use axum::http::StatusCode;
use relay_proxy::config::BackendConfig;
use tokio_tungstenite::tungstenite;

mod common;

#[tokio::test]
async fn test_missing_or_unknown_token_never_reaches_backend() {
    let backend = common::start_mock_backend("a").await;
    let proxy = common::start_proxy(common::proxy_config(vec![backend.config("a")])).await;
    let client = common::http_client();

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.text().await.unwrap(), "Forbidden");

    let res = client
        .post(proxy.url("/orders"))
        .header("x-auth-token", "not-a-token")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // An empty header value is never a credential.
    let res = client
        .get(proxy.url("/"))
        .header("x-auth-token", "")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    match common::connect_ws(&proxy.ws_url("/ws"), None).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::FORBIDDEN)
        }
        Err(other) => panic!("expected HTTP 403, got {}", other),
        Ok(_) => panic!("upgrade without a token must be refused"),
    }

    assert_eq!(backend.hits(), 0, "rejected requests must not reach a backend");
    assert_eq!(proxy.sessions.active_count(), 0);
}

#[tokio::test]
async fn test_accepts_header_and_bearer_tokens() {
    let backend = common::start_mock_backend("a").await;
    let proxy = common::start_proxy(common::proxy_config(vec![backend.config("a")])).await;
    let client = common::http_client();

    let res = client
        .get(proxy.url("/"))
        .header("x-auth-token", common::TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(proxy.url("/"))
        .bearer_auth("valid-token-2")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_round_robin_across_backends() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;
    let proxy =
        common::start_proxy(common::proxy_config(vec![a.config("a"), b.config("b")])).await;
    let client = common::http_client();

    let mut seen = Vec::new();
    for _ in 0..5 {
        let res = client
            .get(proxy.url("/"))
            .header("x-auth-token", common::TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        seen.push(res.text().await.unwrap());
    }

    assert_eq!(seen, ["a", "b", "a", "b", "a"]);
    assert_eq!(a.hits(), 3);
    assert_eq!(b.hits(), 2);
}

#[tokio::test]
async fn test_forwarded_request_targets_backend() {
    let backend = common::start_mock_backend("a").await;
    let proxy = common::start_proxy(common::proxy_config(vec![backend.config("a")])).await;
    let client = common::http_client();

    let res = client
        .get(proxy.url("/api/items?page=2&sort=asc"))
        .header("x-auth-token", common::TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let header = |name: &str| {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    assert_eq!(header("x-seen-uri"), "/api/items?page=2&sort=asc");
    assert_eq!(header("x-seen-host"), backend.addr.to_string());
    assert_eq!(header("x-seen-forwarded-for"), "127.0.0.1");
    assert!(
        res.headers().contains_key("x-request-id"),
        "request id is echoed to the client"
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let dead = common::unused_addr();
    let live = common::start_mock_backend("live").await;
    let proxy = common::start_proxy(common::proxy_config(vec![
        BackendConfig::new("dead", format!("http://{}", dead)),
        live.config("live"),
    ]))
    .await;
    let client = common::http_client();

    let res = client
        .get(proxy.url("/"))
        .header("x-auth-token", common::TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    // No retry: the failed request did not fall through to the next backend,
    // and the rotation still advanced past it.
    assert_eq!(live.hits(), 0);
    let res = client
        .get(proxy.url("/"))
        .header("x-auth-token", common::TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "live");
}
