// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Test harness: a stub upstream resolver and a proxy wired to it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use dohproxy::auth::{sign_token, Claims, TokenAuthorizer};
use dohproxy::relay::Relay;
use dohproxy::{router, AppState, Config};
use ed448_goldilocks_plus::SigningKey;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const REALM: &str = "DNS-over-HTTPS Proxy";
pub const TENANT: &str = "DNS-over-HTTPS-proxy";

/// Prefix the stub resolver puts in front of every query it echoes.
pub const ANSWER_PREFIX: &[u8] = b"answer:";

/// Canned DNS query for `example.com. IN A`.
pub const QUERY: &[u8] = &[
    0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x',
    b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
];

/// The response the stub resolver gives for `query`.
pub fn expected_answer(query: &[u8]) -> Vec<u8> {
    [ANSWER_PREFIX, query].concat()
}

async fn echo_resolver(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if content_type != Some("application/dns-message") {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "wrong content type").into_response();
    }
    (
        [(header::CONTENT_TYPE, "application/dns-message")],
        expected_answer(&body),
    )
        .into_response()
}

async fn failing_resolver() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "resolver overloaded").into_response()
}

/// A local DoH resolver stub.
pub struct StubResolver {
    pub addr: SocketAddr,
}

impl StubResolver {
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/dns-query", post(echo_resolver))
            .route("/broken", post(failing_resolver));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr }
    }

    pub fn url(&self) -> String {
        format!("http://{}/dns-query", self.addr)
    }

    pub fn broken_url(&self) -> String {
        format!("http://{}/broken", self.addr)
    }
}

/// The proxy under test plus what a client needs to talk to it.
pub struct TestProxy {
    pub state: Arc<AppState>,
    pub app: Router,
    pub signing_key: SigningKey,
    pub resolver: StubResolver,
}

impl TestProxy {
    pub async fn start() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let authorizer = TokenAuthorizer::new(REALM, TENANT, signing_key.verifying_key());
        let relay = Relay::new(Some(Duration::from_secs(5))).unwrap();

        let state = Arc::new(AppState::new(config, relay, Arc::new(authorizer)));
        let app = router(Arc::clone(&state));
        let resolver = StubResolver::start().await;

        Self {
            state,
            app,
            signing_key,
            resolver,
        }
    }

    pub fn token(&self) -> String {
        self.token_for(TENANT)
    }

    pub fn token_for(&self, tenant: &str) -> String {
        sign_token(
            &self.signing_key,
            &Claims {
                sub: "test-client".to_string(),
                tenant: tenant.to_string(),
                exp: chrono::Utc::now().timestamp() + 3600,
            },
        )
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    pub async fn get_certificate(&self) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::get("/certificate")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token()))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_authorized(&self, uri: &str, body: Vec<u8>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token()))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_sa_query(&self, id: &str, frame: Vec<u8>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::post(format!("/sas/{id}/dns-query"))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(frame))
            .unwrap();
        self.send(request).await
    }
}
