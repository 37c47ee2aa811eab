// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! HTTP handlers for the DoH proxy.
//!
//! - `GET  /certificate`          current ephemeral certificate (authorized)
//! - `POST /dns-query`            plain relay of a `{data, server}` query (authorized)
//! - `POST /sas/`                 bootstrap a security association (authorized)
//! - `POST /sas/{id}/dns-query`   relay a query sealed under SA `id`

use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dohproxy_common::{Bootstrapper, Envelope, KeyPairManager, ProxyRequest, SaStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{Authorizer, Principal, Unauthorized};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::relay::{Relay, RelayError, RelayResponse, DNS_MESSAGE_CONTENT_TYPE};

/// Media type of the DER certificate responses.
pub const CERTIFICATE_CONTENT_TYPE: &str = "application/x-x509-user-cert";

/// Shared application state.
pub struct AppState {
    pub keys: Arc<KeyPairManager>,
    pub sas: Arc<SaStore>,
    pub bootstrapper: Bootstrapper,
    pub relay: Relay,
    pub authorizer: Arc<dyn Authorizer>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, relay: Relay, authorizer: Arc<dyn Authorizer>) -> Self {
        let keys = Arc::new(KeyPairManager::new(config.keypair_settings()));
        let sas = Arc::new(SaStore::new(config.sa_lifetime()));
        Self {
            bootstrapper: Bootstrapper::new(Arc::clone(&keys), Arc::clone(&sas)),
            keys,
            sas,
            relay,
            authorizer,
            config,
        }
    }
}

/// Extractor for requests that passed the configured [`Authorizer`].
pub struct Authorized(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = Unauthorized;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        state.authorizer.authorize(&parts.headers).map(Authorized)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "dohproxy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Return the DER certificate of the current ephemeral keypair, rotating it
/// first if it expired.
pub async fn certificate(
    State(state): State<Arc<AppState>>,
    Authorized(principal): Authorized,
) -> Result<Response> {
    let keys = Arc::clone(&state.keys);
    let keypair = tokio::task::spawn_blocking(move || keys.current())
        .await
        .map_err(|e| AppError::Internal(format!("key pair task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("error getting ephemeral key pair: {e}")))?;

    debug!(subject = %principal.subject, key_id = %keypair.key_id(), "serving certificate");
    Ok(certificate_response(StatusCode::OK, keypair.certificate().to_vec()))
}

/// Relay a plain query.
pub async fn dns_query(
    State(state): State<Arc<AppState>>,
    Authorized(principal): Authorized,
    body: Bytes,
) -> Result<Response> {
    let request = parse_proxy_request(&body, state.config.upstream.max_message_bytes)?;
    debug!(subject = %principal.subject, server = %request.server, "plain query");

    let response = relay(&state.relay, request).await?;
    let status = relayed_status(&response);
    Ok(dns_message_response(status, response.body))
}

/// Bootstrap a security association from a list of candidate envelopes.
///
/// Answers `201 Created` on success and `424 Failed Dependency` when no
/// envelope was wrapped for the current key; both carry the current
/// certificate so the client can retry against it.
pub async fn create_sa(
    State(state): State<Arc<AppState>>,
    Authorized(principal): Authorized,
    body: Bytes,
) -> Result<Response> {
    let candidates: Vec<Envelope> = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("error parsing envelope: {e}")))?;
    let submitted = candidates.len();

    let bootstrap = state
        .bootstrapper
        .try_establish(candidates)
        .await
        .map_err(|e| AppError::Internal(format!("error getting ephemeral key pair: {e}")))?;

    match bootstrap.outcome {
        Ok(sa) => {
            info!(
                subject = %principal.subject,
                sa = %sa.id(),
                submitted,
                "security association created"
            );
            Ok(certificate_response(StatusCode::CREATED, bootstrap.certificate))
        }
        Err(e) if e.is_key_mismatch() => {
            info!(
                subject = %principal.subject,
                key_id = %bootstrap.key_id,
                submitted,
                "encryption key mismatch"
            );
            Ok(certificate_response(StatusCode::FAILED_DEPENDENCY, bootstrap.certificate))
        }
        Err(e) if e.is_malformed() => Err(AppError::BadRequest(format!("error decrypting request: {e}"))),
        Err(e) => Err(AppError::from(e)),
    }
}

/// Relay a query sealed under an established security association.
pub async fn sa_dns_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response> {
    let sa = state
        .sas
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("SA '{}' not found", id)))?;

    let payload = sa
        .decrypt(&body)
        .map_err(|e| AppError::BadRequest(format!("decrypt failed: {e}")))?;
    let request = parse_proxy_request(&payload, state.config.upstream.max_message_bytes)?;
    debug!(sa = %sa.id(), server = %request.server, "encrypted query");

    let response = relay(&state.relay, request).await?;
    let status = relayed_status(&response);
    let sealed = sa
        .encrypt(&response.body)
        .map_err(|e| AppError::Internal(format!("encrypt failed: {e}")))?;

    Ok((
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))],
        sealed,
    )
        .into_response())
}

fn parse_proxy_request(json: &[u8], max_message_bytes: usize) -> Result<ProxyRequest> {
    let request: ProxyRequest = serde_json::from_slice(json)
        .map_err(|e| AppError::BadRequest(format!("error parsing request: {e}")))?;
    if request.data.is_empty() {
        return Err(AppError::BadRequest("empty DNS query".to_string()));
    }
    if request.data.len() > max_message_bytes {
        return Err(AppError::BadRequest(format!(
            "DNS query too large: {} > {}",
            request.data.len(),
            max_message_bytes
        )));
    }
    Ok(request)
}

async fn relay(relay: &Relay, request: ProxyRequest) -> Result<RelayResponse> {
    relay
        .forward(request.data, &request.server)
        .await
        .map_err(|e| match e {
            RelayError::InvalidUrl { .. } => AppError::BadRequest(e.to_string()),
            RelayError::Request(_) => AppError::Upstream(e.to_string()),
        })
}

/// 200 when the resolver answered 200, 502 otherwise. The resolver's body is
/// forwarded either way.
fn relayed_status(response: &RelayResponse) -> StatusCode {
    if response.is_ok() {
        StatusCode::OK
    } else {
        warn!(status = response.status, "forwarding non-200 upstream response");
        StatusCode::BAD_GATEWAY
    }
}

fn certificate_response(status: StatusCode, der: Vec<u8>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(CERTIFICATE_CONTENT_TYPE))],
        der,
    )
        .into_response()
}

fn dns_message_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(DNS_MESSAGE_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        body,
    )
        .into_response()
}
