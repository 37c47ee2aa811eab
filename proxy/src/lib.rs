// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! DNS-over-HTTPS proxy with application-layer security associations.
//!
//! Clients either relay queries directly (bearer-token authorization only) or
//! bootstrap a security association once with an RSA-wrapped envelope and
//! then seal every query/response pair with AES-256-GCM under the SA key:
//!
//! - `GET  /certificate`         current ephemeral certificate
//! - `POST /dns-query`           plain `{data, server}` relay
//! - `POST /sas/`                bootstrap an SA from candidate envelopes
//! - `POST /sas/{id}/dns-query`  relay a query sealed under SA `id`

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod relay;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_request_bytes();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/certificate", get(handlers::certificate))
        .route("/dns-query", post(handlers::dns_query))
        .route("/sas", post(handlers::create_sa))
        .route("/sas/", post(handlers::create_sa))
        .route("/sas/:id/dns-query", post(handlers::sa_dns_query))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
