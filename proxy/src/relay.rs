// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upstream DoH relay (RFC 8484 POST).
//
// The DNS payload is opaque here: bytes go out with
// `Content-Type: application/dns-message` and the response body comes back
// verbatim, whatever the upstream status.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

/// DoH media type (RFC 8484 Section 6).
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Bytes of a non-200 upstream body included in the log line.
const PREVIEW_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid resolver URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request: {0}")]
    Request(#[from] reqwest::Error),
}

/// Upstream answer. `status` is the resolver's HTTP status; `body` is
/// returned to the client even when the status is not 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RelayResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Forwards DNS wire-format queries to upstream DoH resolvers.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
}

impl Relay {
    /// Build a relay whose requests time out after `timeout`, or never when `None`.
    pub fn new(timeout: Option<Duration>) -> Result<Self, RelayError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("dohproxy/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// POST `query` to `server` and return its response.
    pub async fn forward(&self, query: Vec<u8>, server: &str) -> Result<RelayResponse, RelayError> {
        let url = parse_resolver_url(server)?;
        let query_len = query.len();

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .body(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status == reqwest::StatusCode::OK {
            debug!(server, query_len, response_len = body.len(), "relayed query");
        } else {
            let preview = &body[..body.len().min(PREVIEW_LEN)];
            warn!(
                server,
                status = status.as_u16(),
                response_len = body.len(),
                preview = %hex::encode(preview),
                "upstream resolver returned non-200 status"
            );
        }

        Ok(RelayResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Accept only absolute http(s) URLs with a host.
pub fn parse_resolver_url(server: &str) -> Result<Url, RelayError> {
    let invalid = |reason: &str| RelayError::InvalidUrl {
        url: server.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(server).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(invalid("scheme must be https or http"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_doh_urls() {
        let url = parse_resolver_url("https://resolver.example/dns-query").unwrap();
        assert_eq!(url.host_str(), Some("resolver.example"));
        assert!(parse_resolver_url("http://127.0.0.1:8053/dns-query").is_ok());
    }

    #[test]
    fn rejects_non_http_urls() {
        for server in ["", "resolver.example", "ftp://resolver.example/", "file:///etc/hosts"] {
            assert!(
                matches!(parse_resolver_url(server), Err(RelayError::InvalidUrl { .. })),
                "{server}"
            );
        }
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_request() {
        let relay = Relay::new(None).unwrap();
        let result = relay.forward(vec![0u8; 12], "not a url").await;
        assert!(matches!(result, Err(RelayError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn unreachable_resolver_is_request_error() {
        // Port 9 on localhost: nothing listens there in CI.
        let relay = Relay::new(Some(Duration::from_secs(2))).unwrap();
        let result = relay.forward(vec![0u8; 12], "http://127.0.0.1:9/dns-query").await;
        assert!(matches!(result, Err(RelayError::Request(_))));
    }
}
