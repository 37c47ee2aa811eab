// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bearer-token authorization (Ed448, RFC 8032 Section 5.2.6).
//
// Token format:
//   base64url(claims JSON) "." base64url(Ed448 signature over the first segment)
//
// Claims: {"sub": <principal>, "tenant": <tenant name>, "exp": <unix seconds>}

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed448_goldilocks_plus::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ed448 public key size (bytes).
pub const ED448_PK_LEN: usize = 57;
/// Ed448 signature size (bytes).
pub const ED448_SIG_LEN: usize = 114;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed bearer token")]
    MalformedToken,

    #[error("token signature verification failed")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not valid for this tenant")]
    WrongTenant,

    #[error("invalid public key: expected {expected} bytes, got {got}")]
    InvalidPublicKey { expected: usize, got: usize },

    #[error("invalid Ed448 public key")]
    InvalidEd448Key,
}

/// Signed token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant: String,
    pub exp: i64,
}

/// An authorized caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub tenant: String,
}

/// A refused request. Renders as 401 with a `WWW-Authenticate` challenge, or
/// 403 when the token is genuine but issued for another tenant.
#[derive(Debug)]
pub struct Unauthorized {
    pub realm: Arc<str>,
    pub reason: AuthError,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let status = match self.reason {
            AuthError::WrongTenant => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        let challenge = format!("Bearer realm=\"{}\"", self.realm.replace('"', "'"));
        let mut response = (status, self.reason.to_string()).into_response();
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Decides whether a request may use the authenticated routes.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> Result<Principal, Unauthorized>;
}

/// Verifies Ed448-signed bearer tokens for one tenant.
pub struct TokenAuthorizer {
    realm: Arc<str>,
    tenant: String,
    verifying_key: VerifyingKey,
}

impl TokenAuthorizer {
    pub fn new(realm: impl Into<Arc<str>>, tenant: impl Into<String>, verifying_key: VerifyingKey) -> Self {
        Self {
            realm: realm.into(),
            tenant: tenant.into(),
            verifying_key,
        }
    }

    /// Build from a base64-encoded (57 bytes decoded) Ed448 public key.
    pub fn from_base64(
        realm: impl Into<Arc<str>>,
        tenant: impl Into<String>,
        public_key: &str,
    ) -> Result<Self, AuthError> {
        let bytes = STANDARD
            .decode(public_key.trim())
            .map_err(|_| AuthError::InvalidEd448Key)?;
        let verifying_key = verifying_key_from_bytes(&bytes)?;
        Ok(Self::new(realm, tenant, verifying_key))
    }

    fn verify(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        let (claims_b64, sig_b64) = token.split_once('.').ok_or(AuthError::MalformedToken)?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let sig_bytes: [u8; ED448_SIG_LEN] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::MalformedToken)?;
        let signature = Signature::from_bytes(&sig_bytes).map_err(|_| AuthError::MalformedToken)?;

        self.verifying_key
            .verify_raw(&signature, claims_b64.as_bytes())
            .map_err(|_| AuthError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::MalformedToken)?;

        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.tenant != self.tenant {
            return Err(AuthError::WrongTenant);
        }

        Ok(Principal {
            subject: claims.sub,
            tenant: claims.tenant,
        })
    }
}

impl Authorizer for TokenAuthorizer {
    fn authorize(&self, headers: &HeaderMap) -> Result<Principal, Unauthorized> {
        self.verify(headers).map_err(|reason| {
            debug!(error = %reason, "authorization refused");
            Unauthorized {
                realm: Arc::clone(&self.realm),
                reason,
            }
        })
    }
}

/// Deserialize an Ed448 verifying key.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, AuthError> {
    let bytes: [u8; ED448_PK_LEN] = bytes.try_into().map_err(|_| AuthError::InvalidPublicKey {
        expected: ED448_PK_LEN,
        got: bytes.len(),
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| AuthError::InvalidEd448Key)
}

/// Issue a token for `claims` signed with `signing_key`.
pub fn sign_token(signing_key: &SigningKey, claims: &Claims) -> String {
    // Serializing a struct of strings and integers cannot fail.
    let json = serde_json::to_vec(claims).unwrap_or_default();
    let claims_b64 = URL_SAFE_NO_PAD.encode(json);
    let signature = signing_key.sign_raw(claims_b64.as_bytes());
    format!("{}.{}", claims_b64, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedToken);
    }
    Ok(token.trim())
}
