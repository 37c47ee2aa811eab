// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("truncated encrypted payload: len={0}")]
    Truncated(usize),

    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("decryption failed: authentication failure or data corruption")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("no key info")]
    NoKeyInfo,

    #[error("encryption key mismatch")]
    KeyMismatch,

    #[error("key unwrap failed: {0}")]
    KeyUnwrap(#[source] rsa::Error),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("invalid security association request: {0}")]
    InvalidRequest(String),

    #[error("key pair lock poisoned")]
    LockPoisoned,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The client encrypted against a key this server does not hold (or sent
    /// nothing to match against). Retrying with the current certificate fixes it.
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, Self::NoKeyInfo | Self::KeyMismatch)
    }

    /// Caller-supplied input that failed to decode or authenticate.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Truncated(_)
                | Self::InvalidKeyLength { .. }
                | Self::DecryptionFailed
                | Self::KeyUnwrap(_)
                | Self::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
