// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON wire types exchanged with clients.
//
//   Envelope:     {"key": {"data": <b64 RSA-OAEP blob>, "id": <key ID>}, "data": <b64 AEAD frame>}
//   SaRequest:    {"id": <SA id>, "key": <b64 32-byte key>}     (inside Envelope.data)
//   ProxyRequest: {"data": <b64url DNS wire>, "server": <resolver URL>}

use serde::{Deserialize, Serialize};

use crate::aead::KEY_LEN;
use crate::error::{Error, Result};

/// Longest accepted SA identifier.
pub const MAX_SA_ID_LEN: usize = 128;

/// Asymmetrically wrapped session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "b64")]
    pub data: Vec<u8>,
    pub id: String,
}

/// Bootstrap message: a wrapped session key plus a payload sealed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub key: WrappedKey,
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

/// Descriptor of the security association a client wants to create.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaRequest {
    pub id: String,
    #[serde(with = "b64")]
    pub key: Vec<u8>,
}

impl SaRequest {
    /// Check the descriptor against the wire contract: a non-empty id usable
    /// as a single path segment and a key of exactly [`KEY_LEN`] bytes.
    pub fn validate(&self) -> Result<()> {
        validate_sa_id(&self.id)?;
        if self.key.len() != KEY_LEN {
            return Err(Error::InvalidKeyLength {
                expected: KEY_LEN,
                got: self.key.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SaRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaRequest")
            .field("id", &self.id)
            .field("key_len", &self.key.len())
            .finish()
    }
}

pub fn validate_sa_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidRequest("empty SA id".to_string()));
    }
    if id.len() > MAX_SA_ID_LEN {
        return Err(Error::InvalidRequest(format!(
            "SA id too long: {} > {}",
            id.len(),
            MAX_SA_ID_LEN
        )));
    }
    if id.chars().any(|c| c == '/' || c.is_control()) {
        return Err(Error::InvalidRequest(format!("invalid SA id '{}'", id.escape_debug())));
    }
    Ok(())
}

/// DNS query to relay to an upstream DoH resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    #[serde(with = "b64url")]
    pub data: Vec<u8>,
    pub server: String,
}

/// Standard base64 with padding.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// URL-safe base64; emitted without padding, accepted with or without.
pub mod b64url {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(s.trim_end_matches('=').as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
