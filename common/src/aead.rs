// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AES-256-GCM framing shared by the bootstrap payload and the encrypted query path.
//
// Wire format:
//   [12 bytes: random nonce]
//   [N bytes:  AEAD ciphertext (plaintext + 16-byte GCM tag)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::{Error, Result};

/// AES-256 key size (bytes).
pub const KEY_LEN: usize = 32;
/// GCM nonce size (bytes).
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag size (bytes).
pub const TAG_LEN: usize = 16;
/// Total framing overhead added by [`encrypt`].
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext+tag`.
///
/// A fresh nonce is drawn from the OS RNG on every call; nothing else keeps
/// nonces unique for long-lived SA keys.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::EncryptionFailed)?;

    let mut frame = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    frame.extend_from_slice(&nonce_bytes);
    frame.extend_from_slice(&ciphertext);
    Ok(frame)
}

/// Decrypt a frame produced by [`encrypt`].
pub fn decrypt(key: &[u8], frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < NONCE_LEN {
        return Err(Error::Truncated(frame.len()));
    }
    let cipher = cipher(key)?;

    let (nonce, ciphertext) = frame.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionFailed)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::InvalidKeyLength {
        expected: KEY_LEN,
        got: key.len(),
    })
}
