// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// dohproxy common: security associations for the DNS-over-HTTPS proxy
//
// Cryptographic stack:
//   Bootstrap:  RSA-2048, OAEP with SHA-256, empty label
//   Identity:   self-signed X.509, 24h validity, random serial = key ID
//   Symmetric:  AES-256-GCM, random 96-bit nonce per frame
//   RNG:        OsRng

pub mod aead;
pub mod bootstrap;
pub mod client;
pub mod error;
pub mod keypair;
pub mod protocol;
pub mod sa;

pub use bootstrap::{Bootstrap, Bootstrapper};
pub use error::{Error, Result};
pub use keypair::{KeyPair, KeyPairManager, KeyPairSettings};
pub use protocol::{Envelope, ProxyRequest, SaRequest, WrappedKey};
pub use sa::{SaStore, SecurityAssociation, SessionKey};
