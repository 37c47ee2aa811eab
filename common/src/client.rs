// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Client side of the protocol: read the proxy's certificate, build
//! bootstrap envelopes against it, and frame queries for an established SA.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::aead;
use crate::error::{Error, Result};
use crate::keypair::key_id_from_serial;
use crate::protocol::{Envelope, ProxyRequest, SaRequest, WrappedKey};
use crate::sa::SessionKey;

/// The parts of a proxy certificate a client needs to bootstrap an SA.
#[derive(Debug, Clone)]
pub struct ServerCertificate {
    key_id: String,
    public_key: RsaPublicKey,
}

impl ServerCertificate {
    /// Parse a DER certificate as served by `/certificate` or returned from `/sas/`.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("invalid certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let spki = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("invalid public key info: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| Error::Certificate(format!("not an RSA public key: {e}")))?;

        Ok(Self {
            key_id: key_id_from_serial(tbs.serial_number.as_bytes()),
            public_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Build an envelope carrying `request` under a fresh session key.
    pub fn seal(&self, request: &SaRequest) -> Result<Envelope> {
        self.seal_with(&SessionKey::generate(), request)
    }

    /// Build an envelope carrying `request` under `session_key`.
    pub fn seal_with(&self, session_key: &SessionKey, request: &SaRequest) -> Result<Envelope> {
        let payload = Zeroizing::new(
            serde_json::to_vec(request).map_err(|e| Error::InvalidRequest(e.to_string()))?,
        );
        let data = aead::encrypt(session_key.as_bytes(), &payload)?;

        let wrapped = self
            .public_key
            .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), session_key.as_bytes())
            .map_err(|_| Error::EncryptionFailed)?;

        Ok(Envelope {
            key: WrappedKey {
                data: wrapped,
                id: self.key_id.clone(),
            },
            data,
        })
    }
}

/// Frame a query for `/sas/{id}/dns-query`.
pub fn seal_query(key: &SessionKey, request: &ProxyRequest) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(request).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    aead::encrypt(key.as_bytes(), &json)
}

/// Open the DNS response returned by `/sas/{id}/dns-query`.
pub fn open_response(key: &SessionKey, frame: &[u8]) -> Result<Vec<u8>> {
    aead::decrypt(key.as_bytes(), frame)
}
