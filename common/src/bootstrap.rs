// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Envelope bootstrap: turn one of several candidate envelopes into a new
// security association.
//
// A client that does not know which ephemeral key is current may submit
// envelopes wrapped for several certificates. Candidates are scanned in
// submission order and the first whose key ID equals the current serial is
// opened; the rest are ignored. Every outcome carries the current certificate
// so a client holding a stale one can retry without a separate round trip.

use std::sync::Arc;

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::aead::{self, KEY_LEN};
use crate::error::{Error, Result};
use crate::keypair::{KeyPair, KeyPairManager};
use crate::protocol::{Envelope, SaRequest};
use crate::sa::{SaStore, SecurityAssociation, SessionKey};

/// Result of a bootstrap attempt.
#[derive(Debug)]
pub struct Bootstrap {
    /// DER certificate of the keypair that was current for this attempt
    pub certificate: Vec<u8>,
    /// Key ID of that certificate
    pub key_id: String,
    /// The registered association, or why none was registered
    pub outcome: Result<Arc<SecurityAssociation>>,
}

/// Runs the bootstrap protocol against the shared keypair and SA store.
#[derive(Clone)]
pub struct Bootstrapper {
    keys: Arc<KeyPairManager>,
    sas: Arc<SaStore>,
}

impl Bootstrapper {
    pub fn new(keys: Arc<KeyPairManager>, sas: Arc<SaStore>) -> Self {
        Self { keys, sas }
    }

    /// Try each candidate in order and register the SA described by the
    /// first one wrapped for the current key.
    ///
    /// The outer `Err` is reserved for failing to obtain a current keypair;
    /// everything caused by the candidates lands in [`Bootstrap::outcome`].
    pub async fn try_establish(&self, candidates: Vec<Envelope>) -> Result<Bootstrap> {
        let keys = Arc::clone(&self.keys);

        // RSA key generation and decryption are CPU-bound.
        let (keypair, opened) = tokio::task::spawn_blocking(move || -> Result<_> {
            let keypair = keys.current()?;
            let opened = open_envelope(&keypair, &candidates);
            Ok((keypair, opened))
        })
        .await
        .map_err(|e| Error::Internal(format!("bootstrap task failed: {e}")))??;

        let outcome = match opened {
            Ok(request) => {
                let key = SessionKey::from_slice(&request.key)?;
                let sa = self.sas.put(request.id.clone(), key).await;
                info!(sa = %sa.id(), key_id = %keypair.key_id(), "established security association");
                Ok(sa)
            }
            Err(e) => {
                warn!(key_id = %keypair.key_id(), error = %e, "bootstrap rejected");
                Err(e)
            }
        };

        Ok(Bootstrap {
            certificate: keypair.certificate().to_vec(),
            key_id: keypair.key_id().to_string(),
            outcome,
        })
    }
}

/// Open the first candidate wrapped for `keypair` and decode the SA request
/// it carries.
pub fn open_envelope(keypair: &KeyPair, candidates: &[Envelope]) -> Result<SaRequest> {
    if candidates.is_empty() {
        return Err(Error::NoKeyInfo);
    }

    let envelope = candidates
        .iter()
        .find(|envelope| envelope.key.id == keypair.key_id())
        .ok_or(Error::KeyMismatch)?;

    let session_key = Zeroizing::new(keypair.unwrap_key(&envelope.key.data)?);
    if session_key.len() != KEY_LEN {
        return Err(Error::InvalidKeyLength {
            expected: KEY_LEN,
            got: session_key.len(),
        });
    }

    let payload = Zeroizing::new(aead::decrypt(&session_key, &envelope.data)?);
    let request: SaRequest = serde_json::from_slice(&payload)
        .map_err(|e| Error::InvalidRequest(format!("error parsing payload: {e}")))?;
    request.validate()?;

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServerCertificate;
    use crate::keypair::KeyPairSettings;
    use time::OffsetDateTime;

    fn sa_request(id: &str, key: &SessionKey) -> SaRequest {
        SaRequest {
            id: id.to_string(),
            key: key.as_bytes().to_vec(),
        }
    }

    fn bootstrapper() -> (Bootstrapper, Arc<KeyPairManager>, Arc<SaStore>) {
        let keys = Arc::new(KeyPairManager::default());
        let sas = Arc::new(SaStore::default());
        (
            Bootstrapper::new(Arc::clone(&keys), Arc::clone(&sas)),
            keys,
            sas,
        )
    }

    #[tokio::test]
    async fn empty_candidate_list_has_no_key_info() {
        let (bootstrapper, keys, sas) = bootstrapper();

        let result = bootstrapper.try_establish(Vec::new()).await.unwrap();

        assert!(matches!(result.outcome, Err(Error::NoKeyInfo)));
        assert_eq!(result.outcome.unwrap_err().to_string(), "no key info");
        assert_eq!(result.certificate, keys.current().unwrap().certificate());
        assert!(sas.is_empty().await);
    }

    #[tokio::test]
    async fn stale_envelope_fails_then_retry_succeeds() {
        let (bootstrapper, _keys, sas) = bootstrapper();
        let key = SessionKey::generate();

        // Envelope for a keypair the server never held.
        let stale = KeyPair::generate(&KeyPairSettings::default(), OffsetDateTime::now_utc())
            .unwrap();
        let stale_cert = ServerCertificate::from_der(stale.certificate()).unwrap();
        let envelope = stale_cert.seal(&sa_request("a", &key)).unwrap();

        let first = bootstrapper.try_establish(vec![envelope]).await.unwrap();
        assert!(matches!(first.outcome, Err(Error::KeyMismatch)));
        assert!(sas.get("a").await.is_none());

        // Retry against the certificate returned with the failure.
        let current = ServerCertificate::from_der(&first.certificate).unwrap();
        assert_eq!(current.key_id(), first.key_id);
        let envelope = current.seal(&sa_request("a", &key)).unwrap();

        let second = bootstrapper.try_establish(vec![envelope]).await.unwrap();
        let sa = second.outcome.unwrap();
        assert_eq!(sa.id(), "a");
        assert_eq!(sa.key(), &key);
        assert_eq!(sas.get("a").await.unwrap().key(), &key);
    }

    #[tokio::test]
    async fn first_matching_candidate_wins() {
        let (bootstrapper, keys, sas) = bootstrapper();
        let current = ServerCertificate::from_der(keys.current().unwrap().certificate()).unwrap();

        let stale = KeyPair::generate(&KeyPairSettings::default(), OffsetDateTime::now_utc())
            .unwrap();
        let stale = ServerCertificate::from_der(stale.certificate()).unwrap();

        let first_key = SessionKey::generate();
        let second_key = SessionKey::generate();
        let candidates = vec![
            stale.seal(&sa_request("stale", &SessionKey::generate())).unwrap(),
            current.seal(&sa_request("first", &first_key)).unwrap(),
            current.seal(&sa_request("second", &second_key)).unwrap(),
        ];

        let result = bootstrapper.try_establish(candidates).await.unwrap();
        assert_eq!(result.outcome.unwrap().id(), "first");
        assert!(sas.get("second").await.is_none());
        assert!(sas.get("stale").await.is_none());
        assert_eq!(sas.len().await, 1);
    }

    #[tokio::test]
    async fn matching_candidate_with_bad_blob_fails_whole_bootstrap() {
        let (bootstrapper, keys, sas) = bootstrapper();
        let keypair = keys.current().unwrap();
        let current = ServerCertificate::from_der(keypair.certificate()).unwrap();

        let broken = Envelope {
            key: crate::protocol::WrappedKey {
                data: vec![0u8; 256],
                id: keypair.key_id().to_string(),
            },
            data: vec![0u8; 64],
        };
        let valid = current.seal(&sa_request("late", &SessionKey::generate())).unwrap();

        let result = bootstrapper.try_establish(vec![broken, valid]).await.unwrap();
        assert!(matches!(result.outcome, Err(Error::KeyUnwrap(_))));
        assert!(sas.is_empty().await);
    }

    #[test]
    fn payload_with_wrong_key_length_is_rejected() {
        let keypair =
            KeyPair::generate(&KeyPairSettings::default(), OffsetDateTime::now_utc()).unwrap();
        let cert = ServerCertificate::from_der(keypair.certificate()).unwrap();

        let request = SaRequest {
            id: "a".to_string(),
            key: vec![1u8; KEY_LEN + 2 * 12],
        };
        let envelope = cert.seal(&request).unwrap();

        let result = open_envelope(&keypair, &[envelope]);
        assert!(matches!(result, Err(Error::InvalidKeyLength { got: 56, .. })));
    }

    #[test]
    fn tampered_payload_fails_authentication() {
        let keypair =
            KeyPair::generate(&KeyPairSettings::default(), OffsetDateTime::now_utc()).unwrap();
        let cert = ServerCertificate::from_der(keypair.certificate()).unwrap();

        let mut envelope = cert.seal(&sa_request("a", &SessionKey::generate())).unwrap();
        let last = envelope.data.len() - 1;
        envelope.data[last] ^= 0xff;

        let result = open_envelope(&keypair, &[envelope]);
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }
}
