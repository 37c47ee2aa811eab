// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemeral RSA keypair with a self-signed identity certificate.
//
// The certificate serial number (decimal) is the key ID clients put into
// their envelopes. A keypair is rotated lazily: the first `current()` call at
// or after `not_after` replaces it while holding the manager lock, so
// concurrent callers wait and then observe the single new keypair.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::RngCore;
use rcgen::{CertificateParams, DistinguishedName, DnType, IsCa, KeyUsagePurpose, SerialNumber};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{BigUint, Oaep, RsaPrivateKey};
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::info;

use crate::error::{Error, Result};

/// Default validity window of an ephemeral keypair.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
/// Default RSA modulus size (bits).
pub const DEFAULT_RSA_BITS: usize = 2048;
/// Serial number size (bytes); stays well under the 20-octet X.509 limit.
const SERIAL_LEN: usize = 16;

/// Parameters for generating ephemeral keypairs.
#[derive(Debug, Clone)]
pub struct KeyPairSettings {
    pub rsa_bits: usize,
    pub lifetime: Duration,
    pub organization: String,
    pub common_name: String,
    pub organizational_unit: Option<String>,
}

impl Default for KeyPairSettings {
    fn default() -> Self {
        Self {
            rsa_bits: DEFAULT_RSA_BITS,
            lifetime: DEFAULT_LIFETIME,
            organization: "dohproxy".to_string(),
            common_name: "DNS-over-HTTPS Proxy".to_string(),
            organizational_unit: None,
        }
    }
}

/// An RSA private key bound to a self-signed certificate.
pub struct KeyPair {
    private_key: RsaPrivateKey,
    certificate: Vec<u8>,
    key_id: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl KeyPair {
    /// Generate a fresh keypair valid for `[now, now + lifetime)`.
    pub fn generate(settings: &KeyPairSettings, now: OffsetDateTime) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;

        let private_key = RsaPrivateKey::new(&mut rng, settings.rsa_bits)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let signing_key = rcgen::KeyPair::from_pem(&pem)
            .map_err(|e| Error::Certificate(e.to_string()))?;

        let mut serial = [0u8; SERIAL_LEN];
        rng.fill_bytes(&mut serial);
        // Positive, and without a leading zero octet.
        serial[0] = (serial[0] & 0x7f).max(1);

        let not_after = now + settings.lifetime;

        let mut subject = DistinguishedName::new();
        subject.push(DnType::OrganizationName, settings.organization.as_str());
        if let Some(unit) = &settings.organizational_unit {
            subject.push(DnType::OrganizationalUnitName, unit.as_str());
        }
        subject.push(DnType::CommonName, settings.common_name.as_str());

        let mut params = CertificateParams::default();
        params.distinguished_name = subject;
        params.serial_number = Some(SerialNumber::from_slice(&serial));
        params.not_before = now;
        params.not_after = not_after;
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![KeyUsagePurpose::DataEncipherment];

        let certificate = params
            .self_signed(&signing_key)
            .map_err(|e| Error::Certificate(e.to_string()))?;

        Ok(Self {
            private_key,
            certificate: certificate.der().to_vec(),
            key_id: key_id_from_serial(&serial),
            not_before: now,
            not_after,
        })
    }

    /// Key ID: the certificate serial number in decimal.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// DER-encoded self-signed certificate.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// A keypair is valid strictly before `not_after`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.not_after
    }

    /// Unwrap a key blob encrypted with RSA-OAEP (SHA-256, empty label).
    pub fn unwrap_key(&self, blob: &[u8]) -> Result<Vec<u8>> {
        self.private_key
            .decrypt(Oaep::new::<Sha256>(), blob)
            .map_err(Error::KeyUnwrap)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Decimal rendering of a big-endian serial number.
pub fn key_id_from_serial(serial: &[u8]) -> String {
    BigUint::from_bytes_be(serial).to_string()
}

/// Owner of the current ephemeral keypair.
pub struct KeyPairManager {
    settings: KeyPairSettings,
    current: Mutex<Option<Arc<KeyPair>>>,
}

impl KeyPairManager {
    pub fn new(settings: KeyPairSettings) -> Self {
        Self {
            settings,
            current: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &KeyPairSettings {
        &self.settings
    }

    /// Current keypair, generating one if none exists or the held one expired.
    ///
    /// Blocks for the duration of RSA key generation when a rotation is due;
    /// call it from a blocking context.
    pub fn current(&self) -> Result<Arc<KeyPair>> {
        self.current_at(OffsetDateTime::now_utc())
    }

    /// [`current`](Self::current) evaluated at an explicit instant.
    pub fn current_at(&self, now: OffsetDateTime) -> Result<Arc<KeyPair>> {
        let mut current = self.current.lock().map_err(|_| Error::LockPoisoned)?;

        if let Some(keypair) = current.as_ref() {
            if keypair.is_valid_at(now) {
                return Ok(Arc::clone(keypair));
            }
        }

        let keypair = Arc::new(KeyPair::generate(&self.settings, now)?);
        info!(
            key_id = %keypair.key_id(),
            not_after = %keypair.not_after(),
            rsa_bits = self.settings.rsa_bits,
            "rotated ephemeral key pair"
        );
        *current = Some(Arc::clone(&keypair));
        Ok(keypair)
    }
}

impl Default for KeyPairManager {
    fn default() -> Self {
        Self::new(KeyPairSettings::default())
    }
}
