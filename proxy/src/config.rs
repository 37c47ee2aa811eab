// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Configuration for the DoH proxy.

use dohproxy_common::keypair::{KeyPairSettings, DEFAULT_RSA_BITS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the DoH proxy service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8081)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Authorization realm, also the certificate common name
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Tenant bearer tokens must be issued for
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Project identifier, recorded as the certificate organizational unit
    #[serde(default)]
    pub project_id: Option<String>,

    /// Ed448 public key verifying bearer tokens (base64, 57 bytes decoded)
    #[serde(default)]
    pub auth_pubkey: Option<String>,

    /// Ephemeral keypair configuration
    #[serde(default)]
    pub keys: KeyConfig,

    /// Security association configuration
    #[serde(default)]
    pub sas: SaConfig,

    /// Upstream resolver configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Ephemeral keypair configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Keypair validity in seconds (default: 86400)
    #[serde(default = "default_key_lifetime_secs")]
    pub lifetime_secs: u64,

    /// RSA modulus size (default: 2048)
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,

    /// Certificate organization name
    #[serde(default = "default_organization")]
    pub organization: String,
}

/// Security association configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaConfig {
    /// SA lifetime in seconds; unset keeps SAs until overwritten or restart
    #[serde(default)]
    pub lifetime_secs: Option<u64>,

    /// Interval between expired-SA sweeps in seconds (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// Upstream resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout for upstream requests in seconds; unset uses the client default
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Largest DNS message accepted from a client (default: 65535)
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_realm() -> String {
    "DNS-over-HTTPS Proxy".to_string()
}

fn default_tenant() -> String {
    "DNS-over-HTTPS-proxy".to_string()
}

fn default_key_lifetime_secs() -> u64 {
    24 * 60 * 60
}

fn default_rsa_bits() -> usize {
    DEFAULT_RSA_BITS
}

fn default_organization() -> String {
    "dohproxy".to_string()
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_max_message_bytes() -> usize {
    65535 // RFC 8484 message size limit
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            realm: default_realm(),
            tenant: default_tenant(),
            project_id: None,
            auth_pubkey: None,
            keys: KeyConfig::default(),
            sas: SaConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: default_key_lifetime_secs(),
            rsa_bits: default_rsa_bits(),
            organization: default_organization(),
        }
    }
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: None,
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Config {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.keys.lifetime_secs == 0 {
            return Err("key lifetime must be positive".to_string());
        }
        if self.keys.rsa_bits < DEFAULT_RSA_BITS {
            return Err(format!(
                "RSA key size {} is below the {} bit minimum",
                self.keys.rsa_bits, DEFAULT_RSA_BITS
            ));
        }
        if self.sas.lifetime_secs == Some(0) {
            return Err("SA lifetime must be positive when set".to_string());
        }
        if self.sas.cleanup_interval_secs == 0 {
            return Err("SA cleanup interval must be positive".to_string());
        }
        if self.upstream.timeout_secs == Some(0) {
            return Err("upstream timeout must be positive when set".to_string());
        }
        Ok(())
    }

    /// Settings for the ephemeral keypair manager.
    pub fn keypair_settings(&self) -> KeyPairSettings {
        KeyPairSettings {
            rsa_bits: self.keys.rsa_bits,
            lifetime: Duration::from_secs(self.keys.lifetime_secs),
            organization: self.keys.organization.clone(),
            common_name: self.realm.clone(),
            organizational_unit: self.project_id.clone(),
        }
    }

    pub fn sa_lifetime(&self) -> Option<Duration> {
        self.sas.lifetime_secs.map(Duration::from_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.sas.cleanup_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream.timeout_secs.map(Duration::from_secs)
    }

    /// Largest request body any route accepts: a JSON query with base64 data,
    /// optionally AEAD-framed, with room for the server URL.
    pub fn max_request_bytes(&self) -> usize {
        self.upstream.max_message_bytes * 2 + 4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keypair_settings().lifetime, Duration::from_secs(86400));
        assert_eq!(config.keypair_settings().common_name, config.realm);
        assert!(config.sa_lifetime().is_none());
        assert!(config.upstream_timeout().is_none());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: Config = serde_json::from_str(
            r#"{"tenant":"acme","sas":{"lifetime_secs":600},"upstream":{"timeout_secs":5}}"#,
        )
        .unwrap();

        assert_eq!(config.tenant, "acme");
        assert_eq!(config.bind_addr, "0.0.0.0:8081");
        assert_eq!(config.sa_lifetime(), Some(Duration::from_secs(600)));
        assert_eq!(config.sas.cleanup_interval_secs, 60);
        assert_eq!(config.upstream_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.keys.rsa_bits, 2048);
    }

    #[test]
    fn rejects_weak_or_zero_settings() {
        let mut config = Config::default();
        config.keys.rsa_bits = 1024;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.keys.lifetime_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sas.lifetime_secs = Some(0);
        assert!(config.validate().is_err());
    }
}
