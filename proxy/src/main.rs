// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// dohproxy: DNS-over-HTTPS relay with application-layer security associations
//
// Accepts DoH queries over HTTP (TLS is terminated in front of the service),
// either in the clear for bearer-token holders or sealed with AES-256-GCM under
// a security association bootstrapped through an RSA-OAEP envelope, and
// forwards them to the upstream resolver named in each request.
//
// RFC 8484: DNS Queries over HTTPS (DoH)

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dohproxy::auth::TokenAuthorizer;
use dohproxy::config::{Config, KeyConfig, SaConfig, UpstreamConfig};
use dohproxy::relay::Relay;
use dohproxy::{router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dohproxy", about = "DNS-over-HTTPS proxy with encrypted security associations")]
struct Args {
    /// Listen address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8081")]
    listen: String,

    /// Authorization realm (also the certificate common name)
    #[arg(long, env = "DOHPROXY_REALM", default_value = "DNS-over-HTTPS Proxy")]
    realm: String,

    /// Tenant bearer tokens must be issued for
    #[arg(long, env = "DOHPROXY_TENANT", default_value = "DNS-over-HTTPS-proxy")]
    tenant: String,

    /// Project identifier recorded in the certificate subject
    #[arg(long, env = "DOHPROXY_PROJECT_ID")]
    project_id: Option<String>,

    /// Ed448 public key verifying bearer tokens (base64, 57 bytes decoded)
    #[arg(long, env = "DOHPROXY_AUTH_PUBKEY")]
    auth_pubkey: String,

    /// Ephemeral keypair lifetime in seconds
    #[arg(long, env = "DOHPROXY_KEY_LIFETIME_SECS", default_value_t = 86400)]
    key_lifetime_secs: u64,

    /// RSA modulus size for ephemeral keypairs
    #[arg(long, env = "DOHPROXY_RSA_BITS", default_value_t = 2048)]
    rsa_bits: usize,

    /// Security association lifetime in seconds (unset: until restart)
    #[arg(long, env = "DOHPROXY_SA_LIFETIME_SECS")]
    sa_lifetime_secs: Option<u64>,

    /// Upstream request timeout in seconds (unset: no timeout)
    #[arg(long, env = "DOHPROXY_UPSTREAM_TIMEOUT_SECS")]
    upstream_timeout_secs: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "DOHPROXY_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            bind_addr: self.listen,
            realm: self.realm,
            tenant: self.tenant,
            project_id: self.project_id,
            auth_pubkey: Some(self.auth_pubkey),
            keys: KeyConfig {
                lifetime_secs: self.key_lifetime_secs,
                rsa_bits: self.rsa_bits,
                ..Default::default()
            },
            sas: SaConfig {
                lifetime_secs: self.sa_lifetime_secs,
                ..Default::default()
            },
            upstream: UpstreamConfig {
                timeout_secs: self.upstream_timeout_secs,
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_json);

    let config = args.into_config();
    config.validate().map_err(anyhow::Error::msg)?;

    let pubkey = config
        .auth_pubkey
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("no auth public key configured"))?;
    let authorizer = TokenAuthorizer::from_base64(config.realm.as_str(), config.tenant.clone(), pubkey)?;
    let relay = Relay::new(config.upstream_timeout())?;

    info!(
        bind_addr = %config.bind_addr,
        tenant = %config.tenant,
        key_lifetime_secs = config.keys.lifetime_secs,
        rsa_bits = config.keys.rsa_bits,
        sa_lifetime_secs = ?config.sas.lifetime_secs,
        upstream_timeout_secs = ?config.upstream.timeout_secs,
        "starting DoH proxy"
    );

    let state = Arc::new(AppState::new(config.clone(), relay, Arc::new(authorizer)));

    // Sweep expired security associations
    if config.sa_lifetime().is_some() {
        let sas = Arc::clone(&state.sas);
        let period = config.cleanup_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = sas.purge_expired().await;
                if purged > 0 {
                    info!(purged, "purged expired security associations");
                }
            }
        });
    }

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
