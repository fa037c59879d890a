use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mysql_splice_proxy::{serve, ProxyOptions, StartupError};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Transparent MySQL proxy that terminates client-side TLS and forwards
/// cleartext traffic to a backend MySQL server.
#[derive(Parser, Debug)]
#[command(name = "mysql-splice-proxy", author, version, about)]
struct Args {
    /// Port to listen for MySQL clients on, bound on 0.0.0.0.
    listen_port: u16,

    /// Backend MySQL server host.
    backend_host: String,

    /// Backend MySQL server port.
    backend_port: u16,

    /// Path to the PEM-encoded server certificate (chain) presented to
    /// clients during the TLS upgrade.
    cert_path: PathBuf,

    /// Path to the PEM-encoded private key matching `cert_path`.
    key_path: PathBuf,
}

fn load_tls_config(cert_path: &PathBuf, key_path: &PathBuf) -> Result<Arc<ServerConfig>, StartupError> {
    let cert_file = File::open(cert_path).map_err(|source| StartupError::ReadCert {
        path: cert_path.display().to_string(),
        source,
    })?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<_, _>>()
        .map_err(|source| StartupError::ReadCert {
            path: cert_path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(StartupError::EmptyCertChain {
            path: cert_path.display().to_string(),
        });
    }

    let key_file = File::open(key_path).map_err(|source| StartupError::ReadKey {
        path: key_path.display().to_string(),
        source,
    })?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|source| StartupError::ReadKey {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| StartupError::MissingKey {
            path: key_path.display().to_string(),
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tls_config = load_tls_config(&args.cert_path, &args.key_path)?;
    let options = ProxyOptions::new(
        args.listen_port,
        args.backend_host,
        args.backend_port,
        tls_config,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mysql-splice-proxy")
        .build()?;

    runtime.block_on(async { serve(options, shutdown_signal()).await })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // A PEM "CERTIFICATE" block only needs to base64-decode; rustls-pemfile
    // never validates the DER as an actual X.509 certificate at this stage,
    // so arbitrary bytes are enough to exercise the cert-chain-present path.
    const FIXTURE_CERT_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
        dGhpcyBpcyBub3QgYSByZWFsIGNlcnRpZmljYXRlLCBqdXN0IHBsYWNlaG9sZGVyIGJ5dGVzLg==\n\
        -----END CERTIFICATE-----\n";

    #[test]
    fn missing_cert_file_is_read_cert_error() {
        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("missing-cert.pem");
        let key_path = dir.path().join("missing-key.pem");

        let err = load_tls_config(&cert_path, &key_path).unwrap_err();
        assert!(matches!(err, StartupError::ReadCert { .. }));
    }

    #[test]
    fn empty_cert_file_is_empty_cert_chain_error() {
        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("empty-cert.pem");
        let key_path = dir.path().join("missing-key.pem");
        fs::write(&cert_path, "").unwrap();

        let err = load_tls_config(&cert_path, &key_path).unwrap_err();
        assert!(matches!(err, StartupError::EmptyCertChain { .. }));
    }

    #[test]
    fn missing_key_file_is_read_key_error() {
        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("missing-key.pem");
        fs::write(&cert_path, FIXTURE_CERT_PEM).unwrap();

        let err = load_tls_config(&cert_path, &key_path).unwrap_err();
        assert!(matches!(err, StartupError::ReadKey { .. }));
    }

    #[test]
    fn key_file_without_a_key_block_is_missing_key_error() {
        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("empty-key.pem");
        fs::write(&cert_path, FIXTURE_CERT_PEM).unwrap();
        fs::write(&key_path, "").unwrap();

        let err = load_tls_config(&cert_path, &key_path).unwrap_err();
        assert!(matches!(err, StartupError::MissingKey { .. }));
    }
}
