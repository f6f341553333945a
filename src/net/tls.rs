//! TLS configuration and certificate loading.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0:?}")]
    CertificateNotFound(PathBuf),

    #[error("private key file not found: {0:?}")]
    KeyNotFound(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in PEM input")]
    NoCertificates,

    #[error("no private key found in PEM input")]
    NoPrivateKey,

    #[error("invalid PEM input: {0}")]
    Pem(#[source] std::io::Error),

    #[error("failed to build TLS context: {0}")]
    Config(#[source] std::io::Error),
}

/// Install aws-lc-rs as the process crypto provider.
///
/// rustls refuses to pick a provider on its own when more than one is compiled
/// in. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Load a TLS context from certificate and key files (PEM).
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::CertificateNotFound(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
    }

    let cert = tokio::fs::read(cert_path).await.map_err(|source| TlsError::Read {
        path: cert_path.to_path_buf(),
        source,
    })?;
    let key = tokio::fs::read(key_path).await.map_err(|source| TlsError::Read {
        path: key_path.to_path_buf(),
        source,
    })?;

    tls_config_from_pem(cert, key).await
}

/// Build a TLS context from in-memory PEM certificate chain and key.
pub async fn tls_config_from_pem(cert: Vec<u8>, key: Vec<u8>) -> Result<RustlsConfig, TlsError> {
    check_pem(&cert, &key)?;
    install_crypto_provider();
    RustlsConfig::from_pem(cert, key)
        .await
        .map_err(TlsError::Config)
}

/// Reject PEM input without a certificate or key before rustls sees it, so
/// the error says which half is missing.
fn check_pem(cert: &[u8], key: &[u8]) -> Result<(), TlsError> {
    let certs = rustls_pemfile::certs(&mut &cert[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Pem)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }

    match rustls_pemfile::private_key(&mut &key[..]).map_err(TlsError::Pem)? {
        Some(_) => Ok(()),
        None => Err(TlsError::NoPrivateKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> (Vec<u8>, Vec<u8>) {
        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        (
            certified.cert.pem().into_bytes(),
            certified.key_pair.serialize_pem().into_bytes(),
        )
    }

    #[tokio::test]
    async fn builds_context_from_self_signed_pem() {
        let (cert, key) = self_signed();
        assert!(tls_config_from_pem(cert, key).await.is_ok());
    }

    #[tokio::test]
    async fn reports_missing_halves() {
        let (cert, key) = self_signed();
        assert!(matches!(
            tls_config_from_pem(key.clone(), key).await,
            Err(TlsError::NoCertificates)
        ));
        assert!(matches!(
            tls_config_from_pem(cert.clone(), cert).await,
            Err(TlsError::NoPrivateKey)
        ));
    }

    #[tokio::test]
    async fn reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        assert!(matches!(
            load_tls_config(&missing, &missing).await,
            Err(TlsError::CertificateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn loads_from_files() {
        let (cert, key) = self_signed();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert).unwrap();
        std::fs::write(&key_path, key).unwrap();
        assert!(load_tls_config(&cert_path, &key_path).await.is_ok());
    }
}
