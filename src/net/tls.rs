//! TLS certificate provisioning.
//!
//! # Responsibilities
//! - Load a user-supplied PEM key/certificate pair
//! - Fall back to a freshly generated self-signed pair when loading fails
//! - Turn a pair into a rustls server config for the listener
//!
//! # Design Decisions
//! - A bad user pair never aborts startup; it is logged and replaced
//! - Generated pairs live in memory only and are new on every start

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use time::{Duration, OffsetDateTime};

use crate::config::TlsMode;

/// Validity window of generated certificates.
pub const SELF_SIGNED_VALIDITY_DAYS: i64 = 365;

/// Errors from TLS provisioning.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} contains no usable PEM data")]
    Malformed(String),

    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("TLS requested but disabled in configuration")]
    Disabled,

    #[error("invalid TLS configuration: {0}")]
    Config(#[source] io::Error),
}

/// Where a certificate pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateSource {
    UserFiles,
    SelfSigned,
}

/// PEM-encoded private key and certificate.
#[derive(Clone)]
pub struct CertificatePair {
    pub key: Vec<u8>,
    pub cert: Vec<u8>,
    pub source: CertificateSource,
}

impl std::fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificatePair")
            .field("key", &"<redacted>")
            .field("cert_len", &self.cert.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Produce the pair the listener should use for `mode`.
pub fn provision(mode: &TlsMode) -> Result<CertificatePair, TlsError> {
    match mode {
        TlsMode::Disabled => Err(TlsError::Disabled),
        TlsMode::SelfSigned => generate_self_signed(),
        TlsMode::Files { key_path, cert_path } => match load_pair(key_path, cert_path) {
            Ok(pair) => {
                tracing::info!(key = %key_path.display(), cert = %cert_path.display(), "Using supplied TLS certificate");
                Ok(pair)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load supplied TLS certificate, generating a self-signed one");
                generate_self_signed()
            }
        },
    }
}

/// Read and sanity-check a PEM key and certificate from disk.
pub fn load_pair(key_path: &Path, cert_path: &Path) -> Result<CertificatePair, TlsError> {
    let key = read(key_path)?;
    let cert = read(cert_path)?;

    let cert_count = rustls_pemfile::certs(&mut cert.as_slice())
        .filter(Result::is_ok)
        .count();
    if cert_count == 0 {
        return Err(TlsError::Malformed(cert_path.display().to_string()));
    }

    match rustls_pemfile::private_key(&mut key.as_slice()) {
        Ok(Some(_)) => {}
        _ => return Err(TlsError::Malformed(key_path.display().to_string())),
    }

    Ok(CertificatePair {
        key,
        cert,
        source: CertificateSource::UserFiles,
    })
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Generate a self-signed pair for `localhost`.
///
/// RSA-2048 with SHA-256 is preferred; if the crypto backend cannot generate
/// RSA keys, ECDSA P-256 is used instead.
pub fn generate_self_signed() -> Result<CertificatePair, TlsError> {
    let key_pair = match KeyPair::generate_for(&rcgen::PKCS_RSA_SHA256) {
        Ok(key_pair) => key_pair,
        Err(e) => {
            tracing::warn!(error = %e, "RSA key generation unavailable, using ECDSA P-256");
            KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?
        }
    };

    let params = self_signed_params(OffsetDateTime::now_utc())?;
    let cert = params.self_signed(&key_pair)?;

    tracing::info!(
        common_name = "localhost",
        validity_days = SELF_SIGNED_VALIDITY_DAYS,
        "Generated self-signed certificate"
    );

    Ok(CertificatePair {
        key: key_pair.serialize_pem().into_bytes(),
        cert: cert.pem().into_bytes(),
        source: CertificateSource::SelfSigned,
    })
}

fn self_signed_params(now: OffsetDateTime) -> Result<CertificateParams, rcgen::Error> {
    let mut params =
        CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;

    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, "localhost");
    params.distinguished_name = name;

    params.not_before = now;
    params.not_after = now + Duration::days(SELF_SIGNED_VALIDITY_DAYS);
    Ok(params)
}

/// Build the rustls acceptor configuration for a pair.
pub async fn rustls_config(pair: &CertificatePair) -> Result<RustlsConfig, TlsError> {
    RustlsConfig::from_pem(pair.cert.clone(), pair.key.clone())
        .await
        .map_err(TlsError::Config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn params_cover_one_year() {
        let now = OffsetDateTime::now_utc();
        let params = self_signed_params(now).unwrap();
        assert_eq!(params.not_after - params.not_before, Duration::days(365));
        assert_eq!(params.subject_alt_names.len(), 2);
    }

    #[test]
    fn generated_pair_is_valid_pem() {
        let pair = generate_self_signed().unwrap();
        assert_eq!(pair.source, CertificateSource::SelfSigned);
        assert_eq!(rustls_pemfile::certs(&mut pair.cert.as_slice()).count(), 1);
        assert!(rustls_pemfile::private_key(&mut pair.key.as_slice())
            .unwrap()
            .is_some());
    }

    #[test]
    fn every_generation_uses_a_new_key() {
        let a = generate_self_signed().unwrap();
        let b = generate_self_signed().unwrap();
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn missing_files_fall_back_to_self_signed() {
        let mode = TlsMode::Files {
            key_path: PathBuf::from("/nonexistent/key.pem"),
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
        };
        let pair = provision(&mode).unwrap();
        assert_eq!(pair.source, CertificateSource::SelfSigned);
    }

    #[test]
    fn fallback_is_logged_as_warning() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let mode = TlsMode::Files {
            key_path: PathBuf::from("/nonexistent/key.pem"),
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
        };
        let pair = tracing::subscriber::with_default(subscriber, || provision(&mode).unwrap());
        assert_eq!(pair.source, CertificateSource::SelfSigned);

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("Failed to load supplied TLS certificate"))
            .unwrap_or_else(|| panic!("no fallback warning in {output:?}"));
        assert!(line.contains("WARN"), "{line}");
        assert!(line.contains("/nonexistent/key.pem"), "{line}");
    }

    #[test]
    fn malformed_files_fall_back_to_self_signed() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        let cert_path = dir.path().join("cert.pem");
        std::fs::write(&key_path, "not a key").unwrap();
        std::fs::write(&cert_path, "not a cert").unwrap();

        assert!(matches!(
            load_pair(&key_path, &cert_path),
            Err(TlsError::Malformed(_))
        ));

        let pair = provision(&TlsMode::Files { key_path, cert_path }).unwrap();
        assert_eq!(pair.source, CertificateSource::SelfSigned);
    }

    #[test]
    fn valid_user_files_are_used() {
        let generated = generate_self_signed().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key.pem");
        let cert_path = dir.path().join("cert.pem");
        std::fs::write(&key_path, &generated.key).unwrap();
        std::fs::write(&cert_path, &generated.cert).unwrap();

        let pair = provision(&TlsMode::Files { key_path, cert_path }).unwrap();
        assert_eq!(pair.source, CertificateSource::UserFiles);
        assert_eq!(pair.cert, generated.cert);
    }

    #[tokio::test]
    async fn generated_pair_builds_rustls_config() {
        let pair = generate_self_signed().unwrap();
        assert!(rustls_config(&pair).await.is_ok());
    }
}
