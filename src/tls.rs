//! Mutual-TLS client configuration.
//!
//! Builds a [`rustls::ClientConfig`] that trusts only the CA certificate
//! given on the command line and presents the client certificate chain and
//! private key during the handshake.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::Result;
use crate::error::MirrorError;

/// Builds a [`ClientConfig`] with a pinned CA and client authentication.
///
/// # Errors
///
/// Returns [`MirrorError::Tls`] if any PEM file cannot be read or parsed,
/// contains no usable certificate or key, or if the key does not match the
/// certificate.
pub fn build_tls_config(ca_path: &Path, cert_path: &Path, key_path: &Path) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(load_certs(ca_path)?);
    if added == 0 {
        return Err(MirrorError::Tls(format!(
            "no usable CA certificate in {} ({ignored} ignored)",
            ca_path.display()
        )));
    }

    let cert_chain = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MirrorError::Tls(format!("unsupported protocol versions: {e}")))?
        .with_root_certificates(root_store)
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| MirrorError::Tls(format!("invalid client certificate or key: {e}")))?;

    Ok(config)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| MirrorError::Tls(format!("failed to open {}: {e}", path.display())))?;
    Ok(BufReader::new(file))
}

/// Reads every certificate from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MirrorError::Tls(format!("failed to parse {}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(MirrorError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Reads the first private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| MirrorError::Tls(format!("failed to parse {}: {e}", path.display())))?
        .ok_or_else(|| MirrorError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn pem_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_a_tls_error() {
        let err = load_certs(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(matches!(err, MirrorError::Tls(_)));
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn file_without_certificates_is_rejected() {
        let file = pem_file("just some text\n");
        let err = load_certs(file.path()).unwrap_err();
        assert!(err.to_string().contains("no certificates found"));
    }

    #[test]
    fn file_without_key_is_rejected() {
        let file = pem_file("");
        let err = load_private_key(file.path()).unwrap_err();
        assert!(err.to_string().contains("no private key found"));
    }

    #[test]
    fn build_fails_on_missing_ca() {
        let empty = pem_file("");
        let err = build_tls_config(Path::new("/nonexistent/ca.pem"), empty.path(), empty.path())
            .unwrap_err();
        assert!(matches!(err, MirrorError::Tls(_)));
    }
}
