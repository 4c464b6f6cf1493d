//! TLS material for the secure gRPC listener.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Certificate chain file name inside the cert directory.
pub const CERT_CHAIN_FILE: &str = "cert-chain.pem";
/// Private key file name inside the cert directory.
pub const KEY_FILE: &str = "key.pem";

/// Paths of the certificate and key inside `dir`, if both exist.
pub fn find_tls_material(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let cert = dir.join(CERT_CHAIN_FILE);
    let key = dir.join(KEY_FILE);
    (cert.is_file() && key.is_file()).then_some((cert, key))
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
