//! TLS connector for the StartTLS upgrade.

use crate::config::AuthConfig;
use crate::error::ClientError;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, CertificateRevocationListDer, PrivateKeyDer, ServerName};
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Creates a TLS connector and the server name to verify against.
pub fn create_tls_connector(
    auth: &AuthConfig,
    server_host: &str,
) -> Result<(TlsConnector, ServerName<'static>), ClientError> {
    let root_store = if let Some(ref ca_path) = auth.ca_cert_path {
        let mut store = RootCertStore::empty();
        for cert in load_certs(ca_path)? {
            store
                .add(cert)
                .map_err(|e| ClientError::TlsConfig(format!("invalid CA cert: {}", e)))?;
        }
        store
    } else {
        let mut store = RootCertStore::empty();
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        store
    };

    let builder = match (auth.check_certificate_revocation, &auth.crl_path) {
        (true, Some(crl_path)) => {
            let verifier = WebPkiServerVerifier::builder(Arc::new(root_store))
                .with_crls(load_crls(crl_path)?)
                .build()
                .map_err(|e| ClientError::TlsConfig(format!("invalid CRL: {}", e)))?;
            rustls::ClientConfig::builder().with_webpki_verifier(verifier)
        }
        (true, None) => {
            return Err(ClientError::TlsConfig(
                "revocation check requested without a CRL file".to_string(),
            ))
        }
        _ => rustls::ClientConfig::builder().with_root_certificates(root_store),
    };

    let client_config = if let (Some(cert_path), Some(key_path)) =
        (&auth.client_cert_path, &auth.client_key_path)
    {
        let certs = load_certs(cert_path)?;
        let key = load_private_key(key_path)?;
        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| ClientError::TlsConfig(format!("invalid client cert/key: {}", e)))?
    } else {
        builder.with_no_client_auth()
    };

    let server_name = ServerName::try_from(server_host.to_string())
        .map_err(|_| ClientError::TlsConfig(format!("invalid server name: {}", server_host)))?;

    Ok((TlsConnector::from(Arc::new(client_config)), server_name))
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>, ClientError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open {} file {:?}: {}", what, path, e)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let mut reader = open(path, "cert")?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(ClientError::TlsConfig(format!(
            "no certificates found in {:?}",
            path
        )));
    }
    Ok(certs)
}

fn load_crls(path: &Path) -> Result<Vec<CertificateRevocationListDer<'static>>, ClientError> {
    let mut reader = open(path, "CRL")?;
    rustls_pemfile::crls(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::TlsConfig(format!("invalid CRL file {:?}: {}", path, e)))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let mut reader = open(path, "key")?;
    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ClientError::TlsConfig(format!("invalid key file {:?}: {}", path, e)))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            None => {
                return Err(ClientError::TlsConfig(format!(
                    "no private key found in {:?}",
                    path
                )))
            }
            _ => continue,
        }
    }
}
