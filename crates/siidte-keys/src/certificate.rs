#![forbid(unsafe_code)]

//! The envelope signing certificate, loaded from a PKCS#12 bundle.

use std::path::Path;

use rsa::{RsaPrivateKey, RsaPublicKey};
use siidte_core::Error;
use siidte_crypto::encoding::{b64_encode, rsa_public_parts_b64, wrap_lines};
use tracing::{debug, info};

use crate::loader;

/// Column width of the base64 certificate body written into `X509Certificate`.
const CERT_LINE_WIDTH: usize = 64;

/// Private key plus the X.509 certificate that carries its public half.
///
/// Read-only after loading; safe to share across signing threads.
#[derive(Debug, Clone)]
pub struct EnvelopeCertificate {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    cert_der: Vec<u8>,
    subject: String,
}

impl EnvelopeCertificate {
    /// Read and open a `.pfx`/`.p12` file.
    pub fn load_pfx(path: &Path, password: &str) -> Result<Self, Error> {
        let data = std::fs::read(path)?;
        let cert = Self::from_pfx(&data, password)?;
        info!(path = %path.display(), subject = %cert.subject, "loaded envelope certificate");
        Ok(cert)
    }

    /// Open PFX bytes. The first RSA key is used, together with the
    /// certificate whose public key matches it.
    pub fn from_pfx(data: &[u8], password: &str) -> Result<Self, Error> {
        let contents = siidte_pkcs12::parse_pfx(data, password)?;
        let key_der = contents
            .keys
            .first()
            .ok_or_else(|| Error::CertLoad("PKCS#12 contains no private key".into()))?;
        let private_key = loader::load_rsa_private_pkcs8_der(key_der)?;
        let public_key = private_key.to_public_key();

        let mut leaf = None;
        for der in &contents.certificates {
            match loader::load_x509_rsa_public_der(der) {
                Ok(pk) if pk == public_key => {
                    leaf = Some(der.clone());
                    break;
                }
                Ok(_) => debug!("skipping CA certificate in PKCS#12"),
                Err(e) => debug!(error = %e, "skipping unreadable certificate in PKCS#12"),
            }
        }
        let cert_der = leaf.ok_or_else(|| {
            Error::CertLoad("PKCS#12 has no certificate for its private key".into())
        })?;
        let subject = loader::x509_subject(&cert_der)?;

        Ok(Self {
            private_key,
            public_key,
            cert_der,
            subject,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Base64 modulus and exponent for `RSAKeyValue`.
    pub fn rsa_key_value_b64(&self) -> (String, String) {
        rsa_public_parts_b64(&self.public_key)
    }

    /// PEM body of the certificate without the BEGIN/END delimiters.
    pub fn certificate_body(&self) -> String {
        wrap_lines(&b64_encode(&self.cert_der), CERT_LINE_WIDTH)
    }
}
