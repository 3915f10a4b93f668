#![forbid(unsafe_code)]

//! RSA key decoding from PEM and DER.

use siidte_core::Error;

/// Load an RSA private key from PEM text, PKCS#8 first, then PKCS#1.
///
/// CAF files embed the PEM inside an XML element, so surrounding and
/// per-line indentation is dropped before decoding.
pub fn load_rsa_private_pem(pem: &str) -> Result<rsa::RsaPrivateKey, Error> {
    use pkcs8::DecodePrivateKey;
    let normalized = normalize_pem(pem);

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(&normalized) {
        return Ok(pk);
    }

    use pkcs1::DecodeRsaPrivateKey;
    rsa::RsaPrivateKey::from_pkcs1_pem(&normalized)
        .map_err(|e| Error::InvalidCaf(format!("failed to parse RSA private key PEM: {e}")))
}

/// Load an RSA private key from PKCS#8 DER (as extracted from PKCS#12).
pub fn load_rsa_private_pkcs8_der(der: &[u8]) -> Result<rsa::RsaPrivateKey, Error> {
    use pkcs8::DecodePrivateKey;
    rsa::RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| Error::CertLoad(format!("PKCS#12 key is not an RSA PKCS#8 key: {e}")))
}

/// Extract the RSA public key of an X.509 certificate.
pub fn load_x509_rsa_public_der(cert_der: &[u8]) -> Result<rsa::RsaPublicKey, Error> {
    use der::{Decode, Encode};
    use spki::DecodePublicKey;
    use x509_cert::Certificate;

    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::CertLoad(format!("failed to parse X.509 certificate: {e}")))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::CertLoad(format!("failed to encode SPKI: {e}")))?;
    rsa::RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| Error::CertLoad(format!("certificate key is not RSA: {e}")))
}

/// Subject distinguished name of a certificate, for diagnostics.
pub fn x509_subject(cert_der: &[u8]) -> Result<String, Error> {
    use der::Decode;
    let cert = x509_cert::Certificate::from_der(cert_der)
        .map_err(|e| Error::CertLoad(format!("failed to parse X.509 certificate: {e}")))?;
    Ok(cert.tbs_certificate.subject.to_string())
}

fn normalize_pem(pem: &str) -> String {
    let mut out = String::with_capacity(pem.len());
    for line in pem.lines().map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
