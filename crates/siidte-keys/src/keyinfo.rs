#![forbid(unsafe_code)]

//! `<KeyInfo>` construction and key extraction.
//!
//! Signatures written by this crate carry both an `RSAKeyValue` and the
//! signer's `X509Certificate`. When reading, the certificate wins; the
//! bare key value is the fallback.

use rsa::RsaPublicKey;
use siidte_core::{ns, ns::node, Error};
use siidte_crypto::encoding::{b64_decode, rsa_public_from_b64};
use siidte_xml::Element;

use crate::{loader, EnvelopeCertificate};

/// Build `KeyInfo/KeyValue/RSAKeyValue` + `KeyInfo/X509Data/X509Certificate`
/// for `cert`. Elements are unprefixed and rely on the enclosing
/// `Signature`'s default namespace.
pub fn build_key_info(cert: &EnvelopeCertificate) -> Element {
    let (modulus, exponent) = cert.rsa_key_value_b64();

    let mut rsa_key_value = Element::new(ns::DSIG, node::RSA_KEY_VALUE);
    rsa_key_value.push_element(Element::with_text(ns::DSIG, node::RSA_MODULUS, &modulus));
    rsa_key_value.push_element(Element::with_text(ns::DSIG, node::RSA_EXPONENT, &exponent));
    let mut key_value = Element::new(ns::DSIG, node::KEY_VALUE);
    key_value.push_element(rsa_key_value);

    let mut x509_data = Element::new(ns::DSIG, node::X509_DATA);
    x509_data.push_element(Element::with_text(
        ns::DSIG,
        node::X509_CERTIFICATE,
        &cert.certificate_body(),
    ));

    let mut key_info = Element::new(ns::DSIG, node::KEY_INFO);
    key_info.push_element(key_value);
    key_info.push_element(x509_data);
    key_info
}

/// Public key carried by a `<KeyInfo>` element.
pub fn extract_public_key(key_info: &Element) -> Result<RsaPublicKey, Error> {
    if let Some(cert) = key_info.path(ns::DSIG, &[node::X509_DATA, node::X509_CERTIFICATE]) {
        let der = b64_decode(&cert.text())?;
        return loader::load_x509_rsa_public_der(&der);
    }
    if let Some(rsa) = key_info.path(ns::DSIG, &[node::KEY_VALUE, node::RSA_KEY_VALUE]) {
        let modulus = rsa.child_text(ns::DSIG, node::RSA_MODULUS);
        let exponent = rsa.child_text(ns::DSIG, node::RSA_EXPONENT);
        if let (Some(m), Some(e)) = (modulus, exponent) {
            return rsa_public_from_b64(&m, &e);
        }
    }
    Err(Error::Signing("KeyInfo carries neither X509Certificate nor RSAKeyValue".into()))
}
