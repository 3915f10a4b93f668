#![forbid(unsafe_code)]

//! DSig context: the signing certificate and the algorithms written into
//! every `SignedInfo`.

use siidte_c14n::C14nMode;
use siidte_core::algorithm;
use siidte_keys::EnvelopeCertificate;

/// Context for XML-DSig signing.
#[derive(Debug, Clone, Copy)]
pub struct DsigContext<'a> {
    /// Certificate whose key signs and whose body goes into `KeyInfo`.
    pub certificate: &'a EnvelopeCertificate,
    pub c14n_mode: C14nMode,
    pub digest_uri: &'static str,
    pub signature_uri: &'static str,
}

impl<'a> DsigContext<'a> {
    /// The SII profile: C14N 1.0 without comments, SHA-1, RSA-SHA1.
    pub fn new(certificate: &'a EnvelopeCertificate) -> Self {
        Self {
            certificate,
            c14n_mode: C14nMode::Inclusive,
            digest_uri: algorithm::SHA1,
            signature_uri: algorithm::RSA_SHA1,
        }
    }
}
