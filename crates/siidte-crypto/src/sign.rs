#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signatures.
//!
//! PKCS#1 v1.5 signing is deterministic, so a TED stamp over identical DD
//! bytes always yields the identical FRMT.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use signature::{SignatureEncoding, Signer, Verifier};
use siidte_core::{algorithm, Error};

/// A `SignatureMethod` this crate can produce and check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMethod {
    RsaSha1,
    RsaSha256,
}

impl SignatureMethod {
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::RSA_SHA1 => Ok(Self::RsaSha1),
            algorithm::RSA_SHA256 => Ok(Self::RsaSha256),
            _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            Self::RsaSha1 => algorithm::RSA_SHA1,
            Self::RsaSha256 => algorithm::RSA_SHA256,
        }
    }

    pub fn sign(self, key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let signed = match self {
            Self::RsaSha1 => SigningKey::<sha1::Sha1>::new(key.clone()).try_sign(data),
            Self::RsaSha256 => SigningKey::<sha2::Sha256>::new(key.clone()).try_sign(data),
        };
        signed
            .map(|sig| sig.to_vec())
            .map_err(|e| Error::Signing(format!("RSA PKCS#1 v1.5: {e}")))
    }

    /// `Ok(false)` for a signature that does not verify, including one
    /// that is not even the right length.
    pub fn verify(self, key: &RsaPublicKey, data: &[u8], sig: &[u8]) -> Result<bool, Error> {
        let Ok(sig) = Signature::try_from(sig) else {
            return Ok(false);
        };
        let ok = match self {
            Self::RsaSha1 => VerifyingKey::<sha1::Sha1>::new(key.clone()).verify(data, &sig),
            Self::RsaSha256 => VerifyingKey::<sha2::Sha256>::new(key.clone()).verify(data, &sig),
        };
        Ok(ok.is_ok())
    }
}

/// RSA-SHA1 over `data`: the FRMT primitive.
pub fn rsa_sha1_sign(key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    SignatureMethod::RsaSha1.sign(key, data)
}

pub fn rsa_sha1_verify(key: &RsaPublicKey, data: &[u8], sig: &[u8]) -> Result<bool, Error> {
    SignatureMethod::RsaSha1.verify(key, data, sig)
}
