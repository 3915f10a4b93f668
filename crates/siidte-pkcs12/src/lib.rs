#![forbid(unsafe_code)]

//! PKCS#12 (.pfx/.p12) reader for the certificate that signs SII envelopes.
//!
//! Handles the two layouts certificate vendors hand out: legacy PBE
//! (SHA-1 + 3DES-CBC, SHA-1 MAC) and OpenSSL 3 defaults (PBES2 with
//! PBKDF2 + AES-256-CBC, SHA-256 MAC). A failed integrity MAC is reported
//! as [`siidte_core::Error::BadPassword`]; every other problem is a
//! [`siidte_core::Error::CertLoad`].

mod kdf;
mod parse;

/// Keys and certificates found in a PFX.
#[derive(Debug, Default)]
pub struct PfxContents {
    /// PKCS#8 `PrivateKeyInfo` DER, one per key bag.
    pub keys: Vec<Vec<u8>>,
    /// X.509 certificate DER, in bag order.
    pub certificates: Vec<Vec<u8>>,
}

/// Open a PFX with `password`.
pub fn parse_pfx(data: &[u8], password: &str) -> siidte_core::Result<PfxContents> {
    parse::parse_pfx(data, password)
}
