#![forbid(unsafe_code)]

//! Cryptographic primitives for SII envelopes.
//!
//! Everything the TED stamp and the XMLDSig layers need: SHA digests,
//! RSA PKCS#1 v1.5 signatures, and the base64 helpers that move key
//! material and signature values in and out of XML text.

pub mod digest;
pub mod encoding;
pub mod sign;

pub use digest::DigestMethod;
pub use sign::SignatureMethod;
