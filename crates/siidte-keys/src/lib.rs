#![forbid(unsafe_code)]

//! Key material for SII envelopes.
//!
//! Two kinds of keys sign an envelope: the CAF keys issued by the SII per
//! document type (they stamp each TED), and the taxpayer's certificate
//! from a PKCS#12 bundle (it signs each Documento and the SetDTE).

pub mod caf;
pub mod certificate;
pub mod keyinfo;
pub mod loader;

pub use caf::{CafPool, CafRecord};
pub use certificate::EnvelopeCertificate;
