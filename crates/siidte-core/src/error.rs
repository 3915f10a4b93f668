#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

/// Why a signed envelope was rejected by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyFailure {
    /// A TED's FRMT does not verify against the RSAPK embedded in its DD.
    FrmtMismatch,
    /// A Reference digest does not match the referenced subtree.
    DigestMismatch,
    /// A SignatureValue does not verify over the canonical SignedInfo.
    SigvalueMismatch,
    /// A Documento or SetDTE has no signature where one is required.
    MissingSignature,
    /// A Reference URI does not point at the element it must cover.
    UnknownId,
}

impl VerifyFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrmtMismatch => "frmt_mismatch",
            Self::DigestMismatch => "digest_mismatch",
            Self::SigvalueMismatch => "sigvalue_mismatch",
            Self::MissingSignature => "missing_signature",
            Self::UnknownId => "unknown_id",
        }
    }
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while parsing, re-signing or verifying SII envelopes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MalformedEnvelope: {0}")]
    MalformedEnvelope(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("MissingCAF: no CAF registered for TD={td}")]
    MissingCaf { td: u32 },

    #[error("NoCAFsLoaded: no usable CAF file found under {}", .0.display())]
    NoCafsLoaded(PathBuf),

    #[error("invalid CAF file: {0}")]
    InvalidCaf(String),

    #[error("MissingTD: DD element has no TD child")]
    MissingTd,

    #[error("FolioOutOfRange: folio {folio} for TD={td} is outside the CAF range {from}..={to}")]
    FolioOutOfRange { td: u32, folio: u64, from: u64, to: u64 },

    #[error("BadPassword: PKCS#12 MAC verification failed")]
    BadPassword,

    #[error("CertLoadError: {0}")]
    CertLoad(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("SigningFailure: {0}")]
    Signing(String),

    #[error("VerificationFailed[{reason}]: {detail}")]
    VerificationFailed { reason: VerifyFailure, detail: String },

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("IOFailure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for building a [`Error::VerificationFailed`].
    pub fn verification(reason: VerifyFailure, detail: impl Into<String>) -> Self {
        Self::VerificationFailed {
            reason,
            detail: detail.into(),
        }
    }

    /// The verification failure reason, if this is one.
    pub fn verify_failure(&self) -> Option<VerifyFailure> {
        match self {
            Self::VerificationFailed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Process exit code for the CLI: 1 for validation or cryptographic
    /// failures, 2 for I/O and malformed input.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCaf { .. }
            | Self::NoCafsLoaded(_)
            | Self::MissingTd
            | Self::FolioOutOfRange { .. }
            | Self::BadPassword
            | Self::Signing(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::VerificationFailed { .. } => 1,
            Self::MalformedEnvelope(_)
            | Self::XmlParse(_)
            | Self::CertLoad(_)
            | Self::InvalidCaf(_)
            | Self::Base64(_)
            | Self::Io(_) => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_caf_message_names_td() {
        let err = Error::MissingCaf { td: 34 };
        let msg = err.to_string();
        assert!(msg.contains("MissingCAF"));
        assert!(msg.contains("TD=34"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_verification_reason_rendering() {
        let err = Error::verification(VerifyFailure::DigestMismatch, "F101T33");
        assert_eq!(err.verify_failure(), Some(VerifyFailure::DigestMismatch));
        assert_eq!(err.to_string(), "VerificationFailed[digest_mismatch]: F101T33");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::MalformedEnvelope("x".into()).exit_code(), 2);
        assert_eq!(Error::Io(std::io::Error::other("x")).exit_code(), 2);
        assert_eq!(Error::BadPassword.exit_code(), 1);
    }
}
