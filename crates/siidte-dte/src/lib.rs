#![forbid(unsafe_code)]

//! Re-signing and verification of SII electronic tax document envelopes.
//!
//! An `EnvioDTE` carries three stacked signatures: a TED stamp per
//! document (RSA over the flattened DD with the CAF key of its type), an
//! XMLDSig per `Documento`, and an XMLDSig over the whole `SetDTE`.
//! [`Resigner`] strips and rebuilds all three; [`verify_envelope`] checks
//! them.

pub mod clock;
pub mod dte;
pub mod envelope;
pub mod pipeline;
pub mod prompt;
pub mod rewrite;
pub mod setdte;
pub mod strip;
pub mod ted;
pub mod verify;

pub use clock::{Clock, FixedClock, SystemClock};
pub use envelope::{Envelope, EnvelopeKind, EnvelopeSummary};
pub use pipeline::{resign_batch, FolioPolicy, ResignJob, ResignOptions, ResignReport, Resigner};
pub use prompt::{FolioPrompt, KeepFolio, LinePrompt};
pub use verify::{verify_envelope, DocumentState, VerifyReport};
