#![forbid(unsafe_code)]

//! Core types shared by every `siidte` crate: the closed error enum,
//! namespace and element-name constants, and algorithm URIs.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result, VerifyFailure};
