#![forbid(unsafe_code)]

pub use siidte_core as core;
pub use siidte_xml as xml;
pub use siidte_c14n as c14n;
pub use siidte_crypto as crypto;
pub use siidte_pkcs12 as pkcs12;
pub use siidte_keys as keys;
pub use siidte_dsig as dsig;
pub use siidte_dte as dte;
