#![forbid(unsafe_code)]

//! XML namespace constants and SII element names.

/// SII electronic tax document namespace.
pub const SII_DTE: &str = "http://www.sii.cl/SiiDte";

/// XML Digital Signature namespace.
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Schema instance namespace.
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// RUT of the SII itself, the fixed receiver of every envelope.
pub const SII_RUT: &str = "60803000-K";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // Envelope
    pub const ENVIO_DTE: &str = "EnvioDTE";
    pub const SET_DTE: &str = "SetDTE";
    pub const CARATULA: &str = "Caratula";
    pub const RUT_EMISOR: &str = "RutEmisor";
    pub const RUT_ENVIA: &str = "RutEnvia";
    pub const RUT_RECEPTOR: &str = "RutReceptor";
    pub const TMST_FIRMA_ENV: &str = "TmstFirmaEnv";
    pub const SUB_TOT_DTE: &str = "SubTotDTE";
    pub const TPO_DTE: &str = "TpoDTE";
    pub const NRO_DTE: &str = "NroDTE";

    // Books
    pub const LIBRO_COMPRA_VENTA: &str = "LibroCompraVenta";
    pub const ENVIO_LIBRO: &str = "EnvioLibro";

    // Document
    pub const DTE: &str = "DTE";
    pub const DOCUMENTO: &str = "Documento";
    pub const EXPORTACIONES: &str = "Exportaciones";
    pub const ENCABEZADO: &str = "Encabezado";
    pub const ID_DOC: &str = "IdDoc";
    pub const TIPO_DTE: &str = "TipoDTE";
    pub const FOLIO: &str = "Folio";
    pub const FCH_EMIS: &str = "FchEmis";
    pub const FCH_VENC: &str = "FchVenc";
    pub const DETALLE: &str = "Detalle";
    pub const REFERENCIA: &str = "Referencia";
    pub const TMST_FIRMA: &str = "TmstFirma";

    // Stamp
    pub const TED: &str = "TED";
    pub const DD: &str = "DD";
    pub const FRMT: &str = "FRMT";
    pub const RE: &str = "RE";
    pub const TD: &str = "TD";
    pub const F: &str = "F";
    pub const FE: &str = "FE";
    pub const IT1: &str = "IT1";
    pub const TSTED: &str = "TSTED";

    // CAF
    pub const AUTORIZACION: &str = "AUTORIZACION";
    pub const CAF: &str = "CAF";
    pub const DA: &str = "DA";
    pub const RNG: &str = "RNG";
    pub const RNG_D: &str = "D";
    pub const RNG_H: &str = "H";
    pub const RSAPK: &str = "RSAPK";
    pub const RSAPK_M: &str = "M";
    pub const RSAPK_E: &str = "E";
    pub const RSASK: &str = "RSASK";

    // DSig
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "ID";
    pub const VERSION: &str = "version";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const ALGORITMO: &str = "algoritmo";
}

/// Value of every `version` attribute this crate writes.
pub const VERSION_1_0: &str = "1.0";

/// ID of the SetDTE element.
pub const SET_DOC_ID: &str = "SetDoc";
