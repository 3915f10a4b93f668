#![forbid(unsafe_code)]

//! Envelope parser.
//!
//! Reads an `EnvioDTE` into the owned tree and checks the shape the
//! re-signing pipeline depends on: one `SetDTE` holding a `Caratula`,
//! and `DTE` wrappers each carrying a `Documento` or `Exportaciones`.
//! Elements are matched by namespace URI, so the SII namespace may be
//! bound to any prefix (or none) in the input.

use siidte_core::{ns, ns::node, Error};
use siidte_xml::{document_scope, Attribute, Element, Encoding, Scope, XmlDocument};

/// Names of an envelope family: the root, the signed set and its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeKind {
    pub root: &'static str,
    pub set: &'static str,
    pub set_id: &'static str,
}

impl EnvelopeKind {
    /// `EnvioDTE/SetDTE[@ID="SetDoc"]`.
    pub const ENVIO_DTE: Self = Self {
        root: node::ENVIO_DTE,
        set: node::SET_DTE,
        set_id: ns::SET_DOC_ID,
    };

    /// Purchase and sales books: `LibroCompraVenta/EnvioLibro`.
    pub const LIBRO_COMPRA_VENTA: Self = Self {
        root: node::LIBRO_COMPRA_VENTA,
        set: node::ENVIO_LIBRO,
        set_id: ns::SET_DOC_ID,
    };
}

/// A parsed, structurally checked envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub root: Element,
    pub encoding: Encoding,
}

/// Read-only overview of an envelope, for `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeSummary {
    pub rut_emisor: Option<String>,
    pub rut_envia: Option<String>,
    pub rut_receptor: Option<String>,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub element: String,
    pub id: Option<String>,
    pub tipo: Option<String>,
    pub folio: Option<String>,
    pub fch_emis: Option<String>,
}

impl Envelope {
    /// Parse an `EnvioDTE`.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let doc = XmlDocument::parse(bytes)?;
        Self::from_document(doc, EnvelopeKind::ENVIO_DTE)
    }

    pub fn from_document(doc: XmlDocument, kind: EnvelopeKind) -> Result<Self, Error> {
        let envelope = Self {
            kind,
            root: doc.root,
            encoding: doc.encoding,
        };
        envelope.check()?;
        Ok(envelope)
    }

    fn check(&self) -> Result<(), Error> {
        if !self.root.is(ns::SII_DTE, self.kind.root) {
            return Err(Error::MalformedEnvelope(format!(
                "root element is <{}>, expected <{}> in {}",
                self.root.qname(),
                self.kind.root,
                ns::SII_DTE
            )));
        }
        self.caratula()?;
        if self.kind == EnvelopeKind::ENVIO_DTE {
            for (i, wrapper) in self.dte_wrappers()?.into_iter().enumerate() {
                if payload_of(wrapper).is_none() {
                    return Err(Error::MalformedEnvelope(format!(
                        "DTE #{} contains neither Documento nor Exportaciones",
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn root_attributes(&self) -> &[Attribute] {
        &self.root.attributes
    }

    /// Namespace declarations written on the root.
    pub fn namespaces(&self) -> &[(String, String)] {
        &self.root.ns_decls
    }

    /// The namespace scope seen by the root's children.
    pub fn root_scope(&self) -> Scope {
        self.root.scope(&document_scope())
    }

    pub fn set(&self) -> Result<&Element, Error> {
        self.root
            .child(ns::SII_DTE, self.kind.set)
            .ok_or_else(|| Error::MalformedEnvelope(format!("missing {}", self.kind.set)))
    }

    pub fn set_mut(&mut self) -> Result<&mut Element, Error> {
        let name = self.kind.set;
        self.root
            .child_mut(ns::SII_DTE, name)
            .ok_or_else(|| Error::MalformedEnvelope(format!("missing {name}")))
    }

    pub fn caratula(&self) -> Result<&Element, Error> {
        self.set()?
            .child(ns::SII_DTE, node::CARATULA)
            .ok_or_else(|| Error::MalformedEnvelope("missing Caratula".into()))
    }

    /// The `DTE` wrappers, in document order.
    pub fn dte_wrappers(&self) -> Result<Vec<&Element>, Error> {
        Ok(self.set()?.children_named(ns::SII_DTE, node::DTE).collect())
    }

    /// Each wrapper's payload (`Documento` or `Exportaciones`), in order.
    pub fn dte_elements(&self) -> Result<Vec<&Element>, Error> {
        Ok(self
            .dte_wrappers()?
            .into_iter()
            .filter_map(payload_of)
            .collect())
    }

    pub fn summary(&self) -> Result<EnvelopeSummary, Error> {
        let caratula = self.caratula()?;
        let documents = self
            .dte_elements()?
            .into_iter()
            .map(|doc| {
                let id_doc = doc.path(ns::SII_DTE, &[node::ENCABEZADO, node::ID_DOC]);
                let field = |name: &str| id_doc.and_then(|d| d.child_text(ns::SII_DTE, name));
                DocumentSummary {
                    element: doc.name.clone(),
                    id: doc.attribute(ns::attr::ID).map(str::to_owned),
                    tipo: field(node::TIPO_DTE),
                    folio: field(node::FOLIO),
                    fch_emis: field(node::FCH_EMIS),
                }
            })
            .collect();
        Ok(EnvelopeSummary {
            rut_emisor: caratula.child_text(ns::SII_DTE, node::RUT_EMISOR),
            rut_envia: caratula.child_text(ns::SII_DTE, node::RUT_ENVIA),
            rut_receptor: caratula.child_text(ns::SII_DTE, node::RUT_RECEPTOR),
            documents,
        })
    }
}

/// Whether `el` is a DTE payload element.
pub fn is_payload(el: &Element) -> bool {
    el.is(ns::SII_DTE, node::DOCUMENTO) || el.is(ns::SII_DTE, node::EXPORTACIONES)
}

/// The `Documento` or `Exportaciones` inside a `DTE` wrapper.
pub fn payload_of(wrapper: &Element) -> Option<&Element> {
    wrapper.elements().find(|e| is_payload(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> Vec<u8> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../test-data/envelopes")
            .join(name);
        std::fs::read(path).unwrap()
    }

    #[test]
    fn test_parse_latin1_envelope() {
        let env = Envelope::parse(&fixture("envio_33.xml")).unwrap();
        assert_eq!(env.encoding, Encoding::Latin1);
        assert_eq!(env.root.attribute("version"), Some("1.0"));
        assert!(env
            .namespaces()
            .contains(&("xsi".to_owned(), ns::XSI.to_owned())));

        let docs = env.dte_elements().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].attribute("ID"), Some("F101T33"));
        let rzn = docs[0]
            .path(ns::SII_DTE, &["Encabezado", "Emisor", "RznSoc"])
            .unwrap()
            .text();
        assert_eq!(rzn, "COMERCIAL PEÑALOLEN LIMITADA");
    }

    #[test]
    fn test_summary() {
        let env = Envelope::parse(&fixture("envio_multi.xml")).unwrap();
        let summary = env.summary().unwrap();
        assert_eq!(summary.rut_receptor.as_deref(), Some(ns::SII_RUT));
        let ids: Vec<_> = summary.documents.iter().map(|d| d.id.clone().unwrap()).collect();
        assert_eq!(ids, ["F101T33", "F102T33", "F12T61"]);
        assert_eq!(summary.documents[2].tipo.as_deref(), Some("61"));
    }

    #[test]
    fn test_export_payload() {
        let env = Envelope::parse(&fixture("envio_export_110.xml")).unwrap();
        let docs = env.dte_elements().unwrap();
        assert_eq!(docs[0].name, "Exportaciones");
    }

    #[test]
    fn test_prefixed_namespace() {
        let xml = r#"<sii:EnvioDTE xmlns:sii="http://www.sii.cl/SiiDte" version="1.0"><sii:SetDTE ID="SetDoc"><sii:Caratula/><sii:DTE><sii:Documento ID="F1T33"/></sii:DTE></sii:SetDTE></sii:EnvioDTE>"#;
        let env = Envelope::parse(xml.as_bytes()).unwrap();
        assert_eq!(env.dte_elements().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed() {
        let cases = [
            r#"<EnvioDTE xmlns="urn:other"><SetDTE><Caratula/></SetDTE></EnvioDTE>"#,
            r#"<EnvioDTE xmlns="http://www.sii.cl/SiiDte"><Caratula/></EnvioDTE>"#,
            r#"<EnvioDTE xmlns="http://www.sii.cl/SiiDte"><SetDTE><DTE/></SetDTE></EnvioDTE>"#,
            r#"<EnvioDTE xmlns="http://www.sii.cl/SiiDte"><SetDTE><Caratula/><DTE><Otro/></DTE></SetDTE></EnvioDTE>"#,
        ];
        for xml in cases {
            assert!(
                matches!(Envelope::parse(xml.as_bytes()), Err(Error::MalformedEnvelope(_))),
                "{xml}"
            );
        }
    }

    #[test]
    fn test_not_xml() {
        assert!(matches!(Envelope::parse(b"<EnvioDTE"), Err(Error::XmlParse(_))));
    }
}
