#![forbid(unsafe_code)]

//! DTE resigner.
//!
//! Rebuilds a `Documento` from its preserved parts and a fresh TED, signs
//! it with the envelope certificate and wraps both in `<DTE>`.

use siidte_core::{ns, ns::node, Error};
use siidte_dsig::{sign_sibling, DsigContext};
use siidte_xml::{indent, Element, Node, Scope};
use tracing::debug;

use crate::clock::{self, Clock};

/// Depth of `DTE` in an `EnvioDTE` (root 0, SetDTE 1).
pub const DTE_LEVEL: usize = 2;

/// Depth of `Documento` and of its signature.
pub const DOCUMENTO_LEVEL: usize = DTE_LEVEL + 1;

/// A Documento taken apart. Only these pieces and the DD survive
/// re-signing.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentParts {
    pub id: String,
    pub encabezado: Element,
    /// Every child between Encabezado and TED in parsed order: the
    /// Detalle lines, any other schema section, the Referencia lines.
    pub body: Vec<Element>,
    /// Parsed `TmstFirma` text.
    pub timestamp: Option<String>,
}

impl DocumentParts {
    /// Take `documento` apart, returning its DD separately. Whitespace
    /// and comments between children are dropped.
    pub fn extract(documento: Element) -> Result<(Self, Element), Error> {
        let id = documento
            .attribute(ns::attr::ID)
            .ok_or_else(|| Error::MalformedEnvelope(format!("{} has no ID", documento.name)))?
            .to_owned();

        let mut encabezado = None;
        let mut body = Vec::new();
        let mut dd = None;
        let mut timestamp = None;
        for child in documento.children {
            let Node::Element(el) = child else { continue };
            if el.namespace.as_deref() != Some(ns::SII_DTE) {
                // Foreign elements, such as a leftover signature, are not part
                // of the signed document.
                continue;
            }
            match el.name.as_str() {
                node::ENCABEZADO => encabezado = Some(el),
                node::TED => {
                    dd = el
                        .children
                        .into_iter()
                        .filter_map(|n| match n {
                            Node::Element(e) if e.is(ns::SII_DTE, node::DD) => Some(e),
                            _ => None,
                        })
                        .next();
                }
                node::TMST_FIRMA => timestamp = Some(el.trimmed_text()),
                _ => body.push(el),
            }
        }

        let encabezado =
            encabezado.ok_or_else(|| Error::MalformedEnvelope(format!("{id} has no Encabezado")))?;
        let dd = dd.ok_or_else(|| Error::MalformedEnvelope(format!("{id} has no TED/DD")))?;
        Ok((
            Self {
                id,
                encabezado,
                body,
                timestamp,
            },
            dd,
        ))
    }

    pub fn detalles(&self) -> impl Iterator<Item = &Element> {
        self.body.iter().filter(|e| e.name == node::DETALLE)
    }

    pub fn referencias(&self) -> impl Iterator<Item = &Element> {
        self.body.iter().filter(|e| e.name == node::REFERENCIA)
    }
}

pub struct DteResigner<'a> {
    ctx: DsigContext<'a>,
    clock: &'a dyn Clock,
}

impl<'a> DteResigner<'a> {
    pub fn new(ctx: DsigContext<'a>, clock: &'a dyn Clock) -> Self {
        Self { ctx, clock }
    }

    /// Assemble `Documento` (Encabezado, body, `ted`, TmstFirma), sign it
    /// and return `<DTE version="1.0">` holding it and its signature.
    ///
    /// `wrapper` supplies the DTE's attributes and declarations; its
    /// children are discarded. `inherited` is the scope the DTE sees.
    pub fn resign(&self, parts: DocumentParts, ted: Element, wrapper: &Element, inherited: &Scope) -> Result<Element, Error> {
        let mut dte = wrapper.shallow_clone();
        dte.prefix = None;
        dte.name = node::DTE.to_owned();
        dte.set_attribute(ns::attr::VERSION, ns::VERSION_1_0);
        let scope = dte.scope(inherited);

        let timestamp = parts
            .timestamp
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| clock::timestamp(self.clock.now()));

        let mut documento = Element::new(ns::SII_DTE, node::DOCUMENTO);
        documento.set_attribute(ns::attr::ID, &parts.id);
        documento.push_element(parts.encabezado);
        for el in parts.body {
            documento.push_element(el);
        }
        documento.push_element(ted);
        documento.push_element(Element::with_text(ns::SII_DTE, node::TMST_FIRMA, &timestamp));
        indent(&mut documento, DOCUMENTO_LEVEL);

        let signature = sign_sibling(&self.ctx, &documento, &scope, DOCUMENTO_LEVEL)?;
        debug!(id = %parts.id, "signed Documento");

        dte.push_element(documento);
        dte.push_element(signature);
        indent(&mut dte, DTE_LEVEL);
        Ok(dte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use siidte_keys::EnvelopeCertificate;
    use siidte_xml::XmlDocument;
    use std::path::PathBuf;

    const DOC: &str = r#"<Documento xmlns="http://www.sii.cl/SiiDte" ID="F7T33">
  <Encabezado><IdDoc><TipoDTE>33</TipoDTE><Folio>7</Folio></IdDoc></Encabezado>
  <Detalle><NroLinDet>1</NroLinDet></Detalle>
  <Detalle><NroLinDet>2</NroLinDet></Detalle>
  <DscRcgGlobal><NroLinDR>1</NroLinDR></DscRcgGlobal>
  <Referencia><NroLinRef>1</NroLinRef></Referencia>
  <TED version="1.0"><DD><TD>33</TD></DD><FRMT algoritmo="SHA1withRSA">old</FRMT></TED>
  <TmstFirma>2024-01-01T09:15:00</TmstFirma>
</Documento>"#;

    fn cert() -> EnvelopeCertificate {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../test-data/certs/envelope.pfx");
        EnvelopeCertificate::load_pfx(&path, "secret123").unwrap()
    }

    fn parts() -> (DocumentParts, Element) {
        DocumentParts::extract(XmlDocument::parse_str(DOC).unwrap().root).unwrap()
    }

    #[test]
    fn test_extract() {
        let (parts, dd) = parts();
        assert_eq!(parts.id, "F7T33");
        assert_eq!(parts.detalles().count(), 2);
        assert_eq!(parts.referencias().count(), 1);
        let names: Vec<&str> = parts.body.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Detalle", "Detalle", "DscRcgGlobal", "Referencia"]);
        assert_eq!(dd.child_text(ns::SII_DTE, "TD").as_deref(), Some("33"));
        assert_eq!(parts.timestamp.as_deref(), Some("2024-01-01T09:15:00"));
    }

    #[test]
    fn test_extract_requires_dd() {
        let xml = DOC.replace("<DD><TD>33</TD></DD>", "");
        let doc = XmlDocument::parse_str(&xml).unwrap().root;
        assert!(matches!(DocumentParts::extract(doc), Err(Error::MalformedEnvelope(_))));
    }

    #[test]
    fn test_resign_layout_and_signature() {
        let cert = cert();
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap());
        let resigner = DteResigner::new(DsigContext::new(&cert), &clock);

        let (mut parts, dd) = parts();
        parts.timestamp = None;
        let mut ted = Element::new(ns::SII_DTE, node::TED);
        ted.push_element(dd);

        let wrapper = Element::new(ns::SII_DTE, node::DTE);
        let scope = siidte_xml::XmlDocument::parse_str(r#"<EnvioDTE xmlns="http://www.sii.cl/SiiDte"/>"#)
            .unwrap()
            .root
            .scope(&siidte_xml::document_scope());
        let dte = resigner.resign(parts, ted, &wrapper, &scope).unwrap();

        assert_eq!(dte.attribute("version"), Some("1.0"));
        let children: Vec<&str> = dte.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(children, ["Documento", "Signature"]);

        let documento = dte.child(ns::SII_DTE, node::DOCUMENTO).unwrap();
        let order: Vec<&str> = documento.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            order,
            ["Encabezado", "Detalle", "Detalle", "DscRcgGlobal", "Referencia", "TED", "TmstFirma"]
        );
        assert_eq!(documento.child_text(ns::SII_DTE, node::TMST_FIRMA).as_deref(), Some("2024-06-01T10:00:00"));

        let signature = dte.child(ns::DSIG, node::SIGNATURE).unwrap();
        siidte_dsig::verify_sibling(signature, documento, &dte.scope(&scope)).unwrap();
    }
}
