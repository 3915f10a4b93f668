#![forbid(unsafe_code)]

//! SetDTE resigner and Caratula accounting.

use siidte_core::{ns, ns::node, Error};
use siidte_dsig::{sign_sibling, DsigContext};
use siidte_xml::{document_scope, indent, Element, Node};
use tracing::{debug, warn};

use crate::clock::{self, Clock};
use crate::envelope::{is_payload, EnvelopeKind};

/// Depth of the signed set below the root.
pub const SET_LEVEL: usize = 1;

/// A `SubTotDTE` line whose parsed count differs from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtotalDivergence {
    pub tipo: String,
    /// `None` when the input Caratula had no line for this type.
    pub parsed: Option<u64>,
    /// Zero when the output has no document of this type.
    pub counted: u64,
}

/// Count the output documents per `TipoDTE`, in first-appearance order.
pub fn count_types(dtes: &[Element]) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = Vec::new();
    for dte in dtes {
        let tipo = dte
            .elements()
            .find(|e| is_payload(e))
            .and_then(|doc| doc.path(ns::SII_DTE, &[node::ENCABEZADO, node::ID_DOC, node::TIPO_DTE]))
            .map(Element::trimmed_text);
        let Some(tipo) = tipo else { continue };
        match counts.iter_mut().find(|(t, _)| *t == tipo) {
            Some((_, n)) => *n += 1,
            None => counts.push((tipo, 1)),
        }
    }
    counts
}

/// Rebuild the `SubTotDTE` lines of `caratula` from `counts`, reporting
/// every line that changes. New lines take the place of the first old
/// one, or follow `TmstFirmaEnv` when there was none.
pub fn recount_subtotals(caratula: &mut Element, counts: &[(String, u64)]) -> Vec<SubtotalDivergence> {
    let parsed: Vec<(String, Option<u64>)> = caratula
        .children_named(ns::SII_DTE, node::SUB_TOT_DTE)
        .map(|s| {
            (
                s.child_text(ns::SII_DTE, node::TPO_DTE).unwrap_or_default(),
                s.child_text(ns::SII_DTE, node::NRO_DTE).and_then(|n| n.parse().ok()),
            )
        })
        .collect();

    let mut divergences = Vec::new();
    for (tipo, counted) in counts {
        let before = parsed.iter().find(|(t, _)| t == tipo).and_then(|(_, n)| *n);
        if before != Some(*counted) {
            divergences.push(SubtotalDivergence { tipo: tipo.clone(), parsed: before, counted: *counted });
        }
    }
    for (tipo, before) in &parsed {
        if !counts.iter().any(|(t, _)| t == tipo) {
            divergences.push(SubtotalDivergence { tipo: tipo.clone(), parsed: *before, counted: 0 });
        }
    }
    for d in &divergences {
        warn!(tipo = %d.tipo, parsed = ?d.parsed, counted = d.counted, "Caratula SubTotDTE differs from the signed documents");
    }

    let first = caratula
        .children
        .iter()
        .position(|n| n.as_element().is_some_and(|e| e.is(ns::SII_DTE, node::SUB_TOT_DTE)));
    caratula.take_children(|e| e.is(ns::SII_DTE, node::SUB_TOT_DTE));
    let lines = counts.iter().map(|(tipo, n)| {
        let mut line = Element::new(ns::SII_DTE, node::SUB_TOT_DTE);
        line.push_element(Element::with_text(ns::SII_DTE, node::TPO_DTE, tipo));
        line.push_element(Element::with_text(ns::SII_DTE, node::NRO_DTE, &n.to_string()));
        Node::Element(line)
    });
    let at = match first {
        Some(i) => i.min(caratula.children.len()),
        None => caratula
            .children
            .iter()
            .position(|n| n.as_element().is_some_and(|e| e.is(ns::SII_DTE, node::TMST_FIRMA_ENV)))
            .map_or(caratula.children.len(), |i| i + 1),
    };
    caratula.children.splice(at..at, lines);
    divergences
}

pub struct SetDteResigner<'a> {
    ctx: DsigContext<'a>,
    clock: &'a dyn Clock,
    kind: EnvelopeKind,
}

impl<'a> SetDteResigner<'a> {
    pub fn new(ctx: DsigContext<'a>, clock: &'a dyn Clock, kind: EnvelopeKind) -> Self {
        Self { ctx, clock, kind }
    }

    /// The output root: `parsed` without children, unprefixed, with the
    /// SII namespace as its default.
    pub fn envelope_root(&self, parsed: &Element) -> Element {
        let mut root = parsed.shallow_clone();
        root.prefix = None;
        if !root.ns_decls.iter().any(|(p, uri)| p.is_empty() && uri == ns::SII_DTE) {
            root.ns_decls.retain(|(p, _)| !p.is_empty());
            root.ns_decls.insert(0, (String::new(), ns::SII_DTE.to_owned()));
        }
        root
    }

    /// The output set element: `parsed` without children, carrying the
    /// set ID of this envelope kind.
    pub fn set_element(&self, parsed: &Element) -> Element {
        let mut set = parsed.shallow_clone();
        set.prefix = None;
        set.name = self.kind.set.to_owned();
        set.set_attribute(ns::attr::ID, self.kind.set_id);
        set
    }

    /// Fill `set` with the Caratula and `payloads`, sign it and close the
    /// envelope `root`. Both come from [`Self::envelope_root`] and
    /// [`Self::set_element`]; payloads signed beforehand must have been
    /// signed in the scope those two establish.
    pub fn resign(&self, mut root: Element, mut set: Element, mut caratula: Element, payloads: Vec<Element>) -> Result<Element, Error> {
        let scope = root.scope(&document_scope());

        caratula.set_child_text(ns::SII_DTE, node::TMST_FIRMA_ENV, &clock::timestamp(self.clock.now()));
        set.push_element(caratula);
        for payload in payloads {
            set.push_element(payload);
        }
        indent(&mut set, SET_LEVEL);

        let signature = sign_sibling(&self.ctx, &set, &scope, SET_LEVEL)?;
        debug!(kind = self.kind.root, id = self.kind.set_id, "signed envelope set");

        root.push_element(set);
        root.push_element(signature);
        indent(&mut root, 0);
        Ok(root)
    }
}
