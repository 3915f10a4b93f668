#![forbid(unsafe_code)]

//! Signature stripper.
//!
//! Removes every stale signature from a parsed envelope, leaving only
//! structural data and the TED/DD payloads that will be re-stamped.
//! `ds:Signature` elements are matched by namespace URI, so prefixed and
//! default-namespace forms are both removed.

use siidte_core::{ns, ns::node, Error};
use siidte_xml::Element;
use tracing::debug;

use crate::envelope::{is_payload, Envelope};

/// How many elements each pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripCounts {
    pub frmt: usize,
    pub dte_signatures: usize,
    pub set_signatures: usize,
}

/// Run all three passes.
pub fn strip(envelope: &mut Envelope) -> Result<StripCounts, Error> {
    let counts = StripCounts {
        frmt: strip_frmt(envelope.set_mut()?),
        dte_signatures: strip_dte_signatures(envelope.set_mut()?),
        set_signatures: strip_set_signatures(envelope)?,
    };
    debug!(?counts, "stripped stale signatures");
    Ok(counts)
}

/// Remove every `TED/FRMT` below `el`.
pub fn strip_frmt(el: &mut Element) -> usize {
    let mut removed = 0;
    el.walk_mut(&mut |e: &mut Element| {
        if e.is(ns::SII_DTE, node::TED) {
            removed += e
                .take_children(|c| c.is(ns::SII_DTE, node::FRMT))
                .len();
        }
    });
    removed
}

/// Remove the signature of each DTE: the `Signature` children of every
/// `DTE` wrapper and of its payload.
pub fn strip_dte_signatures(set: &mut Element) -> usize {
    let mut removed = 0;
    for wrapper in set
        .elements_mut()
        .filter(|e| e.is(ns::SII_DTE, node::DTE))
    {
        removed += take_signatures(wrapper);
        for payload in wrapper.elements_mut().filter(|e| is_payload(e)) {
            removed += take_signatures(payload);
        }
    }
    removed
}

/// Remove the set signature: `Signature` children of the root (the usual
/// place, next to the set) and of the set itself.
pub fn strip_set_signatures(envelope: &mut Envelope) -> Result<usize, Error> {
    let on_root = take_signatures(&mut envelope.root);
    let on_set = take_signatures(envelope.set_mut()?);
    Ok(on_root + on_set)
}

fn take_signatures(el: &mut Element) -> usize {
    el.take_children(|c| c.is(ns::DSIG, node::SIGNATURE)).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn envelope(name: &str) -> Envelope {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../test-data/envelopes")
            .join(name);
        Envelope::parse(&std::fs::read(path).unwrap()).unwrap()
    }

    fn count(el: &Element, ns: &str, name: &str) -> usize {
        let mut found = Vec::new();
        el.find_all(&|e: &Element| e.is(ns, name), &mut found);
        found.len()
    }

    #[test]
    fn test_strip_multi() {
        let mut env = envelope("envio_multi.xml");
        let counts = strip(&mut env).unwrap();
        assert_eq!(
            counts,
            StripCounts {
                frmt: 3,
                dte_signatures: 3,
                set_signatures: 1
            }
        );
        assert_eq!(count(&env.root, ns::DSIG, node::SIGNATURE), 0);
        assert_eq!(count(&env.root, ns::SII_DTE, node::FRMT), 0);
        assert_eq!(count(&env.root, ns::SII_DTE, node::DD), 3);
    }

    #[test]
    fn test_prefixed_signature_removed() {
        // envio_33 carries a `ds:`-prefixed DTE signature.
        let mut env = envelope("envio_33.xml");
        let counts = strip(&mut env).unwrap();
        assert_eq!(counts.dte_signatures, 1);
        assert_eq!(counts.set_signatures, 1);
    }

    #[test]
    fn test_idempotent() {
        let mut env = envelope("envio_multi.xml");
        strip(&mut env).unwrap();
        let again = strip(&mut env).unwrap();
        assert_eq!(again, StripCounts::default());
    }
}
