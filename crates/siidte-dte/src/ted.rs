#![forbid(unsafe_code)]

//! TED resigner.
//!
//! Re-stamps a DD: refreshes TSTED, signs the flattened DD with the CAF
//! key of its document type and wraps both in a new `<TED>`.

use siidte_core::{algorithm, ns, ns::node, Error};
use siidte_crypto::encoding::b64_encode;
use siidte_keys::{CafPool, CafRecord};
use siidte_xml::Element;
use tracing::{debug, warn};

use crate::clock::{self, Clock};

/// Outcome of the DD/CAF consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CafCheck {
    /// The DD's embedded `CAF/DA/RSAPK` is the pool key.
    Matches,
    /// It is not, and the DD was left alone.
    Mismatch,
    /// It was not, and the DD's CAF was replaced with the pool's.
    Replaced,
}

pub struct TedResigner<'a> {
    pool: &'a CafPool,
    clock: &'a dyn Clock,
    replace_dd_caf: bool,
}

impl<'a> TedResigner<'a> {
    pub fn new(pool: &'a CafPool, clock: &'a dyn Clock) -> Self {
        Self {
            pool,
            clock,
            replace_dd_caf: false,
        }
    }

    /// Replace a DD's embedded CAF when it does not carry the pool key.
    pub fn replace_dd_caf(mut self, yes: bool) -> Self {
        self.replace_dd_caf = yes;
        self
    }

    /// Build a new TED around `dd`, which is consumed.
    pub fn resign(&self, mut dd: Element) -> Result<(Element, CafCheck), Error> {
        let td_text = dd.child_text(ns::SII_DTE, node::TD).ok_or(Error::MissingTd)?;
        let td: u32 = td_text
            .parse()
            .map_err(|_| Error::MalformedEnvelope(format!("DD/TD {td_text:?} is not a document type")))?;

        dd.set_child_text(ns::SII_DTE, node::TSTED, &clock::timestamp(self.clock.now()));

        let record = self.pool.record(td)?;
        let check = self.check_caf(&mut dd, record);

        let payload = siidte_c14n::flatten(&dd);
        let signature = siidte_crypto::sign::rsa_sha1_sign(&record.key, &payload)?;
        debug!(td, folio = ?dd.child_text(ns::SII_DTE, node::F), bytes = payload.len(), "stamped TED");

        let mut frmt = Element::with_text(ns::SII_DTE, node::FRMT, &b64_encode(&signature));
        frmt.set_attribute(ns::attr::ALGORITMO, algorithm::FRMT_ALGORITHM);

        let mut ted = Element::new(ns::SII_DTE, node::TED);
        ted.set_attribute(ns::attr::VERSION, ns::VERSION_1_0);
        ted.push_element(dd);
        ted.push_element(frmt);
        Ok((ted, check))
    }

    fn check_caf(&self, dd: &mut Element, record: &CafRecord) -> CafCheck {
        let embedded = dd
            .path(ns::SII_DTE, &[node::CAF, node::DA, node::RSAPK])
            .and_then(|pk| {
                Some((
                    pk.child_text(ns::SII_DTE, node::RSAPK_M)?,
                    pk.child_text(ns::SII_DTE, node::RSAPK_E)?,
                ))
            })
            .map(|(m, e)| (compact(&m), compact(&e)));
        let pool = record.rsapk().map(|(m, e)| (compact(&m), compact(&e)));
        if embedded.is_some() && embedded == pool {
            return CafCheck::Matches;
        }

        if !self.replace_dd_caf {
            warn!(td = record.td, caf = %record.path.display(), "DD carries a CAF whose RSAPK is not the pool key; FRMT will not verify against it");
            return CafCheck::Mismatch;
        }
        let caf = in_namespace_of(dd, record.caf.clone());
        match dd.children.iter().position(|n| n.as_element().is_some_and(|e| e.is(ns::SII_DTE, node::CAF))) {
            Some(i) => dd.children[i] = siidte_xml::Node::Element(caf),
            None => dd.insert_after(ns::SII_DTE, node::IT1, caf),
        }
        warn!(td = record.td, caf = %record.path.display(), "replaced DD/CAF with the pool CAF");
        CafCheck::Replaced
    }
}

/// Move a CAF subtree read from a standalone file into the DD's namespace.
fn in_namespace_of(dd: &Element, mut caf: Element) -> Element {
    caf.walk_mut(&mut |e: &mut Element| {
        e.namespace = dd.namespace.clone();
        e.prefix = dd.prefix.clone();
        e.ns_decls.clear();
    });
    caf
}

fn compact(b64: &str) -> String {
    b64.split_ascii_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use siidte_xml::XmlDocument;
    use std::path::PathBuf;

    fn pool() -> CafPool {
        CafPool::build(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../test-data/caf")).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap())
    }

    /// DD of the first document of a fixture envelope.
    fn dd(name: &str) -> Element {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../test-data/envelopes").join(name);
        let root = XmlDocument::parse(&std::fs::read(path).unwrap()).unwrap().root;
        root.find(&|e: &Element| e.is(ns::SII_DTE, node::DD)).unwrap().clone()
    }

    fn frmt_verifies(ted: &Element, key: &rsa::RsaPublicKey) -> bool {
        let dd = ted.child(ns::SII_DTE, node::DD).unwrap();
        let frmt = ted.child(ns::SII_DTE, node::FRMT).unwrap();
        let sig = siidte_crypto::encoding::b64_decode(&frmt.text()).unwrap();
        siidte_crypto::sign::rsa_sha1_verify(key, &siidte_c14n::flatten(dd), &sig).unwrap()
    }

    #[test]
    fn test_resign_ted() {
        let pool = pool();
        let clock = clock();
        let (ted, check) = TedResigner::new(&pool, &clock).resign(dd("envio_33.xml")).unwrap();
        assert_eq!(check, CafCheck::Matches);
        assert_eq!(ted.attribute("version"), Some("1.0"));

        let dd = ted.child(ns::SII_DTE, node::DD).unwrap();
        assert_eq!(dd.child_text(ns::SII_DTE, node::TSTED).as_deref(), Some("2024-06-01T10:00:00"));
        let frmt = ted.child(ns::SII_DTE, node::FRMT).unwrap();
        assert_eq!(frmt.attribute("algoritmo"), Some("SHA1withRSA"));
        assert!(frmt_verifies(&ted, &pool.record(33).unwrap().key.to_public_key()));
    }

    #[test]
    fn test_deterministic_frmt() {
        let pool = pool();
        let clock = clock();
        let resigner = TedResigner::new(&pool, &clock);
        let (a, _) = resigner.resign(dd("envio_33.xml")).unwrap();
        let (b, _) = resigner.resign(dd("envio_33.xml")).unwrap();
        assert_eq!(a.child(ns::SII_DTE, node::FRMT), b.child(ns::SII_DTE, node::FRMT));
    }

    #[test]
    fn test_missing_td() {
        let pool = pool();
        let clock = clock();
        let mut dd = dd("envio_33.xml");
        dd.take_child(ns::SII_DTE, node::TD);
        assert!(matches!(TedResigner::new(&pool, &clock).resign(dd), Err(Error::MissingTd)));
    }

    #[test]
    fn test_missing_caf() {
        let pool = pool();
        let clock = clock();
        let err = TedResigner::new(&pool, &clock).resign(dd("envio_34.xml")).unwrap_err();
        assert!(matches!(err, Error::MissingCaf { td: 34 }));
    }

    #[test]
    fn test_foreign_caf_replaced() {
        let pool = pool();
        let clock = clock();
        // Claim type 61 while embedding the type 33 CAF.
        let mut dd = dd("envio_33.xml");
        dd.set_child_text(ns::SII_DTE, node::TD, "61");

        let (_, check) = TedResigner::new(&pool, &clock).resign(dd.clone()).unwrap();
        assert_eq!(check, CafCheck::Mismatch);

        let (ted, check) = TedResigner::new(&pool, &clock).replace_dd_caf(true).resign(dd).unwrap();
        assert_eq!(check, CafCheck::Replaced);
        let new_dd = ted.child(ns::SII_DTE, node::DD).unwrap();
        let td = new_dd.path(ns::SII_DTE, &[node::CAF, node::DA, node::TD]).unwrap();
        assert_eq!(td.text(), "61");
        let pk = new_dd.path(ns::SII_DTE, &[node::CAF, node::DA, node::RSAPK]).unwrap();
        let key = siidte_crypto::encoding::rsa_public_from_b64(
            &pk.child_text(ns::SII_DTE, node::RSAPK_M).unwrap(),
            &pk.child_text(ns::SII_DTE, node::RSAPK_E).unwrap(),
        )
        .unwrap();
        assert!(frmt_verifies(&ted, &key));
    }
}
