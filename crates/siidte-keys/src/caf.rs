#![forbid(unsafe_code)]

//! CAF (Código de Autorización de Folios) key pool.
//!
//! A CAF file is the SII's authorization for a range of folios of one
//! document type. It carries the signed `<CAF>` descriptor (embedded
//! verbatim in every TED) and the RSA private key (`RSASK`) that stamps
//! those TEDs. The pool indexes the keys by document type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rsa::RsaPrivateKey;
use siidte_core::{ns::node, Error};
use siidte_xml::{Element, XmlDocument};
use tracing::{debug, info, warn};

use crate::loader;

/// One authorization: document type, folio range, key and descriptor.
#[derive(Debug)]
pub struct CafRecord {
    pub td: u32,
    /// First authorized folio (`RNG/D`).
    pub from: u64,
    /// Last authorized folio (`RNG/H`).
    pub to: u64,
    pub key: Arc<RsaPrivateKey>,
    /// The `<CAF>` element, as embedded in a DD.
    pub caf: Element,
    pub path: PathBuf,
}

impl CafRecord {
    /// Parse one CAF file's bytes.
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self, Error> {
        let root = XmlDocument::parse(bytes)?.root;
        let caf = if root.name == node::CAF {
            root.clone()
        } else {
            root.child("", node::CAF)
                .cloned()
                .ok_or_else(|| Error::InvalidCaf("no CAF element".into()))?
        };
        let da = caf
            .child("", node::DA)
            .ok_or_else(|| Error::InvalidCaf("CAF has no DA".into()))?;

        let td = da
            .child_text("", node::TD)
            .ok_or_else(|| Error::InvalidCaf("DA has no TD".into()))?
            .parse::<u32>()
            .map_err(|e| Error::InvalidCaf(format!("DA/TD: {e}")))?;
        let range = |name: &str| -> Result<u64, Error> {
            da.path("", &[node::RNG, name])
                .map(Element::trimmed_text)
                .ok_or_else(|| Error::InvalidCaf(format!("DA has no RNG/{name}")))?
                .parse::<u64>()
                .map_err(|e| Error::InvalidCaf(format!("RNG/{name}: {e}")))
        };
        let (from, to) = (range(node::RNG_D)?, range(node::RNG_H)?);

        let rsask = root
            .child("", node::RSASK)
            .ok_or_else(|| Error::InvalidCaf("no RSASK element".into()))?
            .text();
        let key = loader::load_rsa_private_pem(&rsask)?;

        Ok(Self {
            td,
            from,
            to,
            key: Arc::new(key),
            caf,
            path: path.to_path_buf(),
        })
    }

    pub fn contains(&self, folio: u64) -> bool {
        (self.from..=self.to).contains(&folio)
    }

    /// Base64 `RSAPK/M` and `RSAPK/E` of the descriptor.
    pub fn rsapk(&self) -> Option<(String, String)> {
        let pk = self.caf.path("", &[node::DA, node::RSAPK])?;
        Some((
            pk.child_text("", node::RSAPK_M)?,
            pk.child_text("", node::RSAPK_E)?,
        ))
    }
}

/// Read-only map from document type to its CAF. Built once, shared by
/// reference with every signing operation.
#[derive(Debug, Default)]
pub struct CafPool {
    records: HashMap<u32, Arc<CafRecord>>,
}

impl CafPool {
    /// Walk `dir` recursively and load every `*.xml` CAF. Files that are
    /// not usable CAFs are skipped. When two files authorize the same
    /// document type, the one visited last wins (paths are visited in
    /// sorted order).
    pub fn build(dir: &Path) -> Result<Self, Error> {
        let mut files = Vec::new();
        collect_xml_files(std::fs::read_dir(dir)?, &mut files);
        files.sort();

        let mut pool = Self::default();
        for path in files {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable CAF file");
                    continue;
                }
            };
            match CafRecord::parse(&bytes, &path) {
                Ok(record) => pool.insert(record),
                Err(e @ Error::XmlParse(_)) => {
                    debug!(path = %path.display(), error = %e, "skipping non-CAF XML");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unusable CAF file");
                }
            }
        }

        if pool.is_empty() {
            return Err(Error::NoCafsLoaded(dir.to_path_buf()));
        }
        info!(dir = %dir.display(), types = ?pool.types(), "CAF pool ready");
        Ok(pool)
    }

    /// Add a record, replacing any previous one for the same type.
    pub fn insert(&mut self, record: CafRecord) {
        debug!(td = record.td, from = record.from, to = record.to, path = %record.path.display(), "registered CAF");
        if let Some(old) = self.records.insert(record.td, Arc::new(record)) {
            debug!(td = old.td, path = %old.path.display(), "CAF replaced by a later file");
        }
    }

    /// The CAF registered for `td`.
    pub fn record(&self, td: u32) -> Result<&CafRecord, Error> {
        self.records
            .get(&td)
            .map(Arc::as_ref)
            .ok_or(Error::MissingCaf { td })
    }

    /// The private key for `td`.
    pub fn key_for(&self, td: u32) -> Result<Arc<RsaPrivateKey>, Error> {
        self.record(td).map(|r| Arc::clone(&r.key))
    }

    /// Fail with [`Error::FolioOutOfRange`] when `folio` is outside the
    /// CAF range for `td`.
    pub fn check_folio(&self, td: u32, folio: u64) -> Result<(), Error> {
        let record = self.record(td)?;
        if record.contains(folio) {
            Ok(())
        } else {
            Err(Error::FolioOutOfRange {
                td,
                folio,
                from: record.from,
                to: record.to,
            })
        }
    }

    /// Registered document types, ascending.
    pub fn types(&self) -> Vec<u32> {
        let mut types: Vec<u32> = self.records.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Sub-directories that cannot be listed are skipped like unreadable files.
fn collect_xml_files(entries: std::fs::ReadDir, out: &mut Vec<PathBuf>) {
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if path.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(sub) => collect_xml_files(sub, out),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable CAF directory"),
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            out.push(path);
        }
    }
}
