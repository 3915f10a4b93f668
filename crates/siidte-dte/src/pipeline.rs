#![forbid(unsafe_code)]

//! The re-signing pipeline.
//!
//! Parser → stripper → per document (rewriter → TED → DTE) → SetDTE.
//! Nothing is written until the whole envelope is signed.

use std::path::{Path, PathBuf};

use siidte_core::{ns, Error};
use siidte_dsig::DsigContext;
use siidte_keys::{CafPool, EnvelopeCertificate};
use siidte_xml::{document_scope, Element, Encoding, Node, Scope, XmlDocument};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::dte::{DocumentParts, DteResigner};
use crate::envelope::{is_payload, Envelope};
use crate::prompt::{FolioPrompt, KeepFolio};
use crate::rewrite::{normalize_exports, DocumentKey, DocumentRewrite, FieldRewriter};
use crate::setdte::{count_types, recount_subtotals, SetDteResigner, SubtotalDivergence};
use crate::strip::{strip, StripCounts};
use crate::ted::{CafCheck, TedResigner};

/// Default distance of FchVenc from the emission date.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// What to do with a folio outside its CAF's authorized range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FolioPolicy {
    /// Sign anyway.
    #[default]
    Lax,
    /// Fail with [`Error::FolioOutOfRange`] before signing.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResignOptions {
    /// Ask a [`FolioPrompt`] for each document's folio.
    pub interactive: bool,
    pub folio_policy: FolioPolicy,
    /// Replace a DD's embedded CAF when it does not carry the pool key.
    pub replace_dd_caf: bool,
    pub due_days: i64,
}

impl Default for ResignOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            folio_policy: FolioPolicy::Lax,
            replace_dd_caf: false,
            due_days: DEFAULT_DUE_DAYS,
        }
    }
}

/// Per-document outcome of a re-sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResignedDocument {
    pub rewrite: DocumentRewrite,
    pub caf: CafCheck,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResignReport {
    pub stripped: StripCounts,
    pub documents: Vec<ResignedDocument>,
    /// Output `SubTotDTE` lines: `(TipoDTE, NroDTE)`.
    pub subtotals: Vec<(String, u64)>,
    pub divergences: Vec<SubtotalDivergence>,
}

/// Everything one re-sign needs besides the envelope.
pub struct Resigner<'a> {
    pool: &'a CafPool,
    certificate: &'a EnvelopeCertificate,
    clock: &'a dyn Clock,
    options: ResignOptions,
}

impl<'a> Resigner<'a> {
    pub fn new(pool: &'a CafPool, certificate: &'a EnvelopeCertificate, clock: &'a dyn Clock, options: ResignOptions) -> Self {
        Self { pool, certificate, clock, options }
    }

    /// Re-sign envelope bytes. The prompt is only consulted in interactive
    /// mode.
    pub fn resign(&self, input: &[u8], prompt: &mut dyn FolioPrompt) -> Result<(Vec<u8>, ResignReport), Error> {
        let mut envelope = Envelope::parse(input)?;
        let renamed = normalize_exports(&mut envelope.root);
        if renamed > 0 {
            debug!(renamed, "renamed Exportaciones to Documento");
        }
        let stripped = strip(&mut envelope)?;
        if envelope.encoding != Encoding::Latin1 {
            debug!(encoding = ?envelope.encoding, "input is not ISO-8859-1; output will be");
        }

        let ctx = DsigContext::new(self.certificate);
        let rewriter = FieldRewriter::new(self.clock.today(), self.options.due_days);
        let ted_resigner = TedResigner::new(self.pool, self.clock).replace_dd_caf(self.options.replace_dd_caf);
        let dte_resigner = DteResigner::new(ctx, self.clock);
        let set_resigner = SetDteResigner::new(ctx, self.clock, envelope.kind);

        let mut parsed_set = take_set(&mut envelope)?;
        let mut caratula = parsed_set
            .take_child(ns::SII_DTE, ns::node::CARATULA)
            .ok_or_else(|| Error::MalformedEnvelope("missing Caratula".into()))?;
        let root = set_resigner.envelope_root(&envelope.root);
        let set = set_resigner.set_element(&parsed_set);
        let set_scope = set.scope(&root.scope(&document_scope()));

        let mut report = ResignReport { stripped, ..ResignReport::default() };
        let mut signed = Vec::new();
        for wrapper in parsed_set.take_children(|e| e.is(ns::SII_DTE, ns::node::DTE)) {
            let (dte, doc) = self.resign_dte(wrapper, &set_scope, &rewriter, &ted_resigner, &dte_resigner, prompt)?;
            info!(id = %doc.rewrite.id, old_folio = doc.rewrite.old_folio, folio = doc.rewrite.new_folio, "re-signed DTE");
            report.documents.push(doc);
            signed.push(dte);
        }

        report.subtotals = count_types(&signed);
        report.divergences = recount_subtotals(&mut caratula, &report.subtotals);

        let root = set_resigner.resign(root, set, caratula, signed)?;
        let bytes = XmlDocument { root, encoding: Encoding::Latin1 }.to_latin1_bytes();
        info!(documents = report.documents.len(), bytes = bytes.len(), "envelope re-signed");
        Ok((bytes, report))
    }

    fn resign_dte(
        &self,
        mut wrapper: Element,
        set_scope: &Scope,
        rewriter: &FieldRewriter,
        ted_resigner: &TedResigner<'_>,
        dte_resigner: &DteResigner<'_>,
        prompt: &mut dyn FolioPrompt,
    ) -> Result<(Element, ResignedDocument), Error> {
        let position = wrapper
            .children
            .iter()
            .position(|n| n.as_element().is_some_and(is_payload))
            .ok_or_else(|| Error::MalformedEnvelope("DTE contains neither Documento nor Exportaciones".into()))?;
        let Node::Element(mut documento) = wrapper.children.remove(position) else {
            return Err(Error::MalformedEnvelope("DTE payload is not an element".into()));
        };

        let key = DocumentKey::read(&documento)?;
        let new_folio = if self.options.interactive {
            let id = documento.attribute(ns::attr::ID).map_or_else(|| key.id(), str::to_owned);
            prompt.ask(&id, key.tipo, key.folio)?
        } else {
            None
        };
        if self.options.folio_policy == FolioPolicy::Strict {
            self.pool.check_folio(key.tipo, new_folio.unwrap_or(key.folio))?;
        }

        let rewrite = rewriter.rewrite(&mut documento, new_folio)?;
        let (parts, dd) = DocumentParts::extract(documento)?;
        let (ted, caf) = ted_resigner.resign(dd)?;
        let dte = dte_resigner.resign(parts, ted, &wrapper, set_scope)?;
        Ok((dte, ResignedDocument { rewrite, caf }))
    }

    /// Read `input`, re-sign it and write `output`. The output file is
    /// only created once signing has succeeded.
    pub fn resign_file(&self, input: &Path, output: &Path, prompt: &mut dyn FolioPrompt) -> Result<ResignReport, Error> {
        let bytes = std::fs::read(input)?;
        let (signed, report) = self.resign(&bytes, prompt)?;
        std::fs::write(output, signed)?;
        info!(input = %input.display(), output = %output.display(), "wrote re-signed envelope");
        Ok(report)
    }
}

/// Detach the set element from the root, leaving the root's other children.
fn take_set(envelope: &mut Envelope) -> Result<Element, Error> {
    let name = envelope.kind.set;
    envelope
        .root
        .take_child(ns::SII_DTE, name)
        .ok_or_else(|| Error::MalformedEnvelope(format!("missing {name}")))
}

/// One envelope of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResignJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Re-sign independent envelopes on scoped worker threads, sharing the
/// pool and certificate. Folios are never prompted for. Results are in
/// job order.
pub fn resign_batch(
    jobs: &[ResignJob],
    pool: &CafPool,
    certificate: &EnvelopeCertificate,
    clock: &dyn Clock,
    options: ResignOptions,
) -> Vec<Result<ResignReport, Error>> {
    let options = ResignOptions { interactive: false, ..options };
    let workers = std::thread::available_parallelism().map_or(1, |n| n.get()).min(jobs.len().max(1));
    let chunk = jobs.len().div_ceil(workers).max(1);

    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(chunk)
            .map(|batch| {
                let handle = scope.spawn(move || {
                    let resigner = Resigner::new(pool, certificate, clock, options);
                    batch
                        .iter()
                        .map(|job| resigner.resign_file(&job.input, &job.output, &mut KeepFolio))
                        .collect::<Vec<_>>()
                });
                (batch.len(), handle)
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|(len, handle)| match handle.join() {
                Ok(results) => results,
                Err(_) => (0..len)
                    .map(|_| Err(Error::Signing("batch worker panicked".into())))
                    .collect(),
            })
            .collect()
    })
}
