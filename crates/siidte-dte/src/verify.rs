#![forbid(unsafe_code)]

//! Envelope verifier.
//!
//! Checks the three signature layers of a re-signed envelope using only
//! what the envelope itself carries: the CAF public key inside each DD
//! and the certificate inside each `KeyInfo`.

use siidte_core::{algorithm, ns, ns::node, Error, VerifyFailure};
use siidte_crypto::encoding::{b64_decode, rsa_public_from_b64};
use siidte_xml::{Element, Scope};
use tracing::{debug, info};

use crate::envelope::{payload_of, Envelope};

/// How far a document got through verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unverified,
    /// The TED's FRMT verifies.
    TedOk,
    /// The Documento's XMLDSig verifies as well.
    DteSigOk,
    /// And so does the signature over the whole set.
    SetDteSigOk,
    Rejected(VerifyFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub id: String,
    pub state: DocumentState,
    /// Why the document was rejected, when it was.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub documents: Vec<DocumentReport>,
    /// `None` while unchecked, `Some(Ok)` once the set signature verifies.
    pub set_signature: Option<Result<(), (VerifyFailure, String)>>,
}

impl VerifyReport {
    /// Every document reached `SetDteSigOk`.
    pub fn is_ok(&self) -> bool {
        self.documents.iter().all(|d| d.state == DocumentState::SetDteSigOk)
            && matches!(self.set_signature, Some(Ok(())))
    }

    /// The first failure, in document order, as an error.
    pub fn into_result(self) -> Result<Self, Error> {
        for doc in &self.documents {
            if let DocumentState::Rejected(reason) = doc.state {
                let detail = doc.detail.clone().unwrap_or_default();
                return Err(Error::verification(reason, format!("{}: {detail}", doc.id)));
            }
        }
        match &self.set_signature {
            Some(Ok(())) => Ok(self),
            Some(Err((reason, detail))) => Err(Error::verification(*reason, detail.clone())),
            None => Err(Error::verification(VerifyFailure::MissingSignature, "set signature not checked")),
        }
    }
}

/// Verify envelope bytes, failing on the first rejected layer.
pub fn verify_envelope(bytes: &[u8]) -> Result<VerifyReport, Error> {
    let envelope = Envelope::parse(bytes)?;
    report(&envelope)?.into_result()
}

/// Verify every layer and record the outcome instead of stopping at the
/// first failure. Structural problems (missing SignedInfo, unsupported
/// algorithms) are still errors; corrupted signature values reject the
/// document.
pub fn report(envelope: &Envelope) -> Result<VerifyReport, Error> {
    let root_scope = envelope.root_scope();
    let set = envelope.set()?;
    let set_scope = set.scope(&root_scope);

    let mut documents = Vec::new();
    for wrapper in envelope.dte_wrappers()? {
        let Some(documento) = payload_of(wrapper) else { continue };
        let id = documento.attribute(ns::attr::ID).unwrap_or_default().to_owned();
        let mut doc = DocumentReport { id, state: DocumentState::Unverified, detail: None };

        match check_ted(documento)
            .and_then(|()| {
                doc.state = DocumentState::TedOk;
                check_dte_signature(wrapper, documento, &set_scope)
            })
        {
            Ok(()) => doc.state = DocumentState::DteSigOk,
            Err(Error::VerificationFailed { reason, detail }) => {
                doc.state = DocumentState::Rejected(reason);
                doc.detail = Some(detail);
            }
            Err(e) => return Err(e),
        }
        debug!(id = %doc.id, state = ?doc.state, "document verified");
        documents.push(doc);
    }

    let set_signature = match check_set_signature(envelope, set, &root_scope) {
        Ok(()) => Ok(()),
        Err(Error::VerificationFailed { reason, detail }) => Err((reason, detail)),
        Err(e) => return Err(e),
    };
    if set_signature.is_ok() {
        for doc in documents.iter_mut().filter(|d| d.state == DocumentState::DteSigOk) {
            doc.state = DocumentState::SetDteSigOk;
        }
    }

    let report = VerifyReport { documents, set_signature: Some(set_signature) };
    info!(documents = report.documents.len(), ok = report.is_ok(), "envelope verification finished");
    Ok(report)
}

/// FRMT over the flattened DD, against the RSAPK embedded in the DD.
pub fn check_ted(documento: &Element) -> Result<(), Error> {
    let id = documento.attribute(ns::attr::ID).unwrap_or_default();
    let frmt_failure = |detail: String| Error::verification(VerifyFailure::FrmtMismatch, detail);

    let ted = documento
        .child(ns::SII_DTE, node::TED)
        .ok_or_else(|| Error::verification(VerifyFailure::MissingSignature, format!("{id} has no TED")))?;
    let dd = ted
        .child(ns::SII_DTE, node::DD)
        .ok_or_else(|| Error::MalformedEnvelope(format!("{id}: TED has no DD")))?;
    let frmt = ted
        .child(ns::SII_DTE, node::FRMT)
        .ok_or_else(|| Error::verification(VerifyFailure::MissingSignature, format!("{id}: TED has no FRMT")))?;
    match frmt.attribute(ns::attr::ALGORITMO) {
        Some(algorithm::FRMT_ALGORITHM) => {}
        other => return Err(frmt_failure(format!("{id}: FRMT algoritmo is {other:?}"))),
    }

    let pk = dd
        .path(ns::SII_DTE, &[node::CAF, node::DA, node::RSAPK])
        .ok_or_else(|| frmt_failure(format!("{id}: DD has no CAF/DA/RSAPK")))?;
    let part = |name: &str| {
        pk.child_text(ns::SII_DTE, name)
            .ok_or_else(|| frmt_failure(format!("{id}: RSAPK has no {name}")))
    };
    let key = rsa_public_from_b64(&part(node::RSAPK_M)?, &part(node::RSAPK_E)?)
        .map_err(|e| frmt_failure(format!("{id}: RSAPK is not a usable key: {e}")))?;

    let signature = b64_decode(&frmt.text()).map_err(|e| frmt_failure(format!("{id}: FRMT: {e}")))?;
    let payload = siidte_c14n::flatten(dd);
    if siidte_crypto::sign::rsa_sha1_verify(&key, &payload, &signature)? {
        Ok(())
    } else {
        Err(frmt_failure(format!("{id}: FRMT does not verify over the flattened DD")))
    }
}

/// The `Signature` next to the Documento inside its DTE wrapper.
pub fn check_dte_signature(wrapper: &Element, documento: &Element, set_scope: &Scope) -> Result<(), Error> {
    let scope = wrapper.scope(set_scope);
    let signature = wrapper.child(ns::DSIG, node::SIGNATURE).ok_or_else(|| {
        Error::verification(
            VerifyFailure::MissingSignature,
            format!("{} has no signature", documento.attribute(ns::attr::ID).unwrap_or_default()),
        )
    })?;
    siidte_dsig::verify_sibling(signature, documento, &scope)
}

/// The `Signature` next to the set inside the root.
pub fn check_set_signature(envelope: &Envelope, set: &Element, root_scope: &Scope) -> Result<(), Error> {
    let signature = envelope.root.child(ns::DSIG, node::SIGNATURE).ok_or_else(|| {
        Error::verification(VerifyFailure::MissingSignature, format!("{} has no signature", envelope.kind.set))
    })?;
    let set_id = set.attribute(ns::attr::ID).unwrap_or_default();
    if set_id != envelope.kind.set_id {
        return Err(Error::verification(
            VerifyFailure::UnknownId,
            format!("{} ID is {set_id:?}, expected {:?}", envelope.kind.set, envelope.kind.set_id),
        ));
    }
    siidte_dsig::verify_sibling(signature, set, root_scope)
}
