mod common;

use common::*;
use pretty_assertions::assert_eq;
use siidte_core::{Error, VerifyFailure};
use siidte_dte::strip::{strip_dte_signatures, strip_set_signatures};
use siidte_dte::verify::report;
use siidte_dte::{verify_envelope, DocumentState, Envelope};
use siidte_xml::encoding::{decode_latin1, encode_latin1};

/// Replace the first occurrence of `from` in the written envelope.
fn tamper(bytes: &[u8], from: &str, to: &str) -> Vec<u8> {
    let text = decode_latin1(bytes);
    assert!(text.contains(from), "{from} not in envelope");
    encode_latin1(&text.replacen(from, to, 1))
}

fn failure(bytes: &[u8]) -> VerifyFailure {
    verify_envelope(bytes).unwrap_err().verify_failure().unwrap()
}

#[test]
fn test_resigned_envelopes_verify() {
    for name in ["envio_33.xml", "envio_multi.xml", "envio_export_110.xml"] {
        let (bytes, _) = resign(name);
        let verified = verify_envelope(&bytes).unwrap();
        assert!(verified.documents.iter().all(|d| d.state == DocumentState::SetDteSigOk), "{name}");
        assert_eq!(verified.set_signature, Some(Ok(())));
    }
}

#[test]
fn test_tampered_dd_breaks_frmt() {
    let (bytes, _) = resign("envio_33.xml");
    // The DD's RE comes before the CAF's own RE.
    let tampered = tamper(&bytes, "<RE>76543210-3</RE>", "<RE>11111111-1</RE>");
    assert_eq!(failure(&tampered), VerifyFailure::FrmtMismatch);

    let envelope = Envelope::parse(&tampered).unwrap();
    let report = report(&envelope).unwrap();
    assert_eq!(
        report.documents[0].state,
        DocumentState::Rejected(VerifyFailure::FrmtMismatch)
    );
}

#[test]
fn test_tampered_amount_breaks_digest() {
    let (bytes, _) = resign("envio_33.xml");
    let tampered = tamper(&bytes, "<MntTotal>24430</MntTotal>", "<MntTotal>24431</MntTotal>");

    let envelope = Envelope::parse(&tampered).unwrap();
    let report = report(&envelope).unwrap();
    // The DD still carries the old amount, so only the XMLDSig layers fail.
    assert_eq!(
        report.documents[0].state,
        DocumentState::Rejected(VerifyFailure::DigestMismatch)
    );
    assert!(matches!(
        report.set_signature,
        Some(Err((VerifyFailure::DigestMismatch, _)))
    ));
    assert_eq!(failure(&tampered), VerifyFailure::DigestMismatch);
}

#[test]
fn test_tampering_later_document_keeps_earlier_ones() {
    let (bytes, _) = resign("envio_multi.xml");
    let text = decode_latin1(&bytes);
    let start = text.find("ID=\"F12T61\"").unwrap();
    let offset = text[start..].find("<MntTotal>").unwrap() + start;
    let mut tampered = text.clone();
    tampered.replace_range(offset..offset + "<MntTotal>".len() + 1, "<MntTotal>9");

    let envelope = Envelope::parse(&encode_latin1(&tampered)).unwrap();
    let states: Vec<DocumentState> = report(&envelope).unwrap().documents.into_iter().map(|d| d.state).collect();
    assert_eq!(
        states,
        [
            DocumentState::DteSigOk,
            DocumentState::DteSigOk,
            DocumentState::Rejected(VerifyFailure::DigestMismatch),
        ]
    );
}

/// Replace the content of the first `<tag>` with text that is not base64.
fn corrupt_first(bytes: &[u8], tag: &str) -> Vec<u8> {
    let text = decode_latin1(bytes);
    let start = text.find(&format!("<{tag}>")).unwrap() + tag.len() + 2;
    let end = start + text[start..].find(&format!("</{tag}>")).unwrap();
    let mut corrupted = text.clone();
    corrupted.replace_range(start..end, "@@not-base64@@");
    encode_latin1(&corrupted)
}

#[test]
fn test_undecodable_signature_parts_are_rejected() {
    let (bytes, _) = resign("envio_33.xml");
    let cases = [
        ("DigestValue", VerifyFailure::DigestMismatch),
        ("SignatureValue", VerifyFailure::SigvalueMismatch),
        ("X509Certificate", VerifyFailure::SigvalueMismatch),
    ];
    for (tag, expected) in cases {
        let corrupted = corrupt_first(&bytes, tag);

        let envelope = Envelope::parse(&corrupted).unwrap();
        let report = report(&envelope).unwrap();
        assert_eq!(report.documents[0].state, DocumentState::Rejected(expected), "{tag}");

        let err = verify_envelope(&corrupted).unwrap_err();
        assert_eq!(err.verify_failure(), Some(expected), "{tag}: {err}");
        assert_eq!(err.exit_code(), 1);
    }
}

#[test]
fn test_frmt_algorithm_is_checked() {
    let (bytes, _) = resign("envio_33.xml");
    let tampered = tamper(&bytes, "algoritmo=\"SHA1withRSA\"", "algoritmo=\"SHA256withRSA\"");
    let envelope = Envelope::parse(&tampered).unwrap();
    assert_eq!(
        report(&envelope).unwrap().documents[0].state,
        DocumentState::Rejected(VerifyFailure::FrmtMismatch)
    );
}

#[test]
fn test_set_id_is_checked() {
    let (bytes, _) = resign("envio_33.xml");
    let mut envelope = Envelope::parse(&bytes).unwrap();
    envelope.set_mut().unwrap().set_attribute("ID", "OtherSet");
    let report = report(&envelope).unwrap();
    assert!(matches!(report.set_signature, Some(Err((VerifyFailure::UnknownId, _)))));
    assert!(!report.is_ok());
}

#[test]
fn test_missing_signatures() {
    let (bytes, _) = resign("envio_33.xml");

    let mut envelope = Envelope::parse(&bytes).unwrap();
    assert_eq!(strip_set_signatures(&mut envelope).unwrap(), 1);
    let report_without_set = report(&envelope).unwrap();
    assert_eq!(report_without_set.documents[0].state, DocumentState::DteSigOk);
    assert!(matches!(
        report_without_set.set_signature,
        Some(Err((VerifyFailure::MissingSignature, _)))
    ));

    let mut envelope = Envelope::parse(&bytes).unwrap();
    assert_eq!(strip_dte_signatures(envelope.set_mut().unwrap()), 1);
    let report_without_dte = report(&envelope).unwrap();
    assert_eq!(
        report_without_dte.documents[0].state,
        DocumentState::Rejected(VerifyFailure::MissingSignature)
    );
    assert!(!report_without_dte.is_ok());
}

#[test]
fn test_verify_reports_parse_errors() {
    assert!(matches!(verify_envelope(b"<EnvioDTE"), Err(Error::XmlParse(_))));
}
