#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Read `<SignedInfo>`: CanonicalizationMethod, SignatureMethod
//! 2. Check the single `<Reference>` points at the signed sibling
//! 3. Canonicalize the sibling, digest it, compare with `DigestValue`
//! 4. Resolve the public key from `<KeyInfo>`
//! 5. Canonicalize `<SignedInfo>` and check `<SignatureValue>`

use siidte_c14n::C14nMode;
use siidte_core::{algorithm, ns, ns::node, Error, VerifyFailure};
use siidte_crypto::{digest, encoding::b64_decode, SignatureMethod};
use siidte_xml::{Element, Scope};
use tracing::debug;

/// Verify `signature` against the element it signs.
///
/// Both elements are siblings, so they share the inherited scope
/// `inherited`. Failures are reported as [`Error::VerificationFailed`]
/// with the reason of the first check that did not hold.
pub fn verify_sibling(signature: &Element, target: &Element, inherited: &Scope) -> Result<(), Error> {
    let signed_info = required(signature, node::SIGNED_INFO)?;

    let c14n_uri = algorithm_of(required(signed_info, node::CANONICALIZATION_METHOD)?)?;
    let c14n_mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let method = SignatureMethod::from_uri(algorithm_of(required(signed_info, node::SIGNATURE_METHOD)?)?)?;

    // 2. Reference
    let reference = required(signed_info, node::REFERENCE)?;
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");
    let target_id = target.attribute(ns::attr::ID).unwrap_or("");
    if target_id.is_empty() || uri.strip_prefix('#') != Some(target_id) {
        return Err(Error::verification(
            VerifyFailure::UnknownId,
            format!("Reference URI {uri:?} does not name <{} ID={target_id:?}>", target.name),
        ));
    }
    if let Some(transforms) = reference.child(ns::DSIG, node::TRANSFORMS) {
        check_transforms(transforms)?;
    }

    // 3. Digest
    let digest_uri = algorithm_of(required(reference, node::DIGEST_METHOD)?)?;
    let expected = b64_decode(&required(reference, node::DIGEST_VALUE)?.text())
        .map_err(|e| Error::verification(VerifyFailure::DigestMismatch, format!("DigestValue of #{target_id}: {e}")))?;
    let computed = digest::digest(digest_uri, &siidte_c14n::canonicalize(target, inherited, c14n_mode))?;
    if computed != expected {
        return Err(Error::verification(
            VerifyFailure::DigestMismatch,
            format!("digest of #{target_id} does not match DigestValue"),
        ));
    }

    // 4. Key
    let public_key = siidte_keys::keyinfo::extract_public_key(required(signature, node::KEY_INFO)?)
        .map_err(|e| Error::verification(VerifyFailure::SigvalueMismatch, format!("KeyInfo of #{target_id}: {e}")))?;

    // 5. SignatureValue
    let c14n_si = siidte_c14n::canonicalize(signed_info, &signature.scope(inherited), c14n_mode);
    let value = b64_decode(&required(signature, node::SIGNATURE_VALUE)?.text())
        .map_err(|e| Error::verification(VerifyFailure::SigvalueMismatch, format!("SignatureValue of #{target_id}: {e}")))?;
    if !method.verify(&public_key, &c14n_si, &value)? {
        return Err(Error::verification(
            VerifyFailure::SigvalueMismatch,
            format!("SignatureValue over SignedInfo for #{target_id} does not verify"),
        ));
    }

    debug!(id = target_id, "signature verified");
    Ok(())
}

/// A Reference may list Transforms, but with the signature outside the
/// signed element only the identity-like ones make sense: C14N (applied
/// anyway) and enveloped-signature (nothing to remove).
fn check_transforms(transforms: &Element) -> Result<(), Error> {
    for transform in transforms.children_named(ns::DSIG, node::TRANSFORM) {
        match algorithm_of(transform)? {
            algorithm::C14N | algorithm::ENVELOPED_SIGNATURE => {}
            other => return Err(Error::UnsupportedAlgorithm(format!("transform: {other}"))),
        }
    }
    Ok(())
}

fn required<'a>(parent: &'a Element, name: &str) -> Result<&'a Element, Error> {
    parent
        .child(ns::DSIG, name)
        .ok_or_else(|| Error::MalformedEnvelope(format!("<{}> has no <{name}>", parent.name)))
}

fn algorithm_of(el: &Element) -> Result<&str, Error> {
    el.attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MalformedEnvelope(format!("<{}> has no Algorithm", el.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sign_sibling, DsigContext};
    use siidte_keys::EnvelopeCertificate;
    use siidte_xml::{document_scope, XmlDocument};
    use std::path::PathBuf;

    const SIGNED: &str = r#"<R xmlns="urn:r" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><Doc ID="D1"><A>uno</A></Doc></R>"#;

    fn cert() -> EnvelopeCertificate {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../test-data/certs/envelope.pfx");
        EnvelopeCertificate::load_pfx(&path, "secret123").unwrap()
    }

    /// `<R>` with `<Doc>` followed by its signature, serialized and reparsed.
    fn signed_root(cert: &EnvelopeCertificate) -> Element {
        let mut root = XmlDocument::parse_str(SIGNED).unwrap().root;
        let scope = root.scope(&document_scope());
        let sig = sign_sibling(&DsigContext::new(cert), root.child("urn:r", "Doc").unwrap(), &scope, 1).unwrap();
        root.push_element(sig);
        siidte_xml::indent(&mut root, 0);
        let text = siidte_xml::writer::element_to_string(&root);
        XmlDocument::parse_str(&text).unwrap().root
    }

    fn check(root: &Element) -> Result<(), Error> {
        let scope = root.scope(&document_scope());
        verify_sibling(
            root.child(ns::DSIG, node::SIGNATURE).unwrap(),
            root.child("urn:r", "Doc").unwrap(),
            &scope,
        )
    }

    fn reason(result: Result<(), Error>) -> VerifyFailure {
        result.unwrap_err().verify_failure().unwrap()
    }

    #[test]
    fn test_round_trip_verifies() {
        let root = signed_root(&cert());
        check(&root).unwrap();
    }

    #[test]
    fn test_tampered_content() {
        let mut root = signed_root(&cert());
        root.path_mut("urn:r", &["Doc", "A"]).unwrap().set_text("dos");
        assert_eq!(reason(check(&root)), VerifyFailure::DigestMismatch);
    }

    #[test]
    fn test_tampered_signature_value() {
        let mut root = signed_root(&cert());
        let value = root
            .path_mut(ns::DSIG, &[node::SIGNATURE, node::SIGNATURE_VALUE])
            .unwrap();
        let mut bytes = b64_decode(&value.text()).unwrap();
        bytes[10] ^= 0x01;
        value.set_text(&siidte_crypto::encoding::b64_encode(&bytes));
        assert_eq!(reason(check(&root)), VerifyFailure::SigvalueMismatch);
    }

    #[test]
    fn test_undecodable_values_are_verification_failures() {
        let cases = [
            (node::DIGEST_VALUE, VerifyFailure::DigestMismatch),
            (node::SIGNATURE_VALUE, VerifyFailure::SigvalueMismatch),
            (node::X509_CERTIFICATE, VerifyFailure::SigvalueMismatch),
        ];
        for (name, expected) in cases {
            let mut root = signed_root(&cert());
            root.walk_mut(&mut |e: &mut Element| {
                if e.is(ns::DSIG, name) {
                    e.set_text("@@not-base64@@");
                }
            });
            let err = check(&root).unwrap_err();
            assert_eq!(err.verify_failure(), Some(expected), "{name}: {err}");
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn test_key_info_without_key() {
        let mut root = signed_root(&cert());
        let key_info = root.path_mut(ns::DSIG, &[node::SIGNATURE, node::KEY_INFO]).unwrap();
        key_info.take_children(|_| true);
        assert_eq!(reason(check(&root)), VerifyFailure::SigvalueMismatch);
    }

    #[test]
    fn test_reference_to_other_id() {
        let mut root = signed_root(&cert());
        root.child_mut("urn:r", "Doc").unwrap().set_attribute("ID", "D2");
        assert_eq!(reason(check(&root)), VerifyFailure::UnknownId);
    }

    #[test]
    fn test_enveloped_transform_accepted() {
        let root = signed_root(&cert());
        let text = siidte_xml::writer::element_to_string(&root).replace(
            "<DigestMethod",
            r#"<Transforms><Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/></Transforms><DigestMethod"#,
        );
        let root = XmlDocument::parse_str(&text).unwrap().root;
        // SignedInfo changed, so only the SignatureValue check fails.
        assert_eq!(reason(check(&root)), VerifyFailure::SigvalueMismatch);
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let root = signed_root(&cert());
        let text = siidte_xml::writer::element_to_string(&root).replace(
            "<DigestMethod",
            r#"<Transforms><Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116"/></Transforms><DigestMethod"#,
        );
        let root = XmlDocument::parse_str(&text).unwrap().root;
        assert!(matches!(check(&root), Err(Error::UnsupportedAlgorithm(_))));
    }
}
