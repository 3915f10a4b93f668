#![forbid(unsafe_code)]

//! XML-DSig signature creation.
//!
//! Builds a complete `<Signature>` for an element that carries an `ID`
//! attribute. The caller places it as that element's next sibling.

use crate::context::DsigContext;
use siidte_core::{ns, ns::node, Error};
use siidte_crypto::{digest, encoding::b64_encode, SignatureMethod};
use siidte_xml::{indent, Element, Scope};
use tracing::debug;

/// Sign `target`, which sees the namespace scope `inherited` from its
/// ancestors. The returned Signature is indented for nesting depth
/// `level`, which must be the depth `target` itself sits at, and is
/// signed in that exact layout.
pub fn sign_sibling(
    ctx: &DsigContext<'_>,
    target: &Element,
    inherited: &Scope,
    level: usize,
) -> Result<Element, Error> {
    let id = target.attribute(ns::attr::ID).ok_or_else(|| {
        Error::MalformedEnvelope(format!("<{}> to be signed has no ID attribute", target.name))
    })?;

    let c14n_target = siidte_c14n::canonicalize(target, inherited, ctx.c14n_mode);
    let digest_value = b64_encode(&digest::digest(ctx.digest_uri, &c14n_target)?);
    debug!(id, bytes = c14n_target.len(), digest = %digest_value, "digested signed element");

    let mut signature = Element::new_with_default_ns(ns::DSIG, node::SIGNATURE);
    signature.push_element(signed_info(ctx, id, &digest_value));
    signature.push_element(Element::with_text(ns::DSIG, node::SIGNATURE_VALUE, ""));
    signature.push_element(siidte_keys::keyinfo::build_key_info(ctx.certificate));
    indent(&mut signature, level);

    // SignedInfo is canonicalized where it will live: under the Signature,
    // whose own declarations extend the sibling's scope.
    let signature_scope = signature.scope(inherited);
    let signed_info = signature
        .child(ns::DSIG, node::SIGNED_INFO)
        .ok_or_else(|| Error::Signing("SignedInfo vanished".into()))?;
    let c14n_si = siidte_c14n::canonicalize(signed_info, &signature_scope, ctx.c14n_mode);

    let method = SignatureMethod::from_uri(ctx.signature_uri)?;
    let value = b64_encode(&method.sign(ctx.certificate.private_key(), &c14n_si)?);

    signature
        .child_mut(ns::DSIG, node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::Signing("SignatureValue vanished".into()))?
        .set_text(&value);
    Ok(signature)
}

fn signed_info(ctx: &DsigContext<'_>, id: &str, digest_value: &str) -> Element {
    let algorithm = |name: &str, uri: &str| {
        let mut el = Element::new(ns::DSIG, name);
        el.set_attribute(ns::attr::ALGORITHM, uri);
        el
    };

    let mut reference = Element::new(ns::DSIG, node::REFERENCE);
    reference.set_attribute(ns::attr::URI, &format!("#{id}"));
    reference.push_element(algorithm(node::DIGEST_METHOD, ctx.digest_uri));
    reference.push_element(Element::with_text(ns::DSIG, node::DIGEST_VALUE, digest_value));

    let mut si = Element::new(ns::DSIG, node::SIGNED_INFO);
    si.push_element(algorithm(node::CANONICALIZATION_METHOD, ctx.c14n_mode.uri()));
    si.push_element(algorithm(node::SIGNATURE_METHOD, ctx.signature_uri));
    si.push_element(reference);
    si
}
