#![forbid(unsafe_code)]

//! Base64 text as it appears in SII XML, and RSA key parts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use siidte_core::Error;

/// Standard base64 with padding, on one line.
pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 that may be wrapped or indented inside an element.
pub fn b64_decode(text: &str) -> Result<Vec<u8>, Error> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::Base64(e.to_string()))
}

/// Split base64 text into lines of at most `width` characters.
pub fn wrap_lines(b64: &str, width: usize) -> String {
    let mut out = String::with_capacity(b64.len() + b64.len() / width.max(1) + 1);
    for (i, chunk) in b64.as_bytes().chunks(width.max(1)).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // base64 output is ASCII, so every chunk is valid UTF-8.
        out.push_str(&String::from_utf8_lossy(chunk));
    }
    out
}

/// Modulus and public exponent as big-endian base64, the form used by
/// `RSAKeyValue` and by the CAF `RSAPK/M` and `RSAPK/E` elements.
pub fn rsa_public_parts_b64(key: &RsaPublicKey) -> (String, String) {
    (
        b64_encode(&key.n().to_bytes_be()),
        b64_encode(&key.e().to_bytes_be()),
    )
}

/// Rebuild an RSA public key from base64 modulus and exponent.
pub fn rsa_public_from_b64(modulus: &str, exponent: &str) -> Result<RsaPublicKey, Error> {
    let n = BigUint::from_bytes_be(&b64_decode(modulus)?);
    let e = BigUint::from_bytes_be(&b64_decode(exponent)?);
    RsaPublicKey::new(n, e).map_err(|e| Error::Signing(format!("invalid RSA public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_layout_whitespace() {
        assert_eq!(b64_decode("  aGVs\n\tbG8=\n").unwrap(), b"hello");
        assert!(matches!(b64_decode("***"), Err(Error::Base64(_))));
    }

    #[test]
    fn test_wrap_lines() {
        let text = "A".repeat(130);
        let wrapped = wrap_lines(&text, 64);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 64);
        assert_eq!(lines[2].len(), 2);
    }

    #[test]
    fn test_exponent_encoding() {
        let n = BigUint::from_bytes_be(&[0xC5; 128]);
        let key = RsaPublicKey::new(n, BigUint::from(65537u32)).unwrap();
        let (m, e) = rsa_public_parts_b64(&key);
        assert_eq!(e, "AQAB");
        let back = rsa_public_from_b64(&m, &e).unwrap();
        assert_eq!(back, key);
    }
}
