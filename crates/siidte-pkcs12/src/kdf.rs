#![forbid(unsafe_code)]

//! Key derivation, MAC and content decryption for PKCS#12.
//!
//! The RFC 7292 appendix B derivation feeds the integrity MAC and the
//! legacy 3DES scheme; PBES2 goes through PBKDF2.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::digest::{Digest, FixedOutputReset};
use sha2::Sha256;
use siidte_core::Error;

/// Diversifier byte of the appendix B derivation.
#[derive(Debug, Clone, Copy)]
pub enum Purpose {
    Key = 1,
    Iv = 2,
    Mac = 3,
}

/// Hash used by the integrity MAC (and its key derivation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacHash {
    Sha1,
    Sha256,
}

/// PRF of a PBKDF2 parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
}

/// Appendix B block size in bytes, the same for SHA-1 and SHA-256.
const V: usize = 64;

/// RFC 7292 appendix B derivation over a BMP-encoded password.
pub fn derive<D>(purpose: Purpose, bmp_password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Vec<u8>
where
    D: Digest + FixedOutputReset,
{
    let u = <D as Digest>::output_size();
    let diversifier = [purpose as u8; V];

    let mut input = repeat_to_block(salt);
    input.extend_from_slice(&repeat_to_block(bmp_password));

    let mut out = Vec::with_capacity(len + u);
    let mut hasher = D::new();
    while out.len() < len {
        Digest::update(&mut hasher, diversifier);
        Digest::update(&mut hasher, &input);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        out.extend_from_slice(&a);
        if out.len() >= len {
            break;
        }
        let b: Vec<u8> = a.iter().copied().cycle().take(V).collect();
        for block in input.chunks_mut(V) {
            add_with_carry(block, &b);
        }
    }
    out.truncate(len);
    out
}

/// Repeat `data` up to the next multiple of the block size.
fn repeat_to_block(data: &[u8]) -> Vec<u8> {
    let len = data.len().div_ceil(V) * V;
    data.iter().copied().cycle().take(len).collect()
}

/// `block = (block + b + 1) mod 2^(8*V)`, big-endian.
fn add_with_carry(block: &mut [u8], b: &[u8]) {
    let mut carry = 1u16;
    for (x, y) in block.iter_mut().rev().zip(b.iter().rev()) {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = (sum & 0xff) as u8;
        carry = sum >> 8;
    }
}

/// UTF-16BE with a two-byte terminator. The empty password stays empty.
pub fn bmp_password(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    password
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_be_bytes)
        .collect()
}

impl MacHash {
    /// Derive the MAC key from the password and HMAC `data` with it.
    pub fn mac(self, bmp: &[u8], salt: &[u8], iterations: u32, data: &[u8]) -> Result<Vec<u8>, Error> {
        let bad_key = |e: hmac::digest::InvalidLength| Error::CertLoad(format!("PKCS#12 MAC key: {e}"));
        match self {
            Self::Sha1 => {
                let key = derive::<Sha1>(Purpose::Mac, bmp, salt, iterations, 20);
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(&key).map_err(bad_key)?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            Self::Sha256 => {
                let key = derive::<Sha256>(Purpose::Mac, bmp, salt, iterations, 32);
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key).map_err(bad_key)?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }
}

/// pbeWithSHAAnd3-KeyTripleDES-CBC.
pub fn decrypt_legacy_3des(ciphertext: &[u8], bmp: &[u8], salt: &[u8], iterations: u32) -> Result<Vec<u8>, Error> {
    let key = derive::<Sha1>(Purpose::Key, bmp, salt, iterations, 24);
    let iv = derive::<Sha1>(Purpose::Iv, bmp, salt, iterations, 8);
    let dec = cbc::Decryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
        .map_err(|e| Error::CertLoad(format!("3DES-CBC: {e}")))?;
    unpad(dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext))
}

/// PBES2 with PBKDF2 and AES-256-CBC.
pub fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    prf: Prf,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = [0u8; 32];
    match prf {
        Prf::HmacSha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key),
        Prf::HmacSha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key),
    }
    let dec = cbc::Decryptor::<aes::Aes256>::new_from_slices(&key, iv)
        .map_err(|e| Error::CertLoad(format!("AES-256-CBC: {e}")))?;
    unpad(dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext))
}

// Bad padding after decryption means the derived key was wrong.
fn unpad(result: Result<Vec<u8>, cipher::block_padding::UnpadError>) -> Result<Vec<u8>, Error> {
    result.map_err(|_| Error::BadPassword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 7292 does not publish vectors; these come from the widely used
    // "smeg" / "queeg" PKCS#12 KDF test set.
    #[test]
    fn test_derive_sha1_known_answer() {
        let bmp = bmp_password("smeg");
        let salt = [0x0A, 0x58, 0xCF, 0x64, 0x53, 0x0D, 0x82, 0x3F];
        let key = derive::<Sha1>(Purpose::Key, &bmp, &salt, 1, 24);
        assert_eq!(hex(&key), "8aaae6297b6cb04642ab5b077851284eb7128f1a2a7fbca3");
        let iv = derive::<Sha1>(Purpose::Iv, &bmp, &salt, 1, 8);
        assert_eq!(hex(&iv), "79993dfe048d3b76");
    }

    #[test]
    fn test_derive_lengths_and_purpose() {
        let bmp = bmp_password("secret123");
        let key = derive::<Sha256>(Purpose::Key, &bmp, b"saltsalt", 2048, 32);
        let mac = derive::<Sha256>(Purpose::Mac, &bmp, b"saltsalt", 2048, 32);
        assert_eq!(key.len(), 32);
        assert_ne!(key, mac);
        let long = derive::<Sha1>(Purpose::Key, &bmp, b"saltsalt", 3, 50);
        assert_eq!(long.len(), 50);
        assert_eq!(&long[..24], &derive::<Sha1>(Purpose::Key, &bmp, b"saltsalt", 3, 24)[..]);
    }

    #[test]
    fn test_bmp_password() {
        assert!(bmp_password("").is_empty());
        assert_eq!(bmp_password("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(bmp_password("ñ"), vec![0x00, 0xF1, 0x00, 0x00]);
    }
}
