#![forbid(unsafe_code)]

//! BER reading of PFX structures (RFC 7292).
//!
//! PFX files in the wild are BER, not DER (indefinite lengths, constructed
//! octet strings), hence `yasna::parse_ber` throughout.

use siidte_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, BERReaderSeq, Tag};

use crate::kdf::{self, MacHash, Prf};
use crate::PfxContents;

// PKCS#7 content types
const DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

// PKCS#12 bag types
const KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
const SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

// Encryption schemes
const PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];
const AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

// Digests and PRFs
const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn is(oid: &ObjectIdentifier, components: &[u64]) -> bool {
    oid.components().as_slice() == components
}

fn invalid<T>() -> ASN1Result<T> {
    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
}

fn malformed(what: &str) -> impl Fn(ASN1Error) -> Error + '_ {
    move |e| Error::CertLoad(format!("malformed PKCS#12 {what}: {e}"))
}

// ── Model ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Encryption {
    Legacy3Des { salt: Vec<u8>, iterations: u32 },
    Pbes2 { salt: Vec<u8>, iterations: u32, prf: Prf, iv: Vec<u8> },
}

struct MacData {
    hash: MacHash,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum ContentInfo {
    Plain(Vec<u8>),
    Encrypted(Encryption, Vec<u8>),
}

enum SafeBag {
    Key(Vec<u8>),
    ShroudedKey(Encryption, Vec<u8>),
    Certificate(Vec<u8>),
    Ignored,
}

// ── Entry point ────────────────────────────────────────────────────────────

pub(crate) fn parse_pfx(data: &[u8], password: &str) -> Result<PfxContents, Error> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return invalid();
            }
            let auth_safe = read_data_content(r.next())?;
            let mac = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(malformed("PFX"))?;

    let bmp = kdf::bmp_password(password);
    if let Some(mac) = &mac {
        let computed = mac.hash.mac(&bmp, &mac.salt, mac.iterations, &auth_safe)?;
        if computed != mac.digest {
            return Err(Error::BadPassword);
        }
    }

    let infos = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_content_info))
        .map_err(malformed("authenticated safe"))?;

    let mut contents = PfxContents::default();
    for info in infos {
        let safe_contents = match info {
            ContentInfo::Plain(bytes) => bytes,
            ContentInfo::Encrypted(enc, ciphertext) => decrypt(&enc, &ciphertext, password, &bmp)?,
        };
        let bags = yasna::parse_ber(&safe_contents, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(malformed("safe contents"))?;
        for bag in bags {
            match bag {
                SafeBag::Key(der) => contents.keys.push(der),
                SafeBag::ShroudedKey(enc, ciphertext) => {
                    contents.keys.push(decrypt(&enc, &ciphertext, password, &bmp)?)
                }
                SafeBag::Certificate(der) => contents.certificates.push(der),
                SafeBag::Ignored => {}
            }
        }
    }
    Ok(contents)
}

fn decrypt(enc: &Encryption, ciphertext: &[u8], password: &str, bmp: &[u8]) -> Result<Vec<u8>, Error> {
    match enc {
        Encryption::Legacy3Des { salt, iterations } => {
            kdf::decrypt_legacy_3des(ciphertext, bmp, salt, *iterations)
        }
        Encryption::Pbes2 { salt, iterations, prf, iv } => {
            kdf::decrypt_pbes2(ciphertext, password, salt, *iterations, *prf, iv)
        }
    }
}

// ── ContentInfo ────────────────────────────────────────────────────────────

/// `ContentInfo` of type `data`: returns the wrapped octets.
fn read_data_content(r: BERReader) -> ASN1Result<Vec<u8>> {
    r.read_sequence(|r| {
        if !is(&r.next().read_oid()?, DATA) {
            return invalid();
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn read_content_info(r: BERReader) -> ASN1Result<ContentInfo> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if is(&content_type, DATA) {
            return r
                .next()
                .read_tagged(Tag::context(0), |r| r.read_bytes())
                .map(ContentInfo::Plain);
        }
        if !is(&content_type, ENCRYPTED_DATA) {
            return invalid();
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let enc = read_encryption(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(ContentInfo::Encrypted(enc, ciphertext))
                })
            })
        })
    })
}

// ── SafeBag ────────────────────────────────────────────────────────────────

fn read_safe_bag(r: BERReader) -> ASN1Result<SafeBag> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let bag = r.next().read_tagged(Tag::context(0), |r| {
            if is(&bag_type, KEY_BAG) {
                r.read_der().map(SafeBag::Key)
            } else if is(&bag_type, SHROUDED_KEY_BAG) {
                r.read_sequence(|r| {
                    let enc = read_encryption(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(SafeBag::ShroudedKey(enc, ciphertext))
                })
            } else if is(&bag_type, CERT_BAG) {
                r.read_sequence(|r| {
                    let cert_type = r.next().read_oid()?;
                    let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    Ok(if is(&cert_type, X509_CERTIFICATE) {
                        SafeBag::Certificate(der)
                    } else {
                        SafeBag::Ignored
                    })
                })
            } else {
                r.read_der().map(|_| SafeBag::Ignored)
            }
        })?;
        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

/// Friendly names and local key IDs are not needed: one key, one leaf cert.
fn skip_bag_attributes(r: &mut BERReaderSeq<'_, '_>) -> ASN1Result<()> {
    r.read_optional(|r| {
        r.read_set_of(|r| {
            r.read_der()?;
            Ok(())
        })
    })?;
    Ok(())
}

// ── AlgorithmIdentifiers ───────────────────────────────────────────────────

fn read_encryption(r: BERReader) -> ASN1Result<Encryption> {
    r.read_sequence(|r| {
        let scheme = r.next().read_oid()?;
        if is(&scheme, PBE_SHA1_3DES) {
            return r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Encryption::Legacy3Des { salt, iterations })
            });
        }
        if !is(&scheme, PBES2) {
            return invalid();
        }
        r.next().read_sequence(|r| {
            let (salt, iterations, prf) = r.next().read_sequence(|r| {
                if !is(&r.next().read_oid()?, PBKDF2) {
                    return invalid();
                }
                r.next().read_sequence(read_pbkdf2_params)
            })?;
            let iv = r.next().read_sequence(|r| {
                if !is(&r.next().read_oid()?, AES_256_CBC) {
                    return invalid();
                }
                r.next().read_bytes()
            })?;
            Ok(Encryption::Pbes2 { salt, iterations, prf, iv })
        })
    })
}

/// `PBKDF2-params ::= SEQUENCE { salt, iterationCount, keyLength OPTIONAL, prf DEFAULT hmacWithSHA1 }`
fn read_pbkdf2_params(r: &mut BERReaderSeq<'_, '_>) -> ASN1Result<(Vec<u8>, u32, Prf)> {
    let salt = r.next().read_bytes()?;
    let iterations = r.next().read_u32()?;
    // keyLength and prf are both optional; tell them apart by tag.
    let mut prf = Prf::HmacSha1;
    while let Some(der) = r.read_optional(|r| r.read_der())? {
        if der.first() == Some(&0x30) {
            prf = read_prf(&der)?;
        }
    }
    Ok((salt, iterations, prf))
}

fn read_prf(der: &[u8]) -> ASN1Result<Prf> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let oid = r.next().read_oid()?;
            r.read_optional(|r| r.read_null())?;
            if is(&oid, HMAC_SHA256) {
                Ok(Prf::HmacSha256)
            } else if is(&oid, HMAC_SHA1) {
                Ok(Prf::HmacSha1)
            } else {
                invalid()
            }
        })
    })
}

// ── MacData ────────────────────────────────────────────────────────────────

fn read_mac_data(r: BERReader) -> ASN1Result<MacData> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let oid = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if is(&oid, SHA256) {
                    Ok(MacHash::Sha256)
                } else if is(&oid, SHA1) {
                    Ok(MacHash::Sha1)
                } else {
                    invalid()
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData { hash, digest, salt, iterations })
    })
}
