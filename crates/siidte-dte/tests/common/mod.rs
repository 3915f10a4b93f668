#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use siidte_core::{ns, Error};
use siidte_dte::{FixedClock, KeepFolio, ResignOptions, ResignReport, Resigner};
use siidte_keys::{CafPool, EnvelopeCertificate};
use siidte_xml::{Element, XmlDocument};

pub fn data(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../test-data").join(path)
}

pub fn envelope(name: &str) -> Vec<u8> {
    std::fs::read(data("envelopes").join(name)).unwrap()
}

pub fn pool() -> CafPool {
    CafPool::build(&data("caf")).unwrap()
}

pub fn cert() -> EnvelopeCertificate {
    EnvelopeCertificate::load_pfx(&data("certs/envelope.pfx"), "secret123").unwrap()
}

pub fn clock() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2024, 12, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    )
}

pub fn try_resign(name: &str, options: ResignOptions) -> Result<(Vec<u8>, ResignReport), Error> {
    let pool = pool();
    let cert = cert();
    let clock = clock();
    Resigner::new(&pool, &cert, &clock, options).resign(&envelope(name), &mut KeepFolio)
}

pub fn resign(name: &str) -> (Vec<u8>, ResignReport) {
    try_resign(name, ResignOptions::default()).unwrap()
}

pub fn root(bytes: &[u8]) -> Element {
    XmlDocument::parse(bytes).unwrap().root
}

/// All elements named `name` in the SII namespace, in document order.
pub fn all<'a>(root: &'a Element, name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    root.find_all(&|e: &Element| e.is(ns::SII_DTE, name), &mut found);
    found
}

pub fn text_of(el: &Element, path: &[&str]) -> String {
    el.path(ns::SII_DTE, path).unwrap().trimmed_text()
}
