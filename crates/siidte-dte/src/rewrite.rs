#![forbid(unsafe_code)]

//! Field rewriter.
//!
//! Brings a Documento's mutable fields up to date: emission date, due
//! date and, when the folio changes, everything that carries it.

use chrono::{Days, NaiveDate};
use siidte_core::{ns, ns::node, Error};
use siidte_xml::Element;
use tracing::debug;

use crate::clock;
use crate::envelope::is_payload;

/// What the rewriter did to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRewrite {
    pub tipo: u32,
    pub old_folio: u64,
    pub new_folio: u64,
    pub id: String,
}

/// Identity of a Documento as read from `Encabezado/IdDoc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentKey {
    pub tipo: u32,
    pub folio: u64,
}

impl DocumentKey {
    pub fn read(documento: &Element) -> Result<Self, Error> {
        let id_doc = id_doc(documento)?;
        let number = |name: &str| -> Result<u64, Error> {
            let text = id_doc.child_text(ns::SII_DTE, name).ok_or_else(|| {
                Error::MalformedEnvelope(format!("{} has no IdDoc/{name}", describe(documento)))
            })?;
            text.parse().map_err(|_| {
                Error::MalformedEnvelope(format!("{}: IdDoc/{name} {text:?} is not a number", describe(documento)))
            })
        };
        let tipo = u32::try_from(number(node::TIPO_DTE)?)
            .map_err(|_| Error::MalformedEnvelope(format!("{}: TipoDTE out of range", describe(documento))))?;
        Ok(Self {
            tipo,
            folio: number(node::FOLIO)?,
        })
    }

    /// `F<folio>T<tipo>`.
    pub fn id(&self) -> String {
        format!("F{}T{}", self.folio, self.tipo)
    }
}

/// Rename every `Exportaciones` below `el` to `Documento`.
pub fn normalize_exports(el: &mut Element) -> usize {
    let mut renamed = 0;
    el.walk_mut(&mut |e: &mut Element| {
        if e.is(ns::SII_DTE, node::EXPORTACIONES) {
            e.name = node::DOCUMENTO.to_owned();
            renamed += 1;
        }
    });
    renamed
}

/// Rewrites dates and folios relative to one day.
#[derive(Debug, Clone, Copy)]
pub struct FieldRewriter {
    pub today: NaiveDate,
    /// FchVenc is set this many days after `today`; negative moves it back.
    pub due_days: i64,
}

impl FieldRewriter {
    pub fn new(today: NaiveDate, due_days: i64) -> Self {
        Self { today, due_days }
    }

    /// Rewrite `documento` in place. `new_folio` of `None` keeps the folio.
    ///
    /// Afterwards `ID == F<Folio>T<TipoDTE>`, `DD/F == IdDoc/Folio` and
    /// `DD/FE == IdDoc/FchEmis`.
    pub fn rewrite(&self, documento: &mut Element, new_folio: Option<u64>) -> Result<DocumentRewrite, Error> {
        if !is_payload(documento) {
            return Err(Error::MalformedEnvelope(format!("<{}> is not a Documento", documento.qname())));
        }
        let key = DocumentKey::read(documento)?;
        let folio = new_folio.unwrap_or(key.folio);
        let target = DocumentKey { folio, ..key };
        let today = clock::date(self.today);
        let due = clock::date(self.due_date()?);
        let label = describe(documento);

        let id_doc = documento
            .path_mut(ns::SII_DTE, &[node::ENCABEZADO, node::ID_DOC])
            .ok_or_else(|| Error::MalformedEnvelope(format!("{label} has no Encabezado/IdDoc")))?;
        id_doc.set_child_text(ns::SII_DTE, node::FCH_EMIS, &today);
        if let Some(venc) = id_doc.child_mut(ns::SII_DTE, node::FCH_VENC) {
            venc.set_text(&due);
        }
        if folio != key.folio {
            id_doc.set_child_text(ns::SII_DTE, node::FOLIO, &folio.to_string());
        }

        let dd = documento
            .path_mut(ns::SII_DTE, &[node::TED, node::DD])
            .ok_or_else(|| Error::MalformedEnvelope(format!("{label} has no TED/DD")))?;
        dd.set_child_text(ns::SII_DTE, node::FE, &today);
        dd.set_child_text(ns::SII_DTE, node::F, &folio.to_string());

        let id = target.id();
        documento.set_attribute(ns::attr::ID, &id);
        debug!(id = %id, old_folio = key.folio, fch_emis = %today, "rewrote document fields");

        Ok(DocumentRewrite {
            tipo: key.tipo,
            old_folio: key.folio,
            new_folio: folio,
            id,
        })
    }

    fn due_date(&self) -> Result<NaiveDate, Error> {
        let days = Days::new(self.due_days.unsigned_abs());
        let due = if self.due_days >= 0 {
            self.today.checked_add_days(days)
        } else {
            self.today.checked_sub_days(days)
        };
        due.ok_or_else(|| Error::MalformedEnvelope(format!("due date {} days from {} is out of range", self.due_days, self.today)))
    }
}

fn id_doc(documento: &Element) -> Result<&Element, Error> {
    documento
        .path(ns::SII_DTE, &[node::ENCABEZADO, node::ID_DOC])
        .ok_or_else(|| Error::MalformedEnvelope(format!("{} has no Encabezado/IdDoc", describe(documento))))
}

fn describe(documento: &Element) -> String {
    match documento.attribute(ns::attr::ID) {
        Some(id) => format!("{} {id}", documento.name),
        None => documento.name.clone(),
    }
}
