//! Encumbrance and instrument-event extraction from documents
//!
//! Encumbrances are mapped onto persisted ownership periods only; taking
//! `PersistedPeriod` rather than `OwnershipPeriod` keeps association from
//! ever running against periods that have no stored identity.

use super::builder::is_cross_lot;
use crate::legal::ParsedLegal;
use crate::models::{
    DataQualityWarning, DocType, Document, DocumentKey, Encumbrance, EncumbranceKind, EventType,
    InstrumentEvent, LienStatus, PersistedPeriod, WarningKind,
};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    pub encumbrances: Vec<Encumbrance>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Turn encumbrance-type documents into encumbrances tied to periods
///
/// A document recorded outside every period is kept with no period and a
/// warning; cross-lot documents are dropped.
pub fn associate(
    property_id: &str,
    documents: &[Document],
    periods: &[PersistedPeriod],
    target: Option<&ParsedLegal>,
) -> Association {
    let mut out = Association::default();

    for document in documents.iter().filter(|d| d.doc_type.is_encumbrance()) {
        let Some(kind) = EncumbranceKind::classify(document.doc_type, document.creditors()) else {
            continue;
        };
        let Some(key) = document.key() else {
            continue;
        };
        let Some(recording_date) = document.recording_date else {
            out.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::UnparseableDate,
                Some(key.to_string()),
                format!("{} has no usable recording date", kind.as_str()),
            ));
            continue;
        };
        if is_cross_lot(document, target) {
            out.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::CrossLotRejected,
                Some(key.to_string()),
                "encumbrance describes a different lot in the same subdivision",
            ));
            continue;
        }

        let ownership_period_id = periods
            .iter()
            .find(|p| p.period().contains(recording_date))
            .map(|p| p.id());
        if ownership_period_id.is_none() {
            debug!(property_id, key = %key, %recording_date, "Encumbrance outside every ownership period");
            out.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::UnassociatedDocument,
                Some(key.to_string()),
                format!("recorded {} outside every ownership period", recording_date),
            ));
        }

        let book_page = match key {
            DocumentKey::Instrument { .. } => document.book_page_key(),
            DocumentKey::BookPage { .. } => None,
        };
        let creditor = document.creditors().first().cloned().unwrap_or_default();

        out.encumbrances.push(Encumbrance {
            property_id: property_id.to_string(),
            key,
            book_page,
            ownership_period_id,
            kind,
            recording_date,
            amount: document.amount,
            original_creditor: creditor.clone(),
            creditor,
            debtor: document.debtors().first().cloned().unwrap_or_default(),
            maturity_date: document.maturity_date,
            status: LienStatus::Open,
            survival_status: None,
            survival_reason: None,
            surviving_amount: None,
            is_joined: None,
            is_inferred: false,
        });
    }

    out
}

/// Assignment, satisfaction and release documents as events
///
/// One event per referenced instrument; an event document that references
/// nothing is reported as an orphan.
pub fn instrument_events(
    property_id: &str,
    documents: &[Document],
) -> (Vec<InstrumentEvent>, Vec<DataQualityWarning>) {
    let mut events = Vec::new();
    let mut warnings = Vec::new();

    for document in documents.iter().filter(|d| d.doc_type.is_instrument_event()) {
        let (Some(key), Some(recording_date)) = (document.key(), document.recording_date) else {
            continue;
        };
        let (event_type, counterparty) = match document.doc_type {
            DocType::Assignment => (EventType::Assignment, document.party_two.first()),
            _ => (EventType::Satisfaction, document.party_one.first()),
        };
        if document.referenced_instruments.is_empty() {
            warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::OrphanEvent,
                Some(key.to_string()),
                format!("{} references no instrument", document.doc_type.as_str()),
            ));
            continue;
        }
        for referenced in &document.referenced_instruments {
            events.push(InstrumentEvent {
                instrument: key.clone(),
                event_type,
                recording_date,
                referenced: referenced.clone(),
                counterparty_name: counterparty.cloned(),
            });
        }
    }

    events.sort_by(|a, b| a.recording_date.cmp(&b.recording_date));
    (events, warnings)
}
