//! Turning search hits into documents and new frontier tasks

use super::context::PropertyContext;
use crate::extractor::{DocumentTextExtractor, ExtractedFields, Extraction};
use crate::identity::{is_institutional, LinkOutcome};
use crate::models::{
    DataQualityWarning, Document, LegalSource, SearchTask, WarningKind,
};
use crate::registry::DocumentSummary;
use tracing::{debug, warn};

/// Ingest one search's results
///
/// Documents already held (by either key form) are skipped, so the count
/// returned is of genuinely new documents only.
pub async fn ingest_results(
    ctx: &mut PropertyContext,
    extractor: &dyn DocumentTextExtractor,
    summaries: Vec<DocumentSummary>,
    discovered_by: &str,
) -> usize {
    let mut added = 0;
    for summary in summaries {
        let mut document = summary.into_document(ctx.property_id(), discovered_by);
        let Some(key) = document.key() else {
            ctx.warn(DataQualityWarning::new(
                ctx.property_id(),
                WarningKind::UnkeyedDocument,
                Some(discovered_by.to_string()),
                format!("{} document has neither instrument nor book/page", document.doc_type_code),
            ));
            continue;
        };
        if ctx.knows(&document) {
            continue;
        }

        match extractor.extract(&document).await {
            Extraction::Structured(fields) => merge_fields(&mut document, fields),
            Extraction::Thin { reason, text_dump } => {
                warn!(property_id = %ctx.property_id(), %key, %reason, "Thin extraction");
                ctx.warn(
                    DataQualityWarning::new(
                        ctx.property_id(),
                        WarningKind::ThinExtraction,
                        Some(key.to_string()),
                        reason,
                    )
                    .with_review_text(text_dump),
                );
            }
        }

        if document.recording_date.is_none() {
            ctx.warn(DataQualityWarning::new(
                ctx.property_id(),
                WarningKind::UnparseableDate,
                Some(key.to_string()),
                "recording date missing or unparseable",
            ));
        }

        if document.doc_type.is_deed() {
            detect_self_transfer(ctx, &mut document);
        }

        if ctx.is_cross_lot(&document) {
            debug!(property_id = %ctx.property_id(), %key, "Cross-lot document kept but not expanded");
        } else {
            expand_frontier(ctx, &document);
        }

        ctx.add_document(document);
        added += 1;
    }
    added
}

/// Fill document fields the registry summary did not carry
pub fn merge_fields(document: &mut Document, fields: ExtractedFields) {
    if document.legal_text.is_none() {
        document.legal_text = fields.legal_text;
    }
    if document.case_number.is_none() {
        document.case_number = fields.case_number;
    }
    if document.amount.is_none() {
        document.amount = fields.amount;
    }
    if document.maturity_date.is_none() {
        document.maturity_date = fields.maturity_date;
    }
    for reference in fields.referenced_instruments {
        if !document.referenced_instruments.contains(&reference) {
            document.referenced_instruments.push(reference);
        }
    }
    if document.party_one.is_empty() {
        document.party_one = if fields.grantors.is_empty() {
            fields.plaintiff.into_iter().collect()
        } else {
            fields.grantors
        };
    }
    if document.party_two.is_empty() {
        document.party_two = if fields.grantees.is_empty() {
            fields.defendants
        } else {
            fields.grantees
        };
    }
}

fn detect_self_transfer(ctx: &mut PropertyContext, document: &mut Document) {
    let outcomes = ctx
        .linker
        .observe_sides(&document.party_one, &document.party_two);
    for (_, outcome) in &outcomes {
        if let LinkOutcome::Conflict { left, right } = outcome {
            ctx.warn(DataQualityWarning::new(
                ctx.property_id(),
                WarningKind::AmbiguousIdentity,
                document.key().map(|k| k.to_string()),
                format!("grantor and grantee link identities {} and {}", left, right),
            ));
        }
    }
    document.is_self_transfer = ctx
        .linker
        .confidently_same_party(&document.party_one, &document.party_two);
    if !document.is_self_transfer && !outcomes.is_empty() {
        ctx.warn(DataQualityWarning::new(
            ctx.property_id(),
            WarningKind::AmbiguousIdentity,
            document.key().map(|k| k.to_string()),
            format!(
                "possible self-transfer below match threshold ({} to {}); kept as a sale",
                document.party_one.join("; "),
                document.party_two.join("; ")
            ),
        ));
    }
}

/// Queue what a new in-lot document tells us to search next
fn expand_frontier(ctx: &mut PropertyContext, document: &Document) {
    let property_id = ctx.property_id().to_string();
    let trigger = document
        .key()
        .map(|k| k.to_string())
        .unwrap_or_else(|| document.doc_type_code.clone());

    if let Some(legal) = document.legal_text.as_deref() {
        ctx.observe_legal(legal, LegalSource::DiscoveredDocument, &trigger);
    }

    if document.doc_type.is_deed() {
        let date = document.recording_date;
        for grantor in document.grantors().iter().filter(|n| !is_institutional(n)) {
            ctx.frontier
                .enqueue(SearchTask::party_name(&property_id, grantor, None, date).with_trigger(&trigger));
        }
        for grantee in document.grantees().iter().filter(|n| !is_institutional(n)) {
            ctx.frontier
                .enqueue(SearchTask::party_name(&property_id, grantee, date, None).with_trigger(&trigger));
        }
    }

    for reference in &document.referenced_instruments {
        ctx.frontier.enqueue(
            SearchTask::reference(&property_id, &reference.search_term()).with_trigger(&trigger),
        );
    }

    if let Some(case_number) = document.case_number.as_deref() {
        ctx.frontier
            .enqueue(SearchTask::case_number(&property_id, case_number).with_trigger(&trigger));
        if ctx.property.case_number.is_none() {
            ctx.property.case_number = Some(case_number.to_string());
        }
    }
}
