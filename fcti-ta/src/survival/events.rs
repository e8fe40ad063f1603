//! Assignment and satisfaction replay

use crate::models::{
    DataQualityWarning, Encumbrance, EventType, InstrumentEvent, LienStatus, WarningKind,
};
use tracing::debug;

/// Replay instrument events onto encumbrances in recording-date order
///
/// Creditor and status are first reset to their recorded values so that
/// replaying the same events twice gives the same result. An event dated
/// before the encumbrance it references is ignored.
pub fn apply_events(
    property_id: &str,
    encumbrances: &mut [Encumbrance],
    events: &[InstrumentEvent],
) -> Vec<DataQualityWarning> {
    let mut warnings = Vec::new();
    for encumbrance in encumbrances.iter_mut() {
        encumbrance.creditor = encumbrance.original_creditor.clone();
        encumbrance.status = LienStatus::Open;
    }

    let mut ordered: Vec<&InstrumentEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.recording_date);

    for event in ordered {
        let Some(target) = encumbrances
            .iter_mut()
            .find(|e| e.matches_reference(&event.referenced))
        else {
            warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::OrphanEvent,
                Some(event.instrument.to_string()),
                format!("referenced instrument {} is not a known encumbrance", event.referenced),
            ));
            continue;
        };

        if event.recording_date < target.recording_date {
            warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::OrphanEvent,
                Some(event.instrument.to_string()),
                format!(
                    "recorded {} before the encumbrance it references ({})",
                    event.recording_date, target.recording_date
                ),
            ));
            continue;
        }

        match event.event_type {
            EventType::Assignment => {
                if let Some(assignee) = &event.counterparty_name {
                    debug!(key = %target.key, from = %target.creditor, to = %assignee, "Assignment applied");
                    target.creditor = assignee.clone();
                }
            }
            EventType::Satisfaction => {
                debug!(key = %target.key, "Satisfaction applied");
                target.status = LienStatus::Satisfied;
            }
        }
    }

    warnings
}
