//! Survival / priority analysis
//!
//! `analyze_survival` replays instrument events over the stored
//! encumbrances, classifies them against the current ownership period and
//! the foreclosure context, and saves the result behind the property's
//! write gate.

pub mod equity;
pub mod events;
pub mod expiration;
pub mod rules;
pub mod safe_harbor;

pub use equity::EquityEstimate;
pub use events::apply_events;
pub use expiration::{expiration_date, is_expired};
pub use rules::{ClassificationContext, ForeclosingMatch, SurvivalEngine, SurvivalRun};
pub use safe_harbor::safe_harbor_amount;

use crate::chain::instrument_events;
use crate::error::{TitleError, TitleResult};
use crate::models::{ForeclosureContext, Property};
use crate::store::{TitleStore, WriteGate};
use chrono::{NaiveDate, Utc};
use fcti_common::events::{EventBus, TitleEvent};

/// Classify and persist every encumbrance of one property
///
/// `survival_complete` is set only when every encumbrance was classified
/// (trivially true for none), and clears `needs_reanalysis`.
///
/// # Errors
/// `TitleError::Structural` when loading or saving fails.
pub async fn analyze_survival(
    engine: &SurvivalEngine,
    store: &dyn TitleStore,
    gate: &WriteGate,
    bus: &EventBus,
    property_id: &str,
    context: &ForeclosureContext,
    as_of: NaiveDate,
) -> TitleResult<SurvivalRun> {
    let _guard = gate.lock(property_id).await;

    let documents = store.load_documents(property_id).await?;
    let periods = store.load_periods(property_id).await?;
    let mut encumbrances = store.load_encumbrances(property_id).await?;

    let (events, mut warnings) = instrument_events(property_id, &documents);
    warnings.extend(apply_events(property_id, &mut encumbrances, &events));

    let current = periods
        .iter()
        .map(|p| p.period())
        .find(|p| p.is_current());
    let mut run = engine.classify_all(property_id, &mut encumbrances, current, context, as_of);
    warnings.append(&mut run.warnings);

    store
        .save_encumbrances(&encumbrances)
        .await
        .map_err(|e| TitleError::structural("save survival classifications", e))?;
    for warning in &warnings {
        store.add_warning(warning).await?;
    }

    let mut property = store
        .load_property(property_id)
        .await?
        .unwrap_or_else(|| Property::new(property_id));
    property.survival_complete = run.classified == encumbrances.len();
    if property.survival_complete {
        property.needs_reanalysis = false;
    }
    property.updated_at = Utc::now();
    store.upsert_property(&property).await?;

    bus.emit_lossy(TitleEvent::SurvivalClassified {
        property_id: property_id.to_string(),
        classified: run.classified,
        surviving: run.surviving,
        inferred: run.inferred,
        timestamp: Utc::now(),
    });

    run.warnings = warnings;
    Ok(run)
}
