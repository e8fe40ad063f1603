//! Destructive chain rebuild with survival preservation
//!
//! Order is fixed: snapshot prior survival work, mint ids for the new
//! periods, associate encumbrances against them, reapply the snapshot, then
//! write periods, gaps, encumbrances and chain warnings in one store
//! transaction. A failed snapshot or write leaves the prior chain intact.

use super::{associate, build_chain};
use crate::error::{TitleError, TitleResult};
use crate::identity::IdentityLinker;
use crate::legal::ParsedLegal;
use crate::models::{
    ChainGap, DataQualityWarning, Encumbrance, PersistedPeriod, Property, SurvivalSnapshot,
    WarningKind,
};
use crate::store::{TitleStore, WriteGate};
use chrono::Utc;
use fcti_common::events::{EventBus, TitleEvent};
use tracing::{info, warn};

/// What a rebuild produced
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub periods: Vec<PersistedPeriod>,
    pub gaps: Vec<ChainGap>,
    pub encumbrances: Vec<Encumbrance>,
    /// Encumbrances whose prior classification was carried over
    pub preserved: usize,
    pub needs_reanalysis: bool,
    pub warnings: Vec<DataQualityWarning>,
}

impl RebuildOutcome {
    pub fn chain_complete(&self) -> bool {
        !self.periods.is_empty()
    }
}

/// Copy prior survival work onto matching new encumbrances
///
/// # Returns
/// `(preserved, needs_reanalysis)`. Re-analysis is needed when prior
/// classifications existed and either side has records the other lacks.
pub fn reapply_snapshots(
    encumbrances: &mut [Encumbrance],
    snapshots: &[SurvivalSnapshot],
) -> (usize, bool) {
    let mut preserved = 0;
    let mut unmatched_new = false;

    for encumbrance in encumbrances.iter_mut() {
        match snapshots.iter().find(|s| s.matches(encumbrance)) {
            Some(snapshot) => {
                encumbrance.creditor = snapshot.creditor.clone();
                encumbrance.status = snapshot.status;
                encumbrance.survival_status = snapshot.survival_status;
                encumbrance.survival_reason = snapshot.survival_reason.clone();
                encumbrance.surviving_amount = snapshot.surviving_amount;
                encumbrance.is_joined = snapshot.is_joined;
                encumbrance.is_inferred = snapshot.is_inferred;
                if snapshot.survival_status.is_some() {
                    preserved += 1;
                }
            }
            None => unmatched_new = true,
        }
    }

    let had_prior_work = snapshots.iter().any(|s| s.survival_status.is_some());
    let dropped_prior = snapshots
        .iter()
        .filter(|s| s.survival_status.is_some())
        .any(|s| !encumbrances.iter().any(|e| s.matches(e)));

    (preserved, had_prior_work && (unmatched_new || dropped_prior))
}

/// Rebuild a property's chain and encumbrance set behind its write gate
///
/// # Errors
/// `TitleError::Structural` when loading, snapshotting or the chain write
/// fails; the prior chain is left intact in each case.
pub async fn rebuild_chain(
    store: &dyn TitleStore,
    gate: &WriteGate,
    events: &EventBus,
    property_id: &str,
    target: Option<&ParsedLegal>,
    linker: &IdentityLinker,
) -> TitleResult<RebuildOutcome> {
    let _guard = gate.lock(property_id).await;

    let documents = store
        .load_documents(property_id)
        .await
        .map_err(|e| TitleError::structural("load documents for rebuild", e))?;
    let snapshots = store
        .snapshot_survival(property_id)
        .await
        .map_err(|e| TitleError::structural("snapshot survival before rebuild", e))?;

    let build = build_chain(property_id, &documents, target, linker);
    let mut warnings = build.warnings;

    let periods: Vec<PersistedPeriod> =
        build.periods.into_iter().map(PersistedPeriod::mint).collect();

    let association = associate(property_id, &documents, &periods, target);
    warnings.extend(association.warnings);
    let mut encumbrances = association.encumbrances;

    let (preserved, needs_reanalysis) = reapply_snapshots(&mut encumbrances, &snapshots);
    if needs_reanalysis {
        warn!(property_id, "Rebuild changed the encumbrance set; survival needs re-analysis");
    }

    if periods.is_empty() {
        warnings.push(DataQualityWarning::new(
            property_id,
            WarningKind::ZeroPeriods,
            None,
            format!("{} documents produced no ownership periods", documents.len()),
        ));
    }

    store
        .replace_chain(property_id, &periods, &build.gaps, &encumbrances, &warnings)
        .await
        .map_err(|e| TitleError::structural("replace chain", e))?;

    let mut property = store
        .load_property(property_id)
        .await?
        .unwrap_or_else(|| Property::new(property_id));
    property.chain_complete = !periods.is_empty();
    if needs_reanalysis {
        property.needs_reanalysis = true;
        property.survival_complete = false;
    }
    property.updated_at = Utc::now();
    store.upsert_property(&property).await?;

    info!(
        property_id,
        periods = periods.len(),
        gaps = build.gaps.len(),
        encumbrances = encumbrances.len(),
        preserved,
        "Chain rebuilt"
    );
    events.emit_lossy(TitleEvent::ChainRebuilt {
        property_id: property_id.to_string(),
        periods: periods.len(),
        gaps: build.gaps.len(),
        encumbrances: encumbrances.len(),
        preserved_classifications: preserved,
        timestamp: Utc::now(),
    });

    Ok(RebuildOutcome {
        periods,
        gaps: build.gaps,
        encumbrances,
        preserved,
        needs_reanalysis,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKey, EncumbranceKind, LienStatus, SurvivalStatus};
    use chrono::NaiveDate;

    fn encumbrance(instrument: &str) -> Encumbrance {
        Encumbrance {
            property_id: "p1".into(),
            key: DocumentKey::instrument(instrument),
            book_page: Some(DocumentKey::book_page("100", instrument)),
            ownership_period_id: None,
            kind: EncumbranceKind::Mortgage,
            recording_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            amount: Some(1000.0),
            creditor: "LENDER A".into(),
            original_creditor: "LENDER A".into(),
            debtor: "DOE JANE".into(),
            maturity_date: None,
            status: LienStatus::Open,
            survival_status: None,
            survival_reason: None,
            surviving_amount: None,
            is_joined: None,
            is_inferred: false,
        }
    }

    #[test]
    fn test_reapply_preserves_by_either_key() {
        let mut prior = encumbrance("1");
        prior.survival_status = Some(SurvivalStatus::Survived);
        prior.is_joined = Some(false);
        prior.is_inferred = true;
        let snapshots = vec![SurvivalSnapshot::of(&prior)];

        // Same book/page, instrument number now missing
        let mut rebuilt = encumbrance("1");
        rebuilt.key = DocumentKey::book_page("100", "1");
        rebuilt.book_page = None;
        let mut encumbrances = vec![rebuilt];

        let (preserved, needs) = reapply_snapshots(&mut encumbrances, &snapshots);
        assert_eq!(preserved, 1);
        assert!(!needs);
        assert_eq!(encumbrances[0].survival_status, Some(SurvivalStatus::Survived));
        assert_eq!(encumbrances[0].is_joined, Some(false));
        assert!(encumbrances[0].is_inferred);
    }

    #[test]
    fn test_new_encumbrance_flags_reanalysis() {
        let mut prior = encumbrance("1");
        prior.survival_status = Some(SurvivalStatus::Extinguished);
        let snapshots = vec![SurvivalSnapshot::of(&prior)];
        let mut encumbrances = vec![encumbrance("1"), encumbrance("2")];

        let (preserved, needs) = reapply_snapshots(&mut encumbrances, &snapshots);
        assert_eq!(preserved, 1);
        assert!(needs);
        assert_eq!(encumbrances[1].survival_status, None);
    }

    #[test]
    fn test_first_build_does_not_flag() {
        let mut encumbrances = vec![encumbrance("1")];
        let (preserved, needs) = reapply_snapshots(&mut encumbrances, &[]);
        assert_eq!(preserved, 0);
        assert!(!needs);
    }
}
