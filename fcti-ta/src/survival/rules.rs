//! Survival classification rules
//!
//! Decision order for one encumbrance:
//!
//! 1. recorded before the current owner acquired → `HISTORICAL`
//! 2. satisfied or released → `SATISFIED`
//! 3. the instrument being foreclosed → `FORECLOSING`
//! 4. superpriority classes → `SURVIVED` (tax deed: federal tax only)
//! 5. foreclosure-type table against the foreclosing instrument's
//!    recording date (not the lis pendens filing date)
//! 6. junior liens whose holder was provably not joined → `SURVIVED`
//! 7. elapsed statutory window turns `SURVIVED` into `EXPIRED`

use super::expiration::is_expired;
use super::safe_harbor::safe_harbor_amount;
use crate::config::SurvivalConfig;
use crate::identity::parties_match;
use crate::models::{
    DataQualityWarning, DocumentKey, Encumbrance, EncumbranceKind, ForeclosureContext,
    ForeclosureType, LienStatus, OwnershipPeriod, SurvivalClassification, SurvivalStatus,
    WarningKind,
};
use chrono::NaiveDate;
use tracing::{debug, info};

/// The encumbrance being foreclosed and the priority cutover it sets
#[derive(Debug, Clone, PartialEq)]
pub struct ForeclosingMatch {
    pub key: DocumentKey,
    /// Recording date of the foreclosing instrument
    pub cutover: NaiveDate,
    /// Set when the match was inferred rather than found
    pub inference: Option<String>,
}

/// Everything `classify` needs beyond the encumbrance itself
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    pub foreclosing: Option<ForeclosingMatch>,
    /// First mortgage eligible for the association safe harbor
    pub safe_harbor_target: Option<DocumentKey>,
    pub as_of: Option<NaiveDate>,
}

/// Outcome of classifying one property's encumbrances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurvivalRun {
    pub classified: usize,
    pub surviving: usize,
    pub inferred: usize,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone)]
pub struct SurvivalEngine {
    config: SurvivalConfig,
}

fn is_historical(encumbrance: &Encumbrance, current: Option<&OwnershipPeriod>) -> bool {
    current.map_or(false, |p| encumbrance.recording_date < p.acquisition_date)
}

fn expected_kind(foreclosure_type: ForeclosureType) -> Option<EncumbranceKind> {
    match foreclosure_type {
        ForeclosureType::FirstMortgage => Some(EncumbranceKind::Mortgage),
        ForeclosureType::Association => Some(EncumbranceKind::AssociationLien),
        ForeclosureType::TaxDeed => Some(EncumbranceKind::PropertyTax),
        ForeclosureType::Unknown => None,
    }
}

fn classification(status: SurvivalStatus, reason: impl Into<String>, amount: Option<f64>) -> SurvivalClassification {
    SurvivalClassification {
        status,
        reason: reason.into(),
        amount,
        is_inferred: false,
    }
}

impl SurvivalEngine {
    pub fn new(config: SurvivalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurvivalConfig {
        &self.config
    }

    /// Find the encumbrance the foreclosure is enforcing
    ///
    /// Structured references win, then a creditor matching the plaintiff
    /// (preferring the kind the foreclosure type implies, then the most
    /// recent). First-mortgage cases with neither fall back to the most
    /// recent open mortgage recorded before the lis pendens.
    pub fn identify_foreclosing(
        &self,
        encumbrances: &[Encumbrance],
        current: Option<&OwnershipPeriod>,
        context: &ForeclosureContext,
        as_of: NaiveDate,
    ) -> Option<ForeclosingMatch> {
        let found = |e: &Encumbrance| ForeclosingMatch {
            key: e.key.clone(),
            cutover: e.recording_date,
            inference: None,
        };

        if let Some(e) = encumbrances.iter().find(|e| {
            context
                .foreclosed_instruments
                .iter()
                .any(|r| e.matches_reference(r))
        }) {
            return Some(found(e));
        }

        let open = || {
            encumbrances
                .iter()
                .filter(|e| e.status == LienStatus::Open && !is_historical(e, current))
        };

        if let Some(plaintiff) = context.plaintiff.as_deref() {
            let preferred = expected_kind(context.foreclosure_type);
            let best = open()
                .filter(|e| {
                    parties_match(&e.creditor, plaintiff)
                        || parties_match(&e.original_creditor, plaintiff)
                })
                .max_by_key(|e| (Some(e.kind) == preferred, e.recording_date));
            if let Some(e) = best {
                return Some(found(e));
            }
        }

        if context.foreclosure_type != ForeclosureType::FirstMortgage {
            return None;
        }
        let boundary = context.filing_date.or(context.sale_date).unwrap_or(as_of);
        open()
            .filter(|e| e.kind == EncumbranceKind::Mortgage && e.recording_date < boundary)
            .max_by_key(|e| e.recording_date)
            .map(|e| ForeclosingMatch {
                key: e.key.clone(),
                cutover: e.recording_date,
                inference: Some(format!(
                    "no structured reference or plaintiff match; inferred most recent open mortgage recorded before {}",
                    boundary
                )),
            })
    }

    /// Classify one encumbrance against the current ownership period
    ///
    /// # Returns
    /// The classification and the joinder verdict (`None` when the
    /// foreclosure's party list is unknown or joinder does not apply).
    pub fn classify(
        &self,
        encumbrance: &Encumbrance,
        current: Option<&OwnershipPeriod>,
        context: &ForeclosureContext,
        resolved: &ClassificationContext,
    ) -> (SurvivalClassification, Option<bool>) {
        if let Some(period) = current.filter(|_| is_historical(encumbrance, current)) {
            return (
                classification(
                    SurvivalStatus::Historical,
                    format!(
                        "recorded before the current owner acquired on {}",
                        period.acquisition_date
                    ),
                    None,
                ),
                None,
            );
        }

        if encumbrance.status == LienStatus::Satisfied {
            return (
                classification(SurvivalStatus::Satisfied, "satisfaction or release recorded", None),
                None,
            );
        }

        if let Some(foreclosing) = resolved
            .foreclosing
            .as_ref()
            .filter(|f| encumbrance.matches_reference(&f.key))
        {
            let mut result = classification(
                SurvivalStatus::Foreclosing,
                foreclosing
                    .inference
                    .clone()
                    .unwrap_or_else(|| "instrument being foreclosed".to_string()),
                encumbrance.amount,
            );
            result.is_inferred = foreclosing.inference.is_some();
            return (result, None);
        }

        let joined = context.defendants.as_ref().map(|defendants| {
            defendants.iter().any(|d| {
                parties_match(d, &encumbrance.creditor)
                    || parties_match(d, &encumbrance.original_creditor)
            })
        });

        let mut result = self.priority_rule(encumbrance, context, resolved);

        if result.status == SurvivalStatus::Extinguished
            && context.foreclosure_type != ForeclosureType::TaxDeed
            && joined == Some(false)
        {
            result = classification(
                SurvivalStatus::Survived,
                "junior lienholder not named as a defendant; lien survives",
                encumbrance.amount,
            );
        }

        if result.status == SurvivalStatus::Survived {
            if let Some(as_of) = resolved.as_of {
                if is_expired(&self.config.expiration, encumbrance, as_of) {
                    result = classification(
                        SurvivalStatus::Expired,
                        format!("{} enforcement window has elapsed", encumbrance.kind.as_str()),
                        None,
                    );
                }
            }
        }

        (result, joined)
    }

    fn priority_rule(
        &self,
        encumbrance: &Encumbrance,
        context: &ForeclosureContext,
        resolved: &ClassificationContext,
    ) -> SurvivalClassification {
        let amount = encumbrance.amount;

        if context.foreclosure_type == ForeclosureType::TaxDeed {
            return if encumbrance.kind == EncumbranceKind::FederalTax {
                classification(SurvivalStatus::Survived, "federal tax lien survives a tax deed sale", amount)
            } else {
                classification(SurvivalStatus::Extinguished, "tax deed sale extinguishes all but federal tax liens", None)
            };
        }
        if encumbrance.kind.is_superpriority() {
            return classification(
                SurvivalStatus::Survived,
                format!("{} is superpriority", encumbrance.kind.as_str()),
                amount,
            );
        }

        let cutover = resolved.foreclosing.as_ref().map(|f| f.cutover);
        match context.foreclosure_type {
            ForeclosureType::Association => {
                let is_safe_harbor = resolved.safe_harbor_target.as_ref() == Some(&encumbrance.key);
                match cutover {
                    Some(cut) if encumbrance.recording_date > cut => classification(
                        SurvivalStatus::Extinguished,
                        "junior to the association lien",
                        None,
                    ),
                    _ if is_safe_harbor => {
                        let capped = safe_harbor_amount(
                            &self.config,
                            context.monthly_assessment,
                            context.months_unpaid,
                            encumbrance.amount,
                        );
                        classification(
                            SurvivalStatus::Survived,
                            "first mortgage survives association foreclosure; liability capped by safe harbor",
                            capped.or(amount),
                        )
                    }
                    Some(_) => classification(
                        SurvivalStatus::Survived,
                        "senior to the association lien",
                        amount,
                    ),
                    None if encumbrance.kind == EncumbranceKind::Mortgage => classification(
                        SurvivalStatus::Survived,
                        "mortgage survives association foreclosure",
                        amount,
                    ),
                    None => classification(
                        SurvivalStatus::Uncertain,
                        "association lien being foreclosed was not identified",
                        None,
                    ),
                }
            }
            ForeclosureType::FirstMortgage => match cutover {
                Some(cut) if encumbrance.recording_date < cut => classification(
                    SurvivalStatus::Survived,
                    "senior to the foreclosing mortgage",
                    amount,
                ),
                Some(cut) if encumbrance.recording_date > cut => classification(
                    SurvivalStatus::Extinguished,
                    "junior to the foreclosing mortgage",
                    None,
                ),
                Some(_) => classification(
                    SurvivalStatus::Uncertain,
                    "recorded the same day as the foreclosing mortgage",
                    None,
                ),
                None => classification(
                    SurvivalStatus::Uncertain,
                    "foreclosing mortgage was not identified",
                    None,
                ),
            },
            ForeclosureType::TaxDeed | ForeclosureType::Unknown => classification(
                SurvivalStatus::Uncertain,
                "foreclosure type unknown",
                None,
            ),
        }
    }

    /// Classify every encumbrance of a property in place
    ///
    /// # Arguments
    /// * `current` - The period with no disposition date, if the chain has one
    /// * `as_of` - Date expiration windows are measured against
    pub fn classify_all(
        &self,
        property_id: &str,
        encumbrances: &mut [Encumbrance],
        current: Option<&OwnershipPeriod>,
        context: &ForeclosureContext,
        as_of: NaiveDate,
    ) -> SurvivalRun {
        let mut run = SurvivalRun::default();
        if encumbrances.is_empty() {
            return run;
        }

        if context.foreclosure_type == ForeclosureType::Unknown {
            run.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::UnknownForeclosureType,
                context.case_number.clone(),
                "foreclosure type unknown; non-superpriority liens left uncertain",
            ));
        }
        if context.defendants.is_none() {
            run.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::MissingPartyList,
                context.case_number.clone(),
                "defendant list not extracted; joinder left unknown",
            ));
        }

        let foreclosing = self.identify_foreclosing(encumbrances, current, context, as_of);
        match &foreclosing {
            Some(f) => debug!(property_id, key = %f.key, cutover = %f.cutover, inferred = f.inference.is_some(), "Foreclosing instrument"),
            None => debug!(property_id, "No foreclosing instrument identified"),
        }

        let safe_harbor_target = if context.foreclosure_type == ForeclosureType::Association {
            encumbrances
                .iter()
                .filter(|e| {
                    e.kind == EncumbranceKind::Mortgage
                        && e.status == LienStatus::Open
                        && !is_historical(e, current)
                })
                .min_by_key(|e| e.recording_date)
                .map(|e| e.key.clone())
        } else {
            None
        };

        let resolved = ClassificationContext {
            foreclosing,
            safe_harbor_target,
            as_of: Some(as_of),
        };

        for encumbrance in encumbrances.iter_mut() {
            let (result, joined) = self.classify(encumbrance, current, context, &resolved);
            encumbrance.apply_classification(&result);
            encumbrance.is_joined = joined;

            run.classified += 1;
            if result.status == SurvivalStatus::Survived {
                run.surviving += 1;
            }
            if result.is_inferred {
                run.inferred += 1;
            }
        }

        info!(
            property_id,
            classified = run.classified,
            surviving = run.surviving,
            inferred = run.inferred,
            "Survival classified"
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocType, LinkStatus};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn enc(id: &str, kind: EncumbranceKind, recorded: NaiveDate, creditor: &str, amount: f64) -> Encumbrance {
        Encumbrance {
            property_id: "p1".into(),
            key: DocumentKey::instrument(id),
            book_page: None,
            ownership_period_id: None,
            kind,
            recording_date: recorded,
            amount: Some(amount),
            creditor: creditor.into(),
            original_creditor: creditor.into(),
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

    fn current(acquired: NaiveDate) -> OwnershipPeriod {
        OwnershipPeriod {
            property_id: "p1".into(),
            sequence: 1,
            acquisition_date: acquired,
            disposition_date: None,
            owner_names: vec!["DOE JANE".into()],
            owner_identity: "DOE JANE".into(),
            grantor_names: vec![],
            acquisition_doc_type: DocType::WarrantyDeed,
            acquisition_instrument: None,
            is_root_of_title: false,
            link_status: LinkStatus::Root,
            self_transfers: vec![],
        }
    }

    fn status_of(encs: &[Encumbrance], id: &str) -> Option<SurvivalStatus> {
        encs.iter()
            .find(|e| e.key == DocumentKey::instrument(id))
            .and_then(|e| e.survival_status)
    }

    #[test]
    fn test_first_mortgage_scenario() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 300_000.0),
            enc("2018-1", EncumbranceKind::Mortgage, ymd(2018, 6, 1), "SECOND CREDIT UNION", 50_000.0),
            enc("2023-1", EncumbranceKind::PropertyTax, ymd(2023, 11, 1), "COUNTY TAX COLLECTOR", 4_200.0),
        ];
        let mut context = ForeclosureContext::new(ForeclosureType::FirstMortgage)
            .with_plaintiff("FIRST NATIONAL BANK")
            .with_defendants(vec!["DOE JANE".into(), "SECOND CREDIT UNION".into()]);
        context.filing_date = Some(ymd(2022, 4, 1));

        let run = engine.classify_all("p1", &mut encs, Some(&current(ymd(2010, 5, 1))), &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2015-1"), Some(SurvivalStatus::Foreclosing));
        assert_eq!(status_of(&encs, "2018-1"), Some(SurvivalStatus::Extinguished));
        assert_eq!(status_of(&encs, "2023-1"), Some(SurvivalStatus::Survived));
        assert_eq!(encs[1].is_joined, Some(true));
        assert_eq!(run.classified, 3);
        assert_eq!(run.inferred, 0);
    }

    #[test]
    fn test_inferred_foreclosing_mortgage() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2012-1", EncumbranceKind::Mortgage, ymd(2012, 1, 1), "LENDER A", 100_000.0),
            enc("2016-1", EncumbranceKind::Mortgage, ymd(2016, 1, 1), "LENDER B", 200_000.0),
            enc("2023-1", EncumbranceKind::Mortgage, ymd(2023, 1, 1), "LENDER C", 10_000.0),
        ];
        let mut context = ForeclosureContext::new(ForeclosureType::FirstMortgage)
            .with_plaintiff("UNRELATED SERVICER");
        context.filing_date = Some(ymd(2022, 4, 1));

        let run = engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2016-1"), Some(SurvivalStatus::Foreclosing));
        assert!(encs[1].is_inferred);
        assert!(encs[1].survival_reason.as_deref().unwrap().contains("inferred"));
        assert_eq!(status_of(&encs, "2012-1"), Some(SurvivalStatus::Survived));
        assert_eq!(status_of(&encs, "2023-1"), Some(SurvivalStatus::Extinguished));
        assert_eq!(run.inferred, 1);
    }

    #[test]
    fn test_association_safe_harbor() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 300_000.0),
            enc("2021-1", EncumbranceKind::AssociationLien, ymd(2021, 2, 1), "PALM ESTATES HOMEOWNERS ASSOCIATION INC", 9_600.0),
            enc("2022-1", EncumbranceKind::JudgmentLien, ymd(2022, 2, 1), "ACME COLLECTIONS LLC", 5_000.0),
        ];
        let mut context = ForeclosureContext::new(ForeclosureType::Association)
            .with_plaintiff("PALM ESTATES HOMEOWNERS ASSOCIATION INC")
            .with_defendants(vec!["DOE JANE".into(), "FIRST NATIONAL BANK".into(), "ACME COLLECTIONS LLC".into()]);
        context.monthly_assessment = Some(400.0);
        context.months_unpaid = Some(24);

        engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2015-1"), Some(SurvivalStatus::Survived));
        assert_eq!(encs[0].surviving_amount, Some(3_000.0));
        assert_eq!(status_of(&encs, "2021-1"), Some(SurvivalStatus::Foreclosing));
        assert_eq!(status_of(&encs, "2022-1"), Some(SurvivalStatus::Extinguished));
    }

    #[test]
    fn test_historical_and_satisfied() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut satisfied = enc("2012-1", EncumbranceKind::Mortgage, ymd(2012, 1, 1), "LENDER A", 1.0);
        satisfied.status = LienStatus::Satisfied;
        let mut encs = vec![
            enc("2001-1", EncumbranceKind::Mortgage, ymd(2001, 1, 1), "OLD LENDER", 1.0),
            satisfied,
        ];
        let context = ForeclosureContext::new(ForeclosureType::FirstMortgage);

        engine.classify_all("p1", &mut encs, Some(&current(ymd(2010, 5, 1))), &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2001-1"), Some(SurvivalStatus::Historical));
        assert_eq!(status_of(&encs, "2012-1"), Some(SurvivalStatus::Satisfied));
    }

    #[test]
    fn test_joinder_unknown_without_party_list() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 1.0),
            enc("2018-1", EncumbranceKind::Mortgage, ymd(2018, 6, 1), "SECOND CREDIT UNION", 1.0),
        ];
        let context = ForeclosureContext::new(ForeclosureType::FirstMortgage)
            .with_plaintiff("FIRST NATIONAL BANK");

        let run = engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(encs[1].is_joined, None);
        assert_eq!(status_of(&encs, "2018-1"), Some(SurvivalStatus::Extinguished));
        assert!(run.warnings.iter().any(|w| w.kind == WarningKind::MissingPartyList));
    }

    #[test]
    fn test_omitted_junior_survives() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 1.0),
            enc("2018-1", EncumbranceKind::Mortgage, ymd(2018, 6, 1), "SECOND CREDIT UNION", 1.0),
        ];
        let context = ForeclosureContext::new(ForeclosureType::FirstMortgage)
            .with_plaintiff("FIRST NATIONAL BANK")
            .with_defendants(vec!["DOE JANE".into()]);

        engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(encs[1].is_joined, Some(false));
        assert_eq!(status_of(&encs, "2018-1"), Some(SurvivalStatus::Survived));
    }

    #[test]
    fn test_tax_deed_keeps_only_federal() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 1.0),
            enc("2020-1", EncumbranceKind::FederalTax, ymd(2020, 1, 1), "UNITED STATES OF AMERICA", 1.0),
            enc("2021-1", EncumbranceKind::CodeEnforcement, ymd(2021, 1, 1), "CITY OF PALM BAY", 1.0),
        ];
        let context = ForeclosureContext::new(ForeclosureType::TaxDeed).with_defendants(vec![]);

        engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2015-1"), Some(SurvivalStatus::Extinguished));
        assert_eq!(status_of(&encs, "2020-1"), Some(SurvivalStatus::Survived));
        assert_eq!(status_of(&encs, "2021-1"), Some(SurvivalStatus::Extinguished));
    }

    #[test]
    fn test_expired_judgment() {
        let engine = SurvivalEngine::new(SurvivalConfig::default());
        let mut encs = vec![
            enc("2005-1", EncumbranceKind::JudgmentLien, ymd(2005, 1, 1), "ACME COLLECTIONS LLC", 1.0),
            enc("2015-1", EncumbranceKind::Mortgage, ymd(2015, 3, 1), "FIRST NATIONAL BANK", 1.0),
        ];
        let context = ForeclosureContext::new(ForeclosureType::FirstMortgage)
            .with_plaintiff("FIRST NATIONAL BANK")
            .with_defendants(vec![]);

        engine.classify_all("p1", &mut encs, None, &context, ymd(2024, 1, 1));

        assert_eq!(status_of(&encs, "2005-1"), Some(SurvivalStatus::Expired));
    }
}
