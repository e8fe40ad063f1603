//! End-to-end title analysis
//!
//! `TitleAnalysisService` runs discovery, resolves the foreclosure context,
//! rebuilds the chain and classifies survival for one property, and fans
//! that out over a bounded worker pool for batches.

use crate::chain::rebuild_chain;
use crate::discovery::{DiscoveryEngine, DiscoveryReport, PropertySeed};
use crate::error::{TitleError, TitleResult};
use crate::extractor::{DocumentTextExtractor, Extraction, ExtractedFields};
use crate::identity::IdentityLinker;
use crate::legal::{self, ParsedLegal};
use crate::models::{
    ChainGap, DataQualityWarning, DocType, Document, Encumbrance, ForeclosureContext,
    ForeclosureType, OwnershipPeriod, Property,
};
use crate::store::{TitleStore, WriteGate};
use crate::survival::{analyze_survival, EquityEstimate, SurvivalEngine};
use chrono::{NaiveDate, Utc};
use fcti_common::events::{DiscoveryState, EventBus, TitleEvent};
use fcti_common::time::today;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Minimum sleep before re-running a deferred property
const MIN_DEFER_WAIT: Duration = Duration::from_millis(200);

/// Outcome of one property's analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub property_id: String,
    pub discovery: DiscoveryReport,
    pub periods: usize,
    pub gaps: usize,
    pub encumbrances: usize,
    pub preserved_classifications: usize,
    pub chain_complete: bool,
    pub survival_complete: bool,
    pub surviving: usize,
}

impl AnalysisReport {
    fn discovery_only(discovery: DiscoveryReport) -> Self {
        Self {
            property_id: discovery.property_id.clone(),
            discovery,
            periods: 0,
            gaps: 0,
            encumbrances: 0,
            preserved_classifications: 0,
            chain_complete: false,
            survival_complete: false,
            surviving: 0,
        }
    }
}

/// Ownership period with its persisted identity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodView {
    pub id: Uuid,
    #[serde(flatten)]
    pub period: OwnershipPeriod,
}

/// Everything downstream consumers read about one property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleReport {
    pub property: Property,
    pub foreclosure: Option<ForeclosureContext>,
    pub periods: Vec<PeriodView>,
    pub gaps: Vec<ChainGap>,
    pub encumbrances: Vec<Encumbrance>,
    pub equity: EquityEstimate,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Clone)]
pub struct TitleAnalysisService {
    store: Arc<dyn TitleStore>,
    gate: Arc<WriteGate>,
    events: EventBus,
    discovery: Arc<DiscoveryEngine>,
    extractor: Arc<dyn DocumentTextExtractor>,
    survival: Arc<SurvivalEngine>,
    worker_pool_size: usize,
    /// Fixed evaluation date; `None` means today
    as_of: Option<NaiveDate>,
}

impl TitleAnalysisService {
    pub fn new(
        store: Arc<dyn TitleStore>,
        gate: Arc<WriteGate>,
        events: EventBus,
        discovery: Arc<DiscoveryEngine>,
        extractor: Arc<dyn DocumentTextExtractor>,
        survival: SurvivalEngine,
        worker_pool_size: usize,
    ) -> Self {
        Self {
            store,
            gate,
            events,
            discovery,
            extractor,
            survival: Arc::new(survival),
            worker_pool_size: worker_pool_size.max(1),
            as_of: None,
        }
    }

    /// Evaluate expirations and inference against a fixed date
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    fn as_of(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(today)
    }

    /// Discover, rebuild and classify one property
    ///
    /// Cancelled, deferred and unresolvable discovery runs stop before the
    /// chain is touched. Survival runs only over a chain that produced
    /// periods.
    ///
    /// # Errors
    /// Store failures (`Common`) and structural failures of a rebuild or
    /// classification step.
    pub async fn analyze_property(
        &self,
        seed: &PropertySeed,
        cancel: &CancellationToken,
    ) -> TitleResult<AnalysisReport> {
        let property_id = seed.property_id.as_str();
        let discovery = self.discovery.run(seed, cancel).await?;
        if matches!(
            discovery.state,
            DiscoveryState::Cancelled | DiscoveryState::Deferred | DiscoveryState::Unresolvable
        ) {
            info!(property_id, state = discovery.state.as_str(), "Analysis stopped after discovery");
            let report = AnalysisReport::discovery_only(discovery);
            self.emit_finished(property_id, report.discovery.state).await?;
            return Ok(report);
        }

        let context = self.resolve_foreclosure(seed).await?;

        let target = self.target_legal(property_id).await?;
        let linker = IdentityLinker::from_identities(self.store.load_identities(property_id).await?);
        self.refresh_self_transfers(property_id, &linker).await?;
        let rebuilt = rebuild_chain(
            self.store.as_ref(),
            &self.gate,
            &self.events,
            property_id,
            target.as_ref(),
            &linker,
        )
        .await?;

        let mut report = AnalysisReport::discovery_only(discovery);
        report.periods = rebuilt.periods.len();
        report.gaps = rebuilt.gaps.len();
        report.encumbrances = rebuilt.encumbrances.len();
        report.preserved_classifications = rebuilt.preserved;
        report.chain_complete = rebuilt.chain_complete();

        if report.chain_complete {
            let run = analyze_survival(
                &self.survival,
                self.store.as_ref(),
                &self.gate,
                &self.events,
                property_id,
                &context,
                self.as_of(),
            )
            .await?;
            report.survival_complete = run.classified == report.encumbrances;
            report.surviving = run.surviving;
        } else {
            warn!(
                property_id,
                discovery_state = report.discovery.state.as_str(),
                documents = report.discovery.documents,
                "Chain produced no ownership periods; survival not classified"
            );
        }

        self.emit_finished(property_id, report.discovery.state).await?;
        Ok(report)
    }

    /// Run many properties on a bounded worker pool
    ///
    /// A deferred property gives its worker back while it waits for its
    /// backoff to elapse, then queues for a worker again. Cancellation
    /// stops new work; running properties keep their partial state.
    pub async fn run_batch(
        &self,
        seeds: Vec<PropertySeed>,
        cancel: CancellationToken,
    ) -> Vec<(String, TitleResult<AnalysisReport>)> {
        let workers = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut set = JoinSet::new();
        for seed in seeds {
            let service = self.clone();
            let workers = Arc::clone(&workers);
            let cancel = cancel.clone();
            set.spawn(async move {
                let result = service.run_until_settled(&seed, &workers, &cancel).await;
                (seed.property_id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Property analysis task panicked: {}", e),
            }
        }
        results
    }

    async fn run_until_settled(
        &self,
        seed: &PropertySeed,
        workers: &Semaphore,
        cancel: &CancellationToken,
    ) -> TitleResult<AnalysisReport> {
        loop {
            let report = {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return Err(TitleError::Cancelled),
                    permit = workers.acquire() => permit.map_err(|_| TitleError::Cancelled)?,
                };
                self.analyze_property(seed, cancel).await?
            };
            if report.discovery.state != DiscoveryState::Deferred {
                return Ok(report);
            }

            let wait = report
                .discovery
                .retry_at
                .and_then(|at| (at - Utc::now()).to_std().ok())
                .unwrap_or_default()
                .max(MIN_DEFER_WAIT);
            info!(
                property_id = %seed.property_id,
                wait_ms = wait.as_millis() as u64,
                "Property deferred; releasing worker"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Ok(report),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Assemble the read model for one property
    ///
    /// # Errors
    /// `fcti_common::Error::NotFound` when the property was never analysed.
    pub async fn title_report(&self, property_id: &str) -> TitleResult<TitleReport> {
        let property = self
            .store
            .load_property(property_id)
            .await?
            .ok_or_else(|| fcti_common::Error::NotFound(format!("property {}", property_id)))?;
        let foreclosure = self.store.load_foreclosure_context(property_id).await?;
        let periods = self
            .store
            .load_periods(property_id)
            .await?
            .into_iter()
            .map(|p| PeriodView {
                id: p.id(),
                period: p.period().clone(),
            })
            .collect();
        let gaps = self.store.load_gaps(property_id).await?;
        let encumbrances = self.store.load_encumbrances(property_id).await?;
        let warnings = self.store.load_warnings(property_id).await?;
        let equity = EquityEstimate::compute(
            foreclosure.as_ref().and_then(|f| f.market_value),
            &encumbrances,
        );

        Ok(TitleReport {
            property,
            foreclosure,
            periods,
            gaps,
            encumbrances,
            equity,
            warnings,
        })
    }

    /// Seed context, else stored context, else unknown; then fill gaps from
    /// the property's lis pendens
    async fn resolve_foreclosure(&self, seed: &PropertySeed) -> TitleResult<ForeclosureContext> {
        let property_id = seed.property_id.as_str();
        let mut context = match &seed.foreclosure {
            Some(context) => context.clone(),
            None => self
                .store
                .load_foreclosure_context(property_id)
                .await?
                .unwrap_or_else(|| ForeclosureContext::new(ForeclosureType::Unknown)),
        };
        if context.case_number.is_none() {
            context.case_number = seed.case_number.clone();
        }

        let documents = self.store.load_documents(property_id).await?;
        if let Some(lis_pendens) = latest_lis_pendens(&documents, context.case_number.as_deref()) {
            if let Extraction::Structured(fields) = self.extractor.extract(lis_pendens).await {
                enrich_from_lis_pendens(&mut context, lis_pendens, fields);
            }
        }

        let _guard = self.gate.lock(property_id).await;
        self.store.save_foreclosure_context(property_id, &context).await?;
        Ok(context)
    }

    /// Mark deeds whose sides only became the same identity after ingest
    ///
    /// # Returns
    /// Number of deeds updated.
    async fn refresh_self_transfers(&self, property_id: &str, linker: &IdentityLinker) -> TitleResult<usize> {
        let _guard = self.gate.lock(property_id).await;
        let mut updated = 0;
        for mut deed in self
            .store
            .load_documents(property_id)
            .await?
            .into_iter()
            .filter(|d| d.doc_type.is_deed() && !d.is_self_transfer)
        {
            if linker.confidently_same_party(deed.grantors(), deed.grantees()) {
                deed.is_self_transfer = true;
                self.store.update_document(&deed).await?;
                updated += 1;
            }
        }
        if updated > 0 {
            info!(property_id, updated, "Deeds reclassified as self-transfers");
        }
        Ok(updated)
    }

    async fn target_legal(&self, property_id: &str) -> TitleResult<Option<ParsedLegal>> {
        Ok(self
            .store
            .load_legal_variations(property_id)
            .await?
            .iter()
            .map(|v| legal::parse(&v.text))
            .find(|parsed| !parsed.is_empty()))
    }

    async fn emit_finished(&self, property_id: &str, discovery_state: DiscoveryState) -> TitleResult<()> {
        let property = self
            .store
            .load_property(property_id)
            .await?
            .unwrap_or_else(|| Property::new(property_id));
        self.events.emit_lossy(TitleEvent::AnalysisFinished {
            property_id: property_id.to_string(),
            discovery_state,
            chain_complete: property.chain_complete,
            survival_complete: property.survival_complete,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

/// Most recent lis pendens, preferring one filed under `case_number`
fn latest_lis_pendens<'a>(documents: &'a [Document], case_number: Option<&str>) -> Option<&'a Document> {
    let filings = || {
        documents
            .iter()
            .filter(|d| d.doc_type == DocType::LisPendens)
    };
    case_number
        .and_then(|case| {
            filings()
                .filter(|d| d.case_number.as_deref() == Some(case))
                .max_by_key(|d| d.recording_date)
        })
        .or_else(|| filings().max_by_key(|d| d.recording_date))
}

/// Fill context fields the caller did not supply from a lis pendens
///
/// Caller-supplied values always win. A defendant list is only set when
/// the filing actually named defendants.
pub fn enrich_from_lis_pendens(
    context: &mut ForeclosureContext,
    lis_pendens: &Document,
    fields: ExtractedFields,
) {
    if context.plaintiff.is_none() {
        context.plaintiff = fields
            .plaintiff
            .or_else(|| lis_pendens.party_one.first().cloned());
    }
    if context.defendants.is_none() {
        let defendants = if fields.defendants.is_empty() {
            lis_pendens.party_two.clone()
        } else {
            fields.defendants
        };
        if !defendants.is_empty() {
            context.defendants = Some(defendants);
        }
    }
    if context.foreclosed_instruments.is_empty() {
        context.foreclosed_instruments = fields.foreclosed_instruments;
    }
    if context.filing_date.is_none() {
        context.filing_date = lis_pendens.recording_date;
    }
    if context.case_number.is_none() {
        context.case_number = fields.case_number.or_else(|| lis_pendens.case_number.clone());
    }
    if context.foreclosure_type == ForeclosureType::Unknown {
        if let Some(text) = lis_pendens.raw_text.as_deref() {
            context.foreclosure_type = ForeclosureType::from_description(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKey;

    fn lis_pendens(case: &str, date: NaiveDate) -> Document {
        Document {
            property_id: "p1".into(),
            instrument: Some(format!("LP-{}", case)),
            book: None,
            page: None,
            recording_date: Some(date),
            doc_type: DocType::LisPendens,
            doc_type_code: "LP".into(),
            party_one: vec!["FIRST NATIONAL LENDER".into()],
            party_two: vec!["DOE JANE".into()],
            legal_text: None,
            amount: None,
            case_number: Some(case.into()),
            maturity_date: None,
            referenced_instruments: vec![],
            is_self_transfer: false,
            raw_text: Some("NOTICE OF LIS PENDENS to foreclose the mortgage".into()),
            discovered_by: None,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_enrich_fills_only_missing_fields() {
        let doc = lis_pendens("2022-CA-001234", ymd(2022, 5, 1));
        let mut context = ForeclosureContext::new(ForeclosureType::Unknown).with_plaintiff("CALLER BANK");
        let fields = ExtractedFields {
            plaintiff: Some("FIRST NATIONAL LENDER".into()),
            foreclosed_instruments: vec![DocumentKey::instrument("2015-0001")],
            ..Default::default()
        };
        enrich_from_lis_pendens(&mut context, &doc, fields);

        assert_eq!(context.plaintiff.as_deref(), Some("CALLER BANK"));
        assert_eq!(context.defendants, Some(vec!["DOE JANE".to_string()]));
        assert_eq!(context.filing_date, Some(ymd(2022, 5, 1)));
        assert_eq!(context.case_number.as_deref(), Some("2022-CA-001234"));
        assert_eq!(context.foreclosure_type, ForeclosureType::FirstMortgage);
        assert_eq!(context.foreclosed_instruments, vec![DocumentKey::instrument("2015-0001")]);
    }

    #[test]
    fn test_empty_party_list_stays_unknown() {
        let mut doc = lis_pendens("2022-CA-1", ymd(2022, 5, 1));
        doc.party_two.clear();
        let mut context = ForeclosureContext::new(ForeclosureType::Association);
        enrich_from_lis_pendens(&mut context, &doc, ExtractedFields::default());
        assert_eq!(context.defendants, None);
        assert_eq!(context.foreclosure_type, ForeclosureType::Association);
    }

    #[test]
    fn test_lis_pendens_prefers_matching_case() {
        let docs = vec![
            lis_pendens("2019-CA-000001", ymd(2019, 1, 1)),
            lis_pendens("2023-CA-000009", ymd(2023, 1, 1)),
        ];
        let picked = latest_lis_pendens(&docs, Some("2019-CA-000001")).unwrap();
        assert_eq!(picked.case_number.as_deref(), Some("2019-CA-000001"));
        let picked = latest_lis_pendens(&docs, None).unwrap();
        assert_eq!(picked.case_number.as_deref(), Some("2023-CA-000009"));
    }
}
