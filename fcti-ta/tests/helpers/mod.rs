//! Test helper utilities
//!
//! Shared fixtures for the fcti-ta integration tests: a scripted registry,
//! document builders and a fully wired service over in-memory SQLite.

#![allow(dead_code)]

use chrono::NaiveDate;
use fcti_common::events::EventBus;
use fcti_ta::config::{DiscoveryConfig, RegistryConfig, SurvivalConfig};
use fcti_ta::discovery::DiscoveryEngine;
use fcti_ta::extractor::{DocumentTextExtractor, RuleBasedExtractor};
use fcti_ta::models::task::normalize_term;
use fcti_ta::models::{DocType, Document, TaskType};
use fcti_ta::registry::channels::ChannelPolicy;
use fcti_ta::registry::{
    DocumentRegistry, DocumentSummary, RegistryChannels, RegistryError, SearchQuery,
};
use fcti_ta::store::{SqliteTitleStore, TitleStore, WriteGate};
use fcti_ta::survival::SurvivalEngine;
use fcti_ta::TitleAnalysisService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PROPERTY: &str = "01-3022-005-0050";
pub const LEGAL: &str = "LOT 5 BLOCK 3 PALM ESTATES";

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Registry answering from a fixed script
///
/// Responses are keyed by `(task type, term)`; anything unscripted returns
/// no documents. Terms can be made to answer with a rate limit a fixed
/// number of times first.
pub struct ScriptedRegistry {
    name: String,
    responses: Mutex<HashMap<(TaskType, String), Vec<DocumentSummary>>>,
    rate_limits: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<SearchQuery>>,
}

impl ScriptedRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(HashMap::new()),
            rate_limits: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, task_type: TaskType, term: &str, documents: Vec<DocumentSummary>) {
        self.responses
            .lock()
            .unwrap()
            .insert((task_type, normalize_term(term)), documents);
    }

    pub fn rate_limit(&self, term: &str, times: u32) {
        self.rate_limits
            .lock()
            .unwrap()
            .insert(normalize_term(term), times);
    }

    pub fn calls(&self) -> Vec<SearchQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_searched(&self, task_type: TaskType, term: &str) -> bool {
        let term = normalize_term(term);
        self.calls()
            .iter()
            .any(|q| q.task_type == task_type && q.term == term)
    }
}

#[async_trait::async_trait]
impl DocumentRegistry for ScriptedRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<DocumentSummary>, RegistryError> {
        self.calls.lock().unwrap().push(query.clone());
        if let Some(remaining) = self.rate_limits.lock().unwrap().get_mut(&query.term) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RegistryError::RateLimited {
                    retry_after_secs: Some(0),
                });
            }
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&(query.task_type, query.term.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Registry search hit
pub fn summary(instrument: &str, recorded: &str, code: &str, one: &[&str], two: &[&str]) -> DocumentSummary {
    DocumentSummary {
        instrument: Some(instrument.to_string()),
        recorded_raw: Some(recorded.to_string()),
        doc_type_code: code.to_string(),
        party_one: one.iter().map(|s| s.to_string()).collect(),
        party_two: two.iter().map(|s| s.to_string()).collect(),
        legal_text: Some(LEGAL.to_string()),
        ..Default::default()
    }
}

/// Stored document, as discovery would have persisted it
pub fn document(instrument: &str, date: NaiveDate, code: &str, one: &[&str], two: &[&str]) -> Document {
    Document {
        property_id: PROPERTY.to_string(),
        instrument: Some(instrument.to_string()),
        book: None,
        page: None,
        recording_date: Some(date),
        doc_type: DocType::from_code(code),
        doc_type_code: code.to_string(),
        party_one: one.iter().map(|s| s.to_string()).collect(),
        party_two: two.iter().map(|s| s.to_string()).collect(),
        legal_text: Some(LEGAL.to_string()),
        amount: None,
        case_number: None,
        maturity_date: None,
        referenced_instruments: Vec::new(),
        is_self_transfer: false,
        raw_text: None,
        discovered_by: None,
    }
}

pub fn with_amount(mut document: Document, amount: f64) -> Document {
    document.amount = Some(amount);
    document
}

/// Discovery limits for tests: one search per pass, no backoff
pub fn fast_discovery() -> DiscoveryConfig {
    DiscoveryConfig {
        per_property_concurrency: 1,
        base_backoff_secs: 0,
        max_backoff_secs: 0,
        ..DiscoveryConfig::default()
    }
}

pub struct Harness {
    pub service: TitleAnalysisService,
    pub store: Arc<dyn TitleStore>,
    pub gate: Arc<WriteGate>,
    pub events: EventBus,
    pub registry: Arc<ScriptedRegistry>,
}

/// Fully wired service over in-memory SQLite and a scripted registry
pub async fn harness(registry: Arc<ScriptedRegistry>, discovery: DiscoveryConfig) -> Harness {
    let store: Arc<dyn TitleStore> = Arc::new(
        SqliteTitleStore::in_memory()
            .await
            .expect("Failed to create in-memory store"),
    );
    let gate = Arc::new(WriteGate::new());
    let events = EventBus::new(256);

    let policy = ChannelPolicy::from_config(&RegistryConfig::default(), &discovery);
    let primary: Arc<dyn DocumentRegistry> = registry.clone();
    let channels = Arc::new(RegistryChannels::new(primary, None, policy));
    let extractor: Arc<dyn DocumentTextExtractor> = Arc::new(RuleBasedExtractor::new());

    let engine = Arc::new(DiscoveryEngine::new(
        channels,
        Arc::clone(&extractor),
        Arc::clone(&store),
        Arc::clone(&gate),
        events.clone(),
        discovery,
    ));
    let service = TitleAnalysisService::new(
        Arc::clone(&store),
        Arc::clone(&gate),
        events.clone(),
        engine,
        extractor,
        SurvivalEngine::new(SurvivalConfig::default()),
        2,
    )
    .with_as_of(ymd(2024, 6, 1));

    Harness {
        service,
        store,
        gate,
        events,
        registry,
    }
}
