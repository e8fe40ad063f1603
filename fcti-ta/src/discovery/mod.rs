//! Discovery engine
//!
//! Drives one property's search frontier against the registry until the
//! deed chain is long enough, the frontier runs dry, or a safety cap trips.
//!
//! ```text
//! Initializing ──► Discovering ──► Complete | Exhausted | Capped
//!                       │
//!                       ├──► Deferred   (only backed-off tasks left)
//!                       └──► Cancelled  (token fired; state kept)
//! ```
//!
//! A property with nothing searchable ends in `Unresolvable`. Each loop
//! pass claims up to `per_property_concurrency` tasks, runs their searches
//! concurrently, folds the results into the property's context and then
//! persists everything that changed behind the property's write gate.

pub mod context;
pub mod ingest;
pub mod seeds;

pub use context::PropertyContext;
pub use ingest::{ingest_results, merge_fields};
pub use seeds::{seed_context, PartyRole, PropertySeed, SeedLegal, SeedParty};

use crate::config::DiscoveryConfig;
use crate::error::TitleResult;
use crate::extractor::DocumentTextExtractor;
use crate::frontier::RetryPolicy;
use crate::legal::{self, same_subdivision};
use crate::models::{DataQualityWarning, SearchTask, TaskStatus, TaskType, WarningKind};
use crate::registry::{ChannelOutcome, RegistryChannels, SearchQuery};
use crate::store::{TitleStore, WriteGate};
use chrono::{DateTime, Utc};
use fcti_common::events::{DiscoveryState, EventBus, TitleEvent};
use fcti_common::time::today;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a discovery run stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub property_id: String,
    pub state: DiscoveryState,
    pub iterations: u32,
    pub searches: u32,
    pub documents: usize,
    pub new_documents: usize,
    /// When a deferred run can usefully resume
    pub retry_at: Option<DateTime<Utc>>,
}

/// Per-property discovery driver
///
/// Holds only shared collaborators; all per-property state lives in a
/// `PropertyContext` created for each run.
pub struct DiscoveryEngine {
    channels: Arc<RegistryChannels>,
    extractor: Arc<dyn DocumentTextExtractor>,
    store: Arc<dyn TitleStore>,
    gate: Arc<WriteGate>,
    events: EventBus,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(
        channels: Arc<RegistryChannels>,
        extractor: Arc<dyn DocumentTextExtractor>,
        store: Arc<dyn TitleStore>,
        gate: Arc<WriteGate>,
        events: EventBus,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            channels,
            extractor,
            store,
            gate,
            events,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run (or resume) discovery for one property
    ///
    /// # Returns
    /// The state the run stopped in. `Deferred` and `Cancelled` are not
    /// final: calling `run` again picks up the persisted frontier.
    ///
    /// # Errors
    /// Store failures while loading or persisting.
    pub async fn run(
        &self,
        seed: &PropertySeed,
        cancel: &CancellationToken,
    ) -> TitleResult<DiscoveryReport> {
        let policy = RetryPolicy::from_config(&self.config);
        let mut ctx = PropertyContext::load(self.store.as_ref(), &seed.property_id, policy).await?;
        seed_context(&mut ctx, seed, self.config.lookback_years, today());

        if ctx.frontier.tasks().is_empty() && ctx.documents().is_empty() {
            warn!(property_id = %seed.property_id, "Nothing searchable for property");
            self.transition(&mut ctx, DiscoveryState::Unresolvable);
            self.persist(&mut ctx).await?;
            return Ok(self.report(&ctx, None));
        }

        self.transition(&mut ctx, DiscoveryState::Discovering);
        self.persist(&mut ctx).await?;

        let mut retry_at = None;
        let state = loop {
            if cancel.is_cancelled() {
                break DiscoveryState::Cancelled;
            }
            if ctx.deed_coverage_complete(self.config.lookback_years, today()) {
                break DiscoveryState::Complete;
            }
            if self.capped(&ctx) {
                warn!(
                    property_id = %ctx.property_id(),
                    iterations = ctx.iterations,
                    documents = ctx.documents().len(),
                    searches = ctx.searches,
                    "Discovery safety cap reached"
                );
                break DiscoveryState::Capped;
            }

            let batch = ctx
                .frontier
                .next_batch(Utc::now(), self.config.per_property_concurrency.max(1));
            if batch.is_empty() {
                if ctx.frontier.has_retryable() {
                    retry_at = ctx.frontier.next_retry_at();
                    break DiscoveryState::Deferred;
                }
                break DiscoveryState::Exhausted;
            }

            ctx.iterations += 1;
            let searches = batch.iter().map(|task| {
                let query = SearchQuery::from(task);
                let channels = Arc::clone(&self.channels);
                async move { channels.search(&query).await }
            });
            let outcomes = tokio::select! {
                _ = cancel.cancelled() => None,
                outcomes = join_all(searches) => Some(outcomes),
            };
            let Some(outcomes) = outcomes else {
                break DiscoveryState::Cancelled;
            };

            for (task, outcome) in batch.into_iter().zip(outcomes) {
                self.handle_outcome(&mut ctx, task, outcome).await;
            }
            self.persist(&mut ctx).await?;
        };

        if ctx.documents().is_empty() && state == DiscoveryState::Exhausted {
            warn!(property_id = %ctx.property_id(), "Discovery exhausted without finding any document");
        }
        self.transition(&mut ctx, state);
        self.persist(&mut ctx).await?;

        let report = self.report(&ctx, retry_at);
        info!(
            property_id = %report.property_id,
            state = report.state.as_str(),
            iterations = report.iterations,
            searches = report.searches,
            documents = report.documents,
            new_documents = report.new_documents,
            "Discovery run finished"
        );
        Ok(report)
    }

    fn capped(&self, ctx: &PropertyContext) -> bool {
        ctx.iterations >= self.config.max_iterations
            || ctx.documents().len() >= self.config.max_documents
            || ctx.searches >= self.config.max_searches
    }

    async fn handle_outcome(&self, ctx: &mut PropertyContext, task: SearchTask, outcome: ChannelOutcome) {
        let key = task.key();
        let label = task.describe();
        ctx.searches += 1;

        match outcome.result {
            Ok(summaries) => {
                let returned = summaries.len();
                let added = ingest_results(ctx, self.extractor.as_ref(), summaries, &label).await;
                ctx.frontier.mark_completed(&key, added as u32);
                debug!(
                    property_id = %ctx.property_id(),
                    task = %label,
                    channel = %outcome.channel,
                    returned,
                    added,
                    "Search completed"
                );
                if added > 0 {
                    self.events.emit_lossy(TitleEvent::DocumentsDiscovered {
                        property_id: ctx.property_id().to_string(),
                        task_type: task.task_type.as_str().to_string(),
                        term: task.term.clone(),
                        new_documents: added,
                        total_documents: ctx.documents().len(),
                        timestamp: Utc::now(),
                    });
                    if task.task_type == TaskType::LegalText {
                        cancel_broad_legal(ctx, &task);
                    }
                }
            }
            Err(err) if err.is_rate_limit() => {
                let backoff = ctx
                    .frontier
                    .mark_rate_limited(&key, outcome.wait, Utc::now())
                    .unwrap_or_default();
                info!(
                    property_id = %ctx.property_id(),
                    task = %label,
                    channel = %outcome.channel,
                    backoff_secs = backoff.as_secs(),
                    "Search rate limited"
                );
                self.events.emit_lossy(TitleEvent::SearchRateLimited {
                    property_id: ctx.property_id().to_string(),
                    channel: outcome.channel,
                    backoff_seconds: backoff.as_secs(),
                    timestamp: Utc::now(),
                });
            }
            Err(err) => {
                let message = err.to_string();
                warn!(property_id = %ctx.property_id(), task = %label, error = %message, "Search failed");
                if ctx.frontier.mark_failed(&key, &message) == Some(TaskStatus::Failed) {
                    ctx.warn(DataQualityWarning::new(
                        ctx.property_id(),
                        WarningKind::SearchFailed,
                        Some(label),
                        message,
                    ));
                }
            }
        }
    }

    fn transition(&self, ctx: &mut PropertyContext, new_state: DiscoveryState) {
        let old_state = ctx.property.discovery_state;
        if old_state == new_state {
            return;
        }
        debug!(
            property_id = %ctx.property_id(),
            from = old_state.as_str(),
            to = new_state.as_str(),
            "Discovery state change"
        );
        ctx.property.discovery_state = new_state;
        self.events.emit_lossy(TitleEvent::DiscoveryStateChanged {
            property_id: ctx.property_id().to_string(),
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    /// Write everything the context changed since the last persist
    async fn persist(&self, ctx: &mut PropertyContext) -> TitleResult<()> {
        let _guard = self.gate.lock(ctx.property_id()).await;
        let store = self.store.as_ref();

        for document in ctx.take_unsaved_documents() {
            store.insert_document(&document).await?;
        }
        let tasks = ctx.frontier.take_dirty();
        if !tasks.is_empty() {
            store.upsert_tasks(&tasks).await?;
        }
        for variation in ctx.take_dirty_variations() {
            store.upsert_legal_variation(&variation).await?;
        }
        let identities = ctx.linker.take_dirty();
        if !identities.is_empty() {
            store.upsert_identities(ctx.property_id(), &identities).await?;
        }
        for warning in ctx.take_warnings() {
            store.add_warning(&warning).await?;
        }
        ctx.property.updated_at = Utc::now();
        store.upsert_property(&ctx.property).await?;
        Ok(())
    }

    fn report(&self, ctx: &PropertyContext, retry_at: Option<DateTime<Utc>>) -> DiscoveryReport {
        DiscoveryReport {
            property_id: ctx.property_id().to_string(),
            state: ctx.property.discovery_state,
            iterations: ctx.iterations,
            searches: ctx.searches,
            documents: ctx.documents().len(),
            new_documents: ctx.new_documents,
            retry_at,
        }
    }
}

/// Drop pending broad legal searches once a narrow one found new documents
///
/// Only searches for the same subdivision that name no lot or unit are
/// cancelled; the completed task itself must have been lot or unit specific.
fn cancel_broad_legal(ctx: &mut PropertyContext, completed: &SearchTask) {
    let narrow = legal::parse(&completed.term);
    if narrow.lot.is_none() && narrow.unit.is_none() {
        return;
    }
    let Some(subdivision) = narrow.subdivision else {
        return;
    };
    let cancelled = ctx.frontier.exhaust_legal_where(|task| {
        let parsed = legal::parse(&task.term);
        parsed.lot.is_none()
            && parsed.unit.is_none()
            && parsed
                .subdivision
                .as_deref()
                .map_or(false, |s| same_subdivision(s, &subdivision))
    });
    if cancelled > 0 {
        debug!(property_id = %ctx.property_id(), cancelled, "Cancelled broad legal searches");
    }
}
