//! Discovery runs against a scripted registry

mod helpers;

use fcti_common::events::DiscoveryState;
use fcti_ta::config::DiscoveryConfig;
use fcti_ta::discovery::{PartyRole, PropertySeed};
use fcti_ta::models::{LegalSource, TaskStatus, TaskType, WarningKind};
use helpers::{fast_discovery, harness, summary, ymd, ScriptedRegistry, LEGAL, PROPERTY};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const LIS_PENDENS_TEXT: &str = "NOTICE OF LIS PENDENS\n\
CASE NO. 2022-CA-001234\n\
PLAINTIFF: FIRST NATIONAL BANK\n\
DEFENDANTS: DOE JANE\n\
to foreclose the mortgage recorded as Instrument No. 2015-0001\n\
Legal Description: Lot 5, Block 3, PALM ESTATES\n\n";

fn owner_seed() -> PropertySeed {
    PropertySeed::new(PROPERTY).with_party("DOE JANE", PartyRole::Owner, Some(ymd(2010, 3, 1)), None)
}

/// Registry whose deeds reach back past the lookback window
fn full_chain_registry() -> Arc<ScriptedRegistry> {
    let registry = Arc::new(ScriptedRegistry::new("scripted"));
    registry.respond(
        TaskType::PartyName,
        "DOE JANE",
        vec![summary("2010-0100", "2010-03-01", "WD", &["SMITH ROBERT"], &["DOE JANE"])],
    );
    registry.respond(
        TaskType::PartyName,
        "SMITH ROBERT",
        vec![summary("1985-0042", "1985-07-15", "WD", &["BROWN CARL"], &["SMITH ROBERT"])],
    );
    registry
}

#[tokio::test]
async fn test_defendant_only_seed_follows_lis_pendens() {
    let registry = Arc::new(ScriptedRegistry::new("scripted"));
    let mut lp = summary("2022-0900", "2022-05-01", "LP", &[], &[]);
    lp.legal_text = None;
    lp.content = Some(LIS_PENDENS_TEXT.to_string());
    registry.respond(TaskType::PartyName, "DOE JANE", vec![lp]);

    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let seed = PropertySeed::new(PROPERTY).with_party("DOE JANE", PartyRole::Defendant, None, None);
    let report = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.discovery.state, DiscoveryState::Exhausted);
    assert!(registry.was_searched(TaskType::CaseNumber, "2022-CA-001234"));
    assert!(registry.was_searched(TaskType::Reference, "2015-0001"));
    assert!(registry.calls().iter().any(|q| q.task_type == TaskType::LegalText));

    // The defendant search itself was date bounded
    let name_query = registry
        .calls()
        .into_iter()
        .find(|q| q.task_type == TaskType::PartyName)
        .unwrap();
    assert!(name_query.date_from.is_some());

    assert!(!report.chain_complete);
    let warnings = h.store.load_warnings(PROPERTY).await.unwrap();
    assert!(warnings.iter().any(|w| w.kind == WarningKind::ZeroPeriods));

    let context = h.store.load_foreclosure_context(PROPERTY).await.unwrap().unwrap();
    assert_eq!(context.case_number.as_deref(), Some("2022-CA-001234"));
    assert_eq!(context.defendants, Some(vec!["DOE JANE".to_string()]));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let registry = full_chain_registry();
    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let seed = owner_seed();

    let first = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.discovery.state, DiscoveryState::Complete);
    assert_eq!(first.periods, 2);

    let calls = registry.calls().len();
    let documents = h.store.load_documents(PROPERTY).await.unwrap().len();
    let tasks = h.store.load_tasks(PROPERTY).await.unwrap().len();

    let second = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.discovery.state, DiscoveryState::Complete);
    assert_eq!(second.discovery.new_documents, 0);
    assert_eq!(second.periods, first.periods);
    assert_eq!(registry.calls().len(), calls);
    assert_eq!(h.store.load_documents(PROPERTY).await.unwrap().len(), documents);
    assert_eq!(h.store.load_tasks(PROPERTY).await.unwrap().len(), tasks);
    assert_eq!(h.store.load_periods(PROPERTY).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rate_limits_do_not_consume_attempts() {
    let registry = full_chain_registry();
    registry.rate_limit("DOE JANE", 2);
    let h = harness(Arc::clone(&registry), fast_discovery()).await;

    let report = h
        .service
        .analyze_property(&owner_seed(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.discovery.state, DiscoveryState::Complete);

    let tasks = h.store.load_tasks(PROPERTY).await.unwrap();
    let name_task = tasks
        .iter()
        .find(|t| t.task_type == TaskType::PartyName && t.term == "DOE JANE")
        .unwrap();
    assert_eq!(name_task.status, TaskStatus::Completed);
    assert_eq!(name_task.attempts, 0);
    assert_eq!(name_task.rate_limit_hits, 2);
}

#[tokio::test]
async fn test_backed_off_property_is_deferred() {
    let registry = full_chain_registry();
    registry.rate_limit("DOE JANE", 1);
    let config = DiscoveryConfig {
        base_backoff_secs: 60,
        max_backoff_secs: 600,
        ..fast_discovery()
    };
    let h = harness(Arc::clone(&registry), config).await;

    let report = h
        .service
        .analyze_property(&owner_seed(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.discovery.state, DiscoveryState::Deferred);
    assert!(report.discovery.retry_at.is_some());
    assert_eq!(report.periods, 0);

    let tasks = h.store.load_tasks(PROPERTY).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::RateLimited);
    assert!(tasks[0].retry_at.is_some());
}

#[tokio::test]
async fn test_cancelled_run_resumes() {
    let registry = full_chain_registry();
    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let seed = owner_seed();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let stopped = h.service.analyze_property(&seed, &cancel).await.unwrap();
    assert_eq!(stopped.discovery.state, DiscoveryState::Cancelled);
    assert!(registry.calls().is_empty());

    // The seeded frontier survived the cancellation
    let pending = h.store.load_tasks(PROPERTY).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, TaskStatus::Pending);

    let resumed = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resumed.discovery.state, DiscoveryState::Complete);
    assert!(resumed.chain_complete);
}

#[tokio::test]
async fn test_nothing_searchable_is_unresolvable() {
    let registry = Arc::new(ScriptedRegistry::new("scripted"));
    let h = harness(Arc::clone(&registry), fast_discovery()).await;

    let report = h
        .service
        .analyze_property(&PropertySeed::new(PROPERTY), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.discovery.state, DiscoveryState::Unresolvable);
    assert!(registry.calls().is_empty());

    let property = h.store.load_property(PROPERTY).await.unwrap().unwrap();
    assert_eq!(property.discovery_state, DiscoveryState::Unresolvable);
}

#[tokio::test]
async fn test_search_cap_stops_discovery() {
    let registry = full_chain_registry();
    let config = DiscoveryConfig {
        max_searches: 1,
        ..fast_discovery()
    };
    let h = harness(Arc::clone(&registry), config).await;
    let seed = owner_seed().with_legal(LEGAL, LegalSource::Judgment);

    let report = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.discovery.state, DiscoveryState::Capped);
    assert_eq!(registry.calls().len(), 1);
}

#[tokio::test]
async fn test_batch_runs_every_property() {
    let registry = full_chain_registry();
    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let other = PropertySeed::new("01-3022-005-0060");

    let results = h
        .service
        .run_batch(vec![owner_seed(), other], CancellationToken::new())
        .await;
    assert_eq!(results.len(), 2);
    for (property_id, result) in results {
        let report = result.unwrap();
        let expected = if property_id == PROPERTY {
            DiscoveryState::Complete
        } else {
            DiscoveryState::Unresolvable
        };
        assert_eq!(report.discovery.state, expected);
    }
}

#[tokio::test]
async fn test_sale_between_shared_given_names_keeps_both_owners() {
    let registry = Arc::new(ScriptedRegistry::new("scripted"));
    registry.respond(
        TaskType::PartyName,
        "DOE ROBERT",
        vec![summary("2014-0300", "2014-05-01", "WD", &["SMITH ROBERT"], &["DOE ROBERT"])],
    );
    registry.respond(
        TaskType::PartyName,
        "SMITH ROBERT",
        vec![summary("1985-0042", "1985-07-15", "WD", &["BROWN CARL"], &["SMITH ROBERT"])],
    );
    let h = harness(Arc::clone(&registry), fast_discovery()).await;
    let seed = PropertySeed::new(PROPERTY).with_party(
        "DOE ROBERT",
        PartyRole::Owner,
        Some(ymd(2014, 5, 1)),
        None,
    );

    let report = h
        .service
        .analyze_property(&seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.periods, 2);

    let documents = h.store.load_documents(PROPERTY).await.unwrap();
    let sale = documents
        .iter()
        .find(|d| d.instrument.as_deref() == Some("2014-0300"))
        .unwrap();
    assert!(!sale.is_self_transfer);

    let warnings = h.store.load_warnings(PROPERTY).await.unwrap();
    assert!(warnings.iter().any(|w| w.kind == WarningKind::AmbiguousIdentity));
}
