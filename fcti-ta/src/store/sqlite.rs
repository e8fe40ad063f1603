//! SQLite implementation of `TitleStore`
//!
//! Runtime-checked `sqlx` queries; tables are created on open. List-valued
//! columns (party lists, references, identity members) are stored as JSON
//! text. Writes go through `retry_on_lock`.

use super::{retry_on_lock, TitleStore};
use crate::models::{
    ChainGap, DataQualityWarning, DocType, Document, DocumentKey, Encumbrance, EncumbranceKind,
    EntityType, ForeclosureContext, GapStatus, Identity, LegalSource, LegalVariation, LienStatus,
    LinkStatus, LinkType, OwnershipPeriod, PersistedPeriod, Property, SearchOperator, SearchTask,
    SurvivalSnapshot, SurvivalStatus, TaskStatus, TaskType, WarningKind,
};
use chrono::{DateTime, NaiveDate, Utc};
use fcti_common::events::DiscoveryState;
use fcti_common::{Error, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Default ceiling for lock-contention retries
const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
const BUSY_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct SqliteTitleStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteTitleStore {
    /// Open (creating if missing) a file-backed store
    ///
    /// # Errors
    /// Returns `Error::Database` if the pool cannot be created or the
    /// schema cannot be initialized.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), max_connections, "Title store opened");
        Self::from_pool(pool).await
    }

    /// Private in-memory store on a single long-lived connection
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_tables(&pool).await?;
        Ok(Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create all tables if they do not exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    const STATEMENTS: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS properties (
            property_id TEXT PRIMARY KEY,
            case_number TEXT,
            discovery_state TEXT NOT NULL,
            chain_complete INTEGER NOT NULL DEFAULT 0,
            survival_complete INTEGER NOT NULL DEFAULT 0,
            needs_reanalysis INTEGER NOT NULL DEFAULT 0,
            foreclosure_context TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS legal_variations (
            property_id TEXT NOT NULL,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            priority INTEGER NOT NULL,
            search_attempted INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (property_id, text)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS search_tasks (
            property_id TEXT NOT NULL,
            task_type TEXT NOT NULL,
            term TEXT NOT NULL,
            operator TEXT NOT NULL,
            date_from TEXT NOT NULL DEFAULT '',
            date_to TEXT NOT NULL DEFAULT '',
            priority INTEGER NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            rate_limit_hits INTEGER NOT NULL DEFAULT 0,
            triggered_by TEXT,
            retry_at TEXT,
            last_error TEXT,
            new_documents INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (property_id, task_type, term, operator, date_from, date_to)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            property_id TEXT NOT NULL,
            doc_key TEXT NOT NULL,
            instrument TEXT,
            book TEXT,
            page TEXT,
            recording_date TEXT,
            doc_type TEXT NOT NULL,
            doc_type_code TEXT NOT NULL,
            party_one TEXT NOT NULL,
            party_two TEXT NOT NULL,
            legal_text TEXT,
            amount REAL,
            case_number TEXT,
            maturity_date TEXT,
            referenced TEXT NOT NULL,
            is_self_transfer INTEGER NOT NULL DEFAULT 0,
            raw_text TEXT,
            discovered_by TEXT,
            PRIMARY KEY (property_id, doc_key)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            property_id TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            link_type TEXT NOT NULL,
            confidence REAL NOT NULL,
            members TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS ownership_periods (
            id TEXT PRIMARY KEY,
            property_id TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            acquisition_date TEXT NOT NULL,
            disposition_date TEXT,
            owner_names TEXT NOT NULL,
            owner_identity TEXT NOT NULL,
            grantor_names TEXT NOT NULL,
            acquisition_doc_type TEXT NOT NULL,
            acquisition_instrument TEXT,
            is_root_of_title INTEGER NOT NULL DEFAULT 0,
            link_status TEXT NOT NULL,
            self_transfers TEXT NOT NULL,
            UNIQUE (property_id, sequence)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS chain_gaps (
            property_id TEXT NOT NULL,
            before_sequence INTEGER NOT NULL,
            from_date TEXT NOT NULL,
            to_date TEXT NOT NULL,
            reason TEXT NOT NULL,
            PRIMARY KEY (property_id, before_sequence)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS encumbrances (
            property_id TEXT NOT NULL,
            enc_key TEXT NOT NULL,
            book_page TEXT,
            ownership_period_id TEXT,
            kind TEXT NOT NULL,
            recording_date TEXT NOT NULL,
            amount REAL,
            creditor TEXT NOT NULL,
            original_creditor TEXT NOT NULL,
            debtor TEXT NOT NULL,
            maturity_date TEXT,
            status TEXT NOT NULL,
            survival_status TEXT,
            survival_reason TEXT,
            surviving_amount REAL,
            is_joined INTEGER,
            is_inferred INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (property_id, enc_key)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS warnings (
            property_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            target TEXT NOT NULL DEFAULT '',
            detail TEXT NOT NULL,
            review_text TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (property_id, kind, target, detail)
        )
        "#,
    ];

    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("Title store tables initialized");
    Ok(())
}

fn parse_column<T>(value: &str, column: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| Error::Internal(format!("Invalid {} value '{}'", column, value)))
}

fn date_key(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn parse_date_key(value: &str) -> Result<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| Error::Internal(format!("Invalid stored date '{}': {}", value, e)))
}

fn parse_key(value: &str) -> Result<DocumentKey> {
    parse_column(value, "document key", DocumentKey::parse)
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(value)?)
}

fn property_from_row(row: &SqliteRow) -> Result<Property> {
    let state: String = row.try_get("discovery_state")?;
    Ok(Property {
        property_id: row.try_get("property_id")?,
        case_number: row.try_get("case_number")?,
        discovery_state: parse_column(&state, "discovery_state", DiscoveryState::parse)?,
        chain_complete: row.try_get("chain_complete")?,
        survival_complete: row.try_get("survival_complete")?,
        needs_reanalysis: row.try_get("needs_reanalysis")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<SearchTask> {
    let task_type: String = row.try_get("task_type")?;
    let operator: String = row.try_get("operator")?;
    let status: String = row.try_get("status")?;
    let date_from: String = row.try_get("date_from")?;
    let date_to: String = row.try_get("date_to")?;
    Ok(SearchTask {
        property_id: row.try_get("property_id")?,
        task_type: parse_column(&task_type, "task_type", TaskType::parse)?,
        term: row.try_get("term")?,
        operator: parse_column(&operator, "operator", SearchOperator::parse)?,
        date_from: parse_date_key(&date_from)?,
        date_to: parse_date_key(&date_to)?,
        priority: row.try_get::<i64, _>("priority")? as i32,
        status: parse_column(&status, "status", TaskStatus::parse)?,
        attempts: row.try_get::<i64, _>("attempts")? as u32,
        rate_limit_hits: row.try_get::<i64, _>("rate_limit_hits")? as u32,
        triggered_by: row.try_get("triggered_by")?,
        retry_at: row.try_get::<Option<DateTime<Utc>>, _>("retry_at")?,
        last_error: row.try_get("last_error")?,
        new_documents: row.try_get::<i64, _>("new_documents")? as u32,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let doc_type: String = row.try_get("doc_type")?;
    let party_one: String = row.try_get("party_one")?;
    let party_two: String = row.try_get("party_two")?;
    let referenced: String = row.try_get("referenced")?;
    Ok(Document {
        property_id: row.try_get("property_id")?,
        instrument: row.try_get("instrument")?,
        book: row.try_get("book")?,
        page: row.try_get("page")?,
        recording_date: row.try_get::<Option<NaiveDate>, _>("recording_date")?,
        doc_type: parse_column(&doc_type, "doc_type", DocType::parse)?,
        doc_type_code: row.try_get("doc_type_code")?,
        party_one: from_json(&party_one)?,
        party_two: from_json(&party_two)?,
        legal_text: row.try_get("legal_text")?,
        amount: row.try_get("amount")?,
        case_number: row.try_get("case_number")?,
        maturity_date: row.try_get::<Option<NaiveDate>, _>("maturity_date")?,
        referenced_instruments: from_json(&referenced)?,
        is_self_transfer: row.try_get("is_self_transfer")?,
        raw_text: row.try_get("raw_text")?,
        discovered_by: row.try_get("discovered_by")?,
    })
}

fn period_from_row(row: &SqliteRow) -> Result<PersistedPeriod> {
    let id: String = row.try_get("id")?;
    let doc_type: String = row.try_get("acquisition_doc_type")?;
    let link_status: String = row.try_get("link_status")?;
    let instrument: Option<String> = row.try_get("acquisition_instrument")?;
    let owner_names: String = row.try_get("owner_names")?;
    let grantor_names: String = row.try_get("grantor_names")?;
    let self_transfers: String = row.try_get("self_transfers")?;
    let period = OwnershipPeriod {
        property_id: row.try_get("property_id")?,
        sequence: row.try_get::<i64, _>("sequence")? as u32,
        acquisition_date: row.try_get::<NaiveDate, _>("acquisition_date")?,
        disposition_date: row.try_get::<Option<NaiveDate>, _>("disposition_date")?,
        owner_names: from_json(&owner_names)?,
        owner_identity: row.try_get("owner_identity")?,
        grantor_names: from_json(&grantor_names)?,
        acquisition_doc_type: parse_column(&doc_type, "acquisition_doc_type", DocType::parse)?,
        acquisition_instrument: instrument.as_deref().map(parse_key).transpose()?,
        is_root_of_title: row.try_get("is_root_of_title")?,
        link_status: parse_column(&link_status, "link_status", LinkStatus::parse)?,
        self_transfers: from_json(&self_transfers)?,
    };
    Ok(PersistedPeriod::new(parse_uuid(&id)?, period))
}

fn encumbrance_from_row(row: &SqliteRow) -> Result<Encumbrance> {
    let key: String = row.try_get("enc_key")?;
    let book_page: Option<String> = row.try_get("book_page")?;
    let period_id: Option<String> = row.try_get("ownership_period_id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let survival_status: Option<String> = row.try_get("survival_status")?;
    Ok(Encumbrance {
        property_id: row.try_get("property_id")?,
        key: parse_key(&key)?,
        book_page: book_page.as_deref().map(parse_key).transpose()?,
        ownership_period_id: period_id.as_deref().map(parse_uuid).transpose()?,
        kind: parse_column(&kind, "kind", EncumbranceKind::parse)?,
        recording_date: row.try_get::<NaiveDate, _>("recording_date")?,
        amount: row.try_get("amount")?,
        creditor: row.try_get("creditor")?,
        original_creditor: row.try_get("original_creditor")?,
        debtor: row.try_get("debtor")?,
        maturity_date: row.try_get::<Option<NaiveDate>, _>("maturity_date")?,
        status: parse_column(&status, "status", LienStatus::parse)?,
        survival_status: survival_status
            .as_deref()
            .map(|s| parse_column(s, "survival_status", SurvivalStatus::parse))
            .transpose()?,
        survival_reason: row.try_get("survival_reason")?,
        surviving_amount: row.try_get("surviving_amount")?,
        is_joined: row.try_get::<Option<bool>, _>("is_joined")?,
        is_inferred: row.try_get("is_inferred")?,
    })
}

const ENCUMBRANCE_UPSERT: &str = r#"
    INSERT INTO encumbrances (
        property_id, enc_key, book_page, ownership_period_id, kind, recording_date,
        amount, creditor, original_creditor, debtor, maturity_date, status,
        survival_status, survival_reason, surviving_amount, is_joined, is_inferred
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(property_id, enc_key) DO UPDATE SET
        book_page = excluded.book_page,
        ownership_period_id = excluded.ownership_period_id,
        kind = excluded.kind,
        recording_date = excluded.recording_date,
        amount = excluded.amount,
        creditor = excluded.creditor,
        original_creditor = excluded.original_creditor,
        debtor = excluded.debtor,
        maturity_date = excluded.maturity_date,
        status = excluded.status,
        survival_status = excluded.survival_status,
        survival_reason = excluded.survival_reason,
        surviving_amount = excluded.surviving_amount,
        is_joined = excluded.is_joined,
        is_inferred = excluded.is_inferred
"#;

async fn write_encumbrance<'e, E>(executor: E, encumbrance: &Encumbrance) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(ENCUMBRANCE_UPSERT)
        .bind(&encumbrance.property_id)
        .bind(encumbrance.key.to_string())
        .bind(encumbrance.book_page.as_ref().map(|k| k.to_string()))
        .bind(encumbrance.ownership_period_id.map(|id| id.to_string()))
        .bind(encumbrance.kind.as_str())
        .bind(encumbrance.recording_date)
        .bind(encumbrance.amount)
        .bind(&encumbrance.creditor)
        .bind(&encumbrance.original_creditor)
        .bind(&encumbrance.debtor)
        .bind(encumbrance.maturity_date)
        .bind(encumbrance.status.as_str())
        .bind(encumbrance.survival_status.map(|s| s.as_str()))
        .bind(&encumbrance.survival_reason)
        .bind(encumbrance.surviving_amount)
        .bind(encumbrance.is_joined)
        .bind(encumbrance.is_inferred)
        .execute(executor)
        .await?;
    Ok(())
}

async fn write_warning<'e, E>(executor: E, warning: &DataQualityWarning) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO warnings (property_id, kind, target, detail, review_text, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(property_id, kind, target, detail) DO NOTHING
        "#,
    )
    .bind(&warning.property_id)
    .bind(warning.kind.as_str())
    .bind(warning.target.as_deref().unwrap_or_default())
    .bind(&warning.detail)
    .bind(&warning.review_text)
    .bind(warning.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl TitleStore for SqliteTitleStore {
    async fn upsert_property(&self, property: &Property) -> Result<()> {
        retry_on_lock("upsert property", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO properties (
                    property_id, case_number, discovery_state, chain_complete,
                    survival_complete, needs_reanalysis, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(property_id) DO UPDATE SET
                    case_number = COALESCE(excluded.case_number, case_number),
                    discovery_state = excluded.discovery_state,
                    chain_complete = excluded.chain_complete,
                    survival_complete = excluded.survival_complete,
                    needs_reanalysis = excluded.needs_reanalysis,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&property.property_id)
            .bind(&property.case_number)
            .bind(property.discovery_state.as_str())
            .bind(property.chain_complete)
            .bind(property.survival_complete)
            .bind(property.needs_reanalysis)
            .bind(property.updated_at)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_property(&self, property_id: &str) -> Result<Option<Property>> {
        let row = sqlx::query("SELECT * FROM properties WHERE property_id = ?")
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(property_from_row).transpose()
    }

    async fn save_foreclosure_context(
        &self,
        property_id: &str,
        context: &ForeclosureContext,
    ) -> Result<()> {
        let json = to_json(context)?;
        let now = Utc::now();
        retry_on_lock("save foreclosure context", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO properties (property_id, discovery_state, updated_at, foreclosure_context)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(property_id) DO UPDATE SET
                    foreclosure_context = excluded.foreclosure_context
                "#,
            )
            .bind(property_id)
            .bind(DiscoveryState::Initializing.as_str())
            .bind(now)
            .bind(&json)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_foreclosure_context(
        &self,
        property_id: &str,
    ) -> Result<Option<ForeclosureContext>> {
        let json: Option<Option<String>> =
            sqlx::query_scalar("SELECT foreclosure_context FROM properties WHERE property_id = ?")
                .bind(property_id)
                .fetch_optional(&self.pool)
                .await?;
        json.flatten().as_deref().map(from_json).transpose()
    }

    async fn upsert_legal_variation(&self, variation: &LegalVariation) -> Result<()> {
        retry_on_lock("upsert legal variation", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO legal_variations (property_id, text, source, priority, search_attempted)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(property_id, text) DO UPDATE SET
                    source = CASE WHEN excluded.priority < priority THEN excluded.source ELSE source END,
                    priority = MIN(priority, excluded.priority),
                    search_attempted = MAX(search_attempted, excluded.search_attempted)
                "#,
            )
            .bind(&variation.property_id)
            .bind(&variation.text)
            .bind(variation.source.as_str())
            .bind(variation.priority as i64)
            .bind(variation.search_attempted)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_legal_variations(&self, property_id: &str) -> Result<Vec<LegalVariation>> {
        let rows = sqlx::query(
            "SELECT * FROM legal_variations WHERE property_id = ? ORDER BY priority, rowid",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let source: String = row.try_get("source")?;
                Ok(LegalVariation {
                    property_id: row.try_get("property_id")?,
                    text: row.try_get("text")?,
                    source: parse_column(&source, "source", LegalSource::parse)?,
                    priority: row.try_get::<i64, _>("priority")? as i32,
                    search_attempted: row.try_get("search_attempted")?,
                })
            })
            .collect()
    }

    async fn upsert_tasks(&self, tasks: &[SearchTask]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        retry_on_lock("upsert tasks", self.max_lock_wait_ms, || async {
            let mut tx = self.pool.begin().await?;
            for task in tasks {
                sqlx::query(
                    r#"
                    INSERT INTO search_tasks (
                        property_id, task_type, term, operator, date_from, date_to,
                        priority, status, attempts, rate_limit_hits, triggered_by,
                        retry_at, last_error, new_documents
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(property_id, task_type, term, operator, date_from, date_to)
                    DO UPDATE SET
                        priority = excluded.priority,
                        status = excluded.status,
                        attempts = excluded.attempts,
                        rate_limit_hits = excluded.rate_limit_hits,
                        retry_at = excluded.retry_at,
                        last_error = excluded.last_error,
                        new_documents = excluded.new_documents
                    "#,
                )
                .bind(&task.property_id)
                .bind(task.task_type.as_str())
                .bind(&task.term)
                .bind(task.operator.as_str())
                .bind(date_key(task.date_from))
                .bind(date_key(task.date_to))
                .bind(task.priority as i64)
                .bind(task.status.as_str())
                .bind(task.attempts as i64)
                .bind(task.rate_limit_hits as i64)
                .bind(&task.triggered_by)
                .bind(task.retry_at)
                .bind(&task.last_error)
                .bind(task.new_documents as i64)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_tasks(&self, property_id: &str) -> Result<Vec<SearchTask>> {
        let rows = sqlx::query("SELECT * FROM search_tasks WHERE property_id = ? ORDER BY rowid")
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn insert_document(&self, document: &Document) -> Result<bool> {
        let key = document.key().ok_or_else(|| {
            Error::InvalidInput("document has neither instrument nor book/page".to_string())
        })?;
        let key = key.to_string();
        let party_one = to_json(&document.party_one)?;
        let party_two = to_json(&document.party_two)?;
        let referenced = to_json(&document.referenced_instruments)?;

        retry_on_lock("insert document", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                INSERT INTO documents (
                    property_id, doc_key, instrument, book, page, recording_date,
                    doc_type, doc_type_code, party_one, party_two, legal_text, amount,
                    case_number, maturity_date, referenced, is_self_transfer, raw_text,
                    discovered_by
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(property_id, doc_key) DO NOTHING
                "#,
            )
            .bind(&document.property_id)
            .bind(&key)
            .bind(&document.instrument)
            .bind(&document.book)
            .bind(&document.page)
            .bind(document.recording_date)
            .bind(document.doc_type.as_str())
            .bind(&document.doc_type_code)
            .bind(&party_one)
            .bind(&party_two)
            .bind(&document.legal_text)
            .bind(document.amount)
            .bind(&document.case_number)
            .bind(document.maturity_date)
            .bind(&referenced)
            .bind(document.is_self_transfer)
            .bind(&document.raw_text)
            .bind(&document.discovered_by)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(result.rows_affected() > 0)
        })
        .await
    }

    async fn update_document(&self, document: &Document) -> Result<()> {
        let key = document
            .key()
            .ok_or_else(|| Error::InvalidInput("document has no key".to_string()))?
            .to_string();
        let party_one = to_json(&document.party_one)?;
        let party_two = to_json(&document.party_two)?;
        let referenced = to_json(&document.referenced_instruments)?;

        retry_on_lock("update document", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                UPDATE documents SET
                    party_one = ?, party_two = ?, legal_text = ?, amount = ?,
                    case_number = ?, maturity_date = ?, referenced = ?,
                    is_self_transfer = ?, raw_text = ?
                WHERE property_id = ? AND doc_key = ?
                "#,
            )
            .bind(&party_one)
            .bind(&party_two)
            .bind(&document.legal_text)
            .bind(document.amount)
            .bind(&document.case_number)
            .bind(document.maturity_date)
            .bind(&referenced)
            .bind(document.is_self_transfer)
            .bind(&document.raw_text)
            .bind(&document.property_id)
            .bind(&key)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_documents(&self, property_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE property_id = ? ORDER BY recording_date, rowid",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn upsert_identities(&self, property_id: &str, identities: &[Identity]) -> Result<()> {
        if identities.is_empty() {
            return Ok(());
        }
        let rows = identities
            .iter()
            .map(|i| Ok((i, to_json(&i.members)?)))
            .collect::<Result<Vec<_>>>()?;

        retry_on_lock("upsert identities", self.max_lock_wait_ms, || async {
            let mut tx = self.pool.begin().await?;
            for (identity, members) in &rows {
                sqlx::query(
                    r#"
                    INSERT INTO identities (
                        id, property_id, canonical_name, entity_type, link_type, confidence, members
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        canonical_name = excluded.canonical_name,
                        entity_type = excluded.entity_type,
                        link_type = excluded.link_type,
                        confidence = excluded.confidence,
                        members = excluded.members
                    "#,
                )
                .bind(identity.id.to_string())
                .bind(property_id)
                .bind(&identity.canonical_name)
                .bind(identity.entity_type.as_str())
                .bind(identity.link_type.as_str())
                .bind(identity.confidence)
                .bind(members)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_identities(&self, property_id: &str) -> Result<Vec<Identity>> {
        let rows = sqlx::query("SELECT * FROM identities WHERE property_id = ? ORDER BY rowid")
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                let entity_type: String = row.try_get("entity_type")?;
                let link_type: String = row.try_get("link_type")?;
                let members: String = row.try_get("members")?;
                Ok(Identity {
                    id: parse_uuid(&id)?,
                    canonical_name: row.try_get("canonical_name")?,
                    entity_type: parse_column(&entity_type, "entity_type", EntityType::parse)?,
                    members: from_json(&members)?,
                    link_type: parse_column(&link_type, "link_type", LinkType::parse)?,
                    confidence: row.try_get("confidence")?,
                })
            })
            .collect()
    }

    async fn replace_chain(
        &self,
        property_id: &str,
        periods: &[PersistedPeriod],
        gaps: &[ChainGap],
        encumbrances: &[Encumbrance],
        warnings: &[DataQualityWarning],
    ) -> Result<()> {
        let rows = periods
            .iter()
            .map(|p| {
                let period = p.period();
                Ok((
                    p,
                    to_json(&period.owner_names)?,
                    to_json(&period.grantor_names)?,
                    to_json(&period.self_transfers)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        retry_on_lock("replace chain", self.max_lock_wait_ms, || async {
            let mut tx = self.pool.begin().await?;
            for statement in [
                "DELETE FROM encumbrances WHERE property_id = ?",
                "DELETE FROM ownership_periods WHERE property_id = ?",
                "DELETE FROM chain_gaps WHERE property_id = ?",
            ] {
                sqlx::query(statement)
                    .bind(property_id)
                    .execute(&mut *tx)
                    .await?;
            }
            for kind in WarningKind::REBUILD_OWNED {
                sqlx::query("DELETE FROM warnings WHERE property_id = ? AND kind = ?")
                    .bind(property_id)
                    .bind(kind.as_str())
                    .execute(&mut *tx)
                    .await?;
            }

            for (persisted, owner_names, grantor_names, self_transfers) in &rows {
                let period = persisted.period();
                sqlx::query(
                    r#"
                    INSERT INTO ownership_periods (
                        id, property_id, sequence, acquisition_date, disposition_date,
                        owner_names, owner_identity, grantor_names, acquisition_doc_type,
                        acquisition_instrument, is_root_of_title, link_status, self_transfers
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(persisted.id().to_string())
                .bind(property_id)
                .bind(period.sequence as i64)
                .bind(period.acquisition_date)
                .bind(period.disposition_date)
                .bind(owner_names)
                .bind(&period.owner_identity)
                .bind(grantor_names)
                .bind(period.acquisition_doc_type.as_str())
                .bind(period.acquisition_instrument.as_ref().map(|k| k.to_string()))
                .bind(period.is_root_of_title)
                .bind(period.link_status.as_str())
                .bind(self_transfers)
                .execute(&mut *tx)
                .await?;
            }

            for gap in gaps {
                sqlx::query(
                    r#"
                    INSERT INTO chain_gaps (property_id, before_sequence, from_date, to_date, reason)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(property_id)
                .bind(gap.before_sequence as i64)
                .bind(gap.from_date)
                .bind(gap.to_date)
                .bind(&gap.reason)
                .execute(&mut *tx)
                .await?;
            }

            for encumbrance in encumbrances {
                write_encumbrance(&mut *tx, encumbrance).await?;
            }
            for warning in warnings {
                write_warning(&mut *tx, warning).await?;
            }

            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_periods(&self, property_id: &str) -> Result<Vec<PersistedPeriod>> {
        let rows = sqlx::query(
            "SELECT * FROM ownership_periods WHERE property_id = ? ORDER BY sequence",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(period_from_row).collect()
    }

    async fn load_gaps(&self, property_id: &str) -> Result<Vec<ChainGap>> {
        let rows = sqlx::query(
            "SELECT * FROM chain_gaps WHERE property_id = ? ORDER BY before_sequence",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(ChainGap {
                    property_id: row.try_get("property_id")?,
                    before_sequence: row.try_get::<i64, _>("before_sequence")? as u32,
                    from_date: row.try_get::<NaiveDate, _>("from_date")?,
                    to_date: row.try_get::<NaiveDate, _>("to_date")?,
                    status: GapStatus::Incomplete,
                    reason: row.try_get("reason")?,
                })
            })
            .collect()
    }

    async fn snapshot_survival(&self, property_id: &str) -> Result<Vec<SurvivalSnapshot>> {
        let encumbrances = self.load_encumbrances(property_id).await?;
        Ok(encumbrances.iter().map(SurvivalSnapshot::of).collect())
    }

    async fn save_encumbrances(&self, encumbrances: &[Encumbrance]) -> Result<()> {
        if encumbrances.is_empty() {
            return Ok(());
        }
        retry_on_lock("save encumbrances", self.max_lock_wait_ms, || async {
            let mut tx = self.pool.begin().await?;
            for encumbrance in encumbrances {
                write_encumbrance(&mut *tx, encumbrance).await?;
            }
            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn load_encumbrances(&self, property_id: &str) -> Result<Vec<Encumbrance>> {
        let rows = sqlx::query(
            "SELECT * FROM encumbrances WHERE property_id = ? ORDER BY recording_date, rowid",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(encumbrance_from_row).collect()
    }

    async fn add_warning(&self, warning: &DataQualityWarning) -> Result<()> {
        retry_on_lock("add warning", self.max_lock_wait_ms, || async {
            write_warning(&self.pool, warning).await
        })
        .await
    }

    async fn load_warnings(&self, property_id: &str) -> Result<Vec<DataQualityWarning>> {
        let rows = sqlx::query("SELECT * FROM warnings WHERE property_id = ? ORDER BY rowid")
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                let target: String = row.try_get("target")?;
                Ok(DataQualityWarning {
                    property_id: row.try_get("property_id")?,
                    kind: parse_column(&kind, "kind", WarningKind::parse)?,
                    target: if target.is_empty() { None } else { Some(target) },
                    detail: row.try_get("detail")?,
                    review_text: row.try_get("review_text")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }
}
