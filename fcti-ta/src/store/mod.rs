//! Persistent store for title-analysis state
//!
//! Every write is an idempotent upsert keyed by the entity's uniqueness key
//! (task key, document key, period sequence, encumbrance key), so a rerun
//! over the same property never duplicates rows. Writes for one property
//! go through the `WriteGate`.

pub mod gate;
pub mod retry;
pub mod sqlite;

pub use gate::WriteGate;
pub use retry::retry_on_lock;
pub use sqlite::SqliteTitleStore;

use crate::models::{
    ChainGap, DataQualityWarning, Document, Encumbrance, ForeclosureContext, Identity,
    LegalVariation, PersistedPeriod, Property, SearchTask, SurvivalSnapshot,
};
use fcti_common::Result;

#[async_trait::async_trait]
pub trait TitleStore: Send + Sync {
    async fn upsert_property(&self, property: &Property) -> Result<()>;

    async fn load_property(&self, property_id: &str) -> Result<Option<Property>>;

    async fn save_foreclosure_context(
        &self,
        property_id: &str,
        context: &ForeclosureContext,
    ) -> Result<()>;

    async fn load_foreclosure_context(&self, property_id: &str)
        -> Result<Option<ForeclosureContext>>;

    /// Insert or update a legal variation keyed by `(property, text)`
    ///
    /// `search_attempted` only ever moves false → true.
    async fn upsert_legal_variation(&self, variation: &LegalVariation) -> Result<()>;

    async fn load_legal_variations(&self, property_id: &str) -> Result<Vec<LegalVariation>>;

    async fn upsert_tasks(&self, tasks: &[SearchTask]) -> Result<()>;

    /// Tasks in original enqueue order
    async fn load_tasks(&self, property_id: &str) -> Result<Vec<SearchTask>>;

    /// Insert a document unless its key already exists
    ///
    /// # Returns
    /// `true` when the document was new. Unkeyed documents are rejected with
    /// `Error::InvalidInput`.
    async fn insert_document(&self, document: &Document) -> Result<bool>;

    /// Rewrite the fields processing may change (`is_self_transfer`,
    /// references, extracted fields)
    async fn update_document(&self, document: &Document) -> Result<()>;

    async fn load_documents(&self, property_id: &str) -> Result<Vec<Document>>;

    async fn upsert_identities(&self, property_id: &str, identities: &[Identity]) -> Result<()>;

    async fn load_identities(&self, property_id: &str) -> Result<Vec<Identity>>;

    /// Replace the property's derived chain in one transaction
    ///
    /// Periods, gaps, encumbrances and the rebuild-owned warning kinds are
    /// deleted and rewritten together, so encumbrances never reference a
    /// period that is not stored. Other warning kinds are left in place;
    /// `warnings` are inserted with the same dedup as `add_warning`.
    async fn replace_chain(
        &self,
        property_id: &str,
        periods: &[PersistedPeriod],
        gaps: &[ChainGap],
        encumbrances: &[Encumbrance],
        warnings: &[DataQualityWarning],
    ) -> Result<()>;

    async fn load_periods(&self, property_id: &str) -> Result<Vec<PersistedPeriod>>;

    async fn load_gaps(&self, property_id: &str) -> Result<Vec<ChainGap>>;

    /// Capture prior survival work before a destructive rebuild
    async fn snapshot_survival(&self, property_id: &str) -> Result<Vec<SurvivalSnapshot>>;

    /// Upsert encumbrances keyed by `(property, key)`
    async fn save_encumbrances(&self, encumbrances: &[Encumbrance]) -> Result<()>;

    async fn load_encumbrances(&self, property_id: &str) -> Result<Vec<Encumbrance>>;

    /// Record a warning; identical warnings are stored once
    async fn add_warning(&self, warning: &DataQualityWarning) -> Result<()>;

    async fn load_warnings(&self, property_id: &str) -> Result<Vec<DataQualityWarning>>;
}
