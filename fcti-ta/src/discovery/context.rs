//! Per-property discovery state
//!
//! Everything one property's discovery loop mutates lives in a
//! `PropertyContext` that is passed explicitly; nothing is shared between
//! properties. The context is rebuilt from the store at the start of every
//! run, which is what makes discovery resumable.

use crate::chain::is_cross_lot;
use crate::frontier::{Frontier, RetryPolicy};
use crate::identity::IdentityLinker;
use crate::legal::{self, generate_permutations, ParsedLegal};
use crate::models::{
    normalize_legal_text, DataQualityWarning, Document, DocumentKey, LegalSource, LegalVariation,
    Property, SearchTask, TaskStatus,
};
use crate::store::TitleStore;
use fcti_common::time::years_between;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;

pub struct PropertyContext {
    pub property: Property,
    pub frontier: Frontier,
    pub linker: IdentityLinker,
    documents: Vec<Document>,
    known_keys: HashSet<DocumentKey>,
    unsaved_documents: usize,
    variations: Vec<LegalVariation>,
    dirty_variations: Vec<usize>,
    target_legal: Option<ParsedLegal>,
    warnings: Vec<DataQualityWarning>,
    /// Searches issued, including those of earlier runs
    pub searches: u32,
    /// Loop passes in this run
    pub iterations: u32,
    /// Documents first seen in this run
    pub new_documents: usize,
}

impl PropertyContext {
    /// Empty context for a property never seen before
    pub fn new(property_id: &str, policy: RetryPolicy) -> Self {
        Self {
            property: Property::new(property_id),
            frontier: Frontier::new(property_id, policy),
            linker: IdentityLinker::new(),
            documents: Vec::new(),
            known_keys: HashSet::new(),
            unsaved_documents: 0,
            variations: Vec::new(),
            dirty_variations: Vec::new(),
            target_legal: None,
            warnings: Vec::new(),
            searches: 0,
            iterations: 0,
            new_documents: 0,
        }
    }

    /// Rebuild the context from persisted state
    pub async fn load(
        store: &dyn TitleStore,
        property_id: &str,
        policy: RetryPolicy,
    ) -> fcti_common::Result<Self> {
        let mut ctx = Self::new(property_id, policy);
        if let Some(property) = store.load_property(property_id).await? {
            ctx.property = property;
        }

        let tasks = store.load_tasks(property_id).await?;
        ctx.searches = tasks
            .iter()
            .map(|t| t.attempts + u32::from(t.status == TaskStatus::Completed))
            .sum();
        ctx.frontier = Frontier::from_tasks(property_id, policy, tasks);
        ctx.linker = IdentityLinker::from_identities(store.load_identities(property_id).await?);

        ctx.variations = store.load_legal_variations(property_id).await?;
        ctx.target_legal = ctx
            .variations
            .iter()
            .map(|v| legal::parse(&v.text))
            .find(|parsed| !parsed.is_empty());

        for document in store.load_documents(property_id).await? {
            ctx.remember(&document);
            ctx.documents.push(document);
        }

        debug!(
            property_id,
            documents = ctx.documents.len(),
            tasks = ctx.frontier.tasks().len(),
            variations = ctx.variations.len(),
            "Discovery context loaded"
        );
        Ok(ctx)
    }

    pub fn property_id(&self) -> &str {
        &self.property.property_id
    }

    pub fn target_legal(&self) -> Option<&ParsedLegal> {
        self.target_legal.as_ref()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn variations(&self) -> &[LegalVariation] {
        &self.variations
    }

    fn remember(&mut self, document: &Document) {
        if let Some(key) = document.key() {
            self.known_keys.insert(key);
        }
        if let Some(alias) = document.book_page_key() {
            self.known_keys.insert(alias);
        }
    }

    /// True when a document with this key (or book/page alias) is already held
    pub fn knows(&self, document: &Document) -> bool {
        document.key().map_or(false, |k| self.known_keys.contains(&k))
            || document
                .book_page_key()
                .map_or(false, |k| self.known_keys.contains(&k))
    }

    pub fn add_document(&mut self, document: Document) {
        self.remember(&document);
        self.documents.push(document);
        self.unsaved_documents += 1;
        self.new_documents += 1;
    }

    /// Documents added since the last persist
    pub fn take_unsaved_documents(&mut self) -> Vec<Document> {
        let start = self.documents.len() - self.unsaved_documents;
        self.unsaved_documents = 0;
        self.documents[start..].to_vec()
    }

    pub fn warn(&mut self, warning: DataQualityWarning) {
        self.warnings.push(warning);
    }

    pub fn take_warnings(&mut self) -> Vec<DataQualityWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn take_dirty_variations(&mut self) -> Vec<LegalVariation> {
        let dirty = std::mem::take(&mut self.dirty_variations);
        dirty
            .into_iter()
            .filter_map(|i| self.variations.get(i).cloned())
            .collect()
    }

    /// Record a legal-description variant and queue its searches
    ///
    /// The first parseable variant becomes the property's target legal and
    /// gets every permutation; later variants queue their most specific
    /// permutation only. Variants naming another lot of the target's
    /// subdivision are ignored.
    ///
    /// # Returns
    /// `true` when the variant was new.
    pub fn observe_legal(&mut self, text: &str, source: LegalSource, trigger: &str) -> bool {
        let normalized = normalize_legal_text(text);
        if normalized.is_empty() || self.variations.iter().any(|v| v.text == normalized) {
            return false;
        }
        let parsed = legal::parse(&normalized);
        if let Some(target) = &self.target_legal {
            if target.conflicts_with(&parsed) {
                debug!(property_id = %self.property_id(), text = %normalized, "Ignoring cross-lot legal variant");
                return false;
            }
        }

        let becomes_target = self.target_legal.is_none() && !parsed.is_empty();
        let permutations = generate_permutations(&parsed);
        let selected = if becomes_target {
            permutations
        } else {
            permutations.into_iter().take(1).collect()
        };
        if becomes_target {
            self.target_legal = Some(parsed);
        }

        let mut variation = LegalVariation::new(self.property_id(), &normalized, source);
        variation.search_attempted = !selected.is_empty();
        for permutation in selected {
            let mut task = SearchTask::new(
                self.property_id(),
                crate::models::TaskType::LegalText,
                &permutation.term,
                permutation.operator,
                permutation.priority,
            );
            task.triggered_by = Some(trigger.to_string());
            self.frontier.enqueue(task);
        }

        self.variations.push(variation);
        self.dirty_variations.push(self.variations.len() - 1);
        true
    }

    /// True when the document describes another lot of the target subdivision
    pub fn is_cross_lot(&self, document: &Document) -> bool {
        is_cross_lot(document, self.target_legal.as_ref())
    }

    /// Deed-only coverage check
    ///
    /// Complete when the earliest in-lot deed is a root of title or the
    /// deeds span at least `lookback_years` back from `today`. Non-deed
    /// documents never count.
    pub fn deed_coverage_complete(&self, lookback_years: u32, today: NaiveDate) -> bool {
        let earliest = self
            .documents
            .iter()
            .filter(|d| d.doc_type.is_deed() && !self.is_cross_lot(d))
            .filter_map(|d| d.recording_date.map(|date| (date, d)))
            .min_by_key(|(date, _)| *date);

        match earliest {
            Some((_, deed)) if deed.doc_type.is_root_of_title() => true,
            Some((date, _)) => years_between(date, today) >= lookback_years as f64,
            None => false,
        }
    }
}
