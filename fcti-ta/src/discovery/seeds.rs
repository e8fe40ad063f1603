//! What the caller knows about a property before discovery starts

use super::context::PropertyContext;
use crate::identity::is_institutional;
use crate::models::{DocumentKey, ForeclosureContext, LegalSource, SearchTask, TaskType};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyRole {
    Owner,
    Defendant,
}

/// A known party with the window it was active on the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedParty {
    pub name: String,
    pub role: PartyRole,
    pub active_from: Option<NaiveDate>,
    pub active_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedLegal {
    pub text: String,
    pub source: LegalSource,
}

/// Discovery input for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySeed {
    pub property_id: String,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub legal_descriptions: Vec<SeedLegal>,
    #[serde(default)]
    pub parties: Vec<SeedParty>,
    /// Book/page or instrument references from sales history
    #[serde(default)]
    pub references: Vec<DocumentKey>,
    #[serde(default)]
    pub foreclosure: Option<ForeclosureContext>,
}

impl PropertySeed {
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            case_number: None,
            legal_descriptions: Vec::new(),
            parties: Vec::new(),
            references: Vec::new(),
            foreclosure: None,
        }
    }

    pub fn with_case_number(mut self, case_number: impl Into<String>) -> Self {
        self.case_number = Some(case_number.into());
        self
    }

    pub fn with_legal(mut self, text: impl Into<String>, source: LegalSource) -> Self {
        self.legal_descriptions.push(SeedLegal {
            text: text.into(),
            source,
        });
        self
    }

    pub fn with_party(
        mut self,
        name: impl Into<String>,
        role: PartyRole,
        active_from: Option<NaiveDate>,
        active_to: Option<NaiveDate>,
    ) -> Self {
        self.parties.push(SeedParty {
            name: name.into(),
            role,
            active_from,
            active_to,
        });
        self
    }

    pub fn with_reference(mut self, key: DocumentKey) -> Self {
        self.references.push(key);
        self
    }

    pub fn with_foreclosure(mut self, context: ForeclosureContext) -> Self {
        self.foreclosure = Some(context);
        self
    }
}

/// Queue the seed's searches on a context
///
/// Legal variants are observed most-trusted first so the best one becomes
/// the target. Name searches are always date bounded: a party with no known
/// start is bounded by the lookback window. Institutions are never seeded.
/// Re-seeding a resumed context is a no-op, including on a later day when
/// the lookback start has moved.
pub fn seed_context(ctx: &mut PropertyContext, seed: &PropertySeed, lookback_years: u32, today: NaiveDate) {
    let property_id = ctx.property_id().to_string();

    let mut legals: Vec<&SeedLegal> = seed.legal_descriptions.iter().collect();
    legals.sort_by_key(|l| l.source.priority());
    for legal in legals {
        ctx.observe_legal(&legal.text, legal.source, "seed");
    }

    for reference in &seed.references {
        ctx.frontier
            .enqueue(SearchTask::reference(&property_id, &reference.search_term()).with_trigger("seed"));
    }

    let case_number = seed
        .case_number
        .as_deref()
        .or(seed.foreclosure.as_ref().and_then(|f| f.case_number.as_deref()));
    if let Some(case_number) = case_number {
        ctx.frontier
            .enqueue(SearchTask::case_number(&property_id, case_number).with_trigger("seed"));
        if ctx.property.case_number.is_none() {
            ctx.property.case_number = Some(case_number.to_string());
        }
    }

    let default_from = today.checked_sub_months(Months::new(lookback_years.saturating_mul(12)));
    for party in &seed.parties {
        if party.name.trim().is_empty() || is_institutional(&party.name) {
            debug!(property_id = %property_id, name = %party.name, "Skipping party seed");
            continue;
        }
        let from = party.active_from.or(default_from);
        let task = SearchTask::party_name(&property_id, &party.name, from, party.active_to)
            .with_trigger("seed");
        if party.active_from.is_none() && has_lookback_seed(ctx, &task) {
            continue;
        }
        ctx.frontier.enqueue(task);
    }
}

/// A lookback start moves with the calendar, so an earlier run's seed for
/// the same name and end bound counts as this one
fn has_lookback_seed(ctx: &PropertyContext, task: &SearchTask) -> bool {
    ctx.frontier.tasks().iter().any(|existing| {
        existing.task_type == TaskType::PartyName
            && existing.term == task.term
            && existing.date_to == task.date_to
            && existing.triggered_by.as_deref() == Some("seed")
    })
}
