//! Search task model for the discovery frontier

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Priority bands (lower number = searched first)
pub mod priority {
    /// Instrument number / book-page lookups: fastest and most precise
    pub const REFERENCE: i32 = 10;
    /// Legal-description searches; permutations add 0..=3
    pub const LEGAL_TEXT: i32 = 20;
    pub const CASE_NUMBER: i32 = 30;
    /// Name searches with at least one date bound
    pub const NAME_BOUNDED: i32 = 40;
    /// Open-ended name searches, only once nothing else remains
    pub const NAME_UNBOUNDED: i32 = 50;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Reference,
    LegalText,
    PartyName,
    CaseNumber,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Reference => "REFERENCE",
            TaskType::LegalText => "LEGAL_TEXT",
            TaskType::PartyName => "PARTY_NAME",
            TaskType::CaseNumber => "CASE_NUMBER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REFERENCE" => Some(TaskType::Reference),
            "LEGAL_TEXT" => Some(TaskType::LegalText),
            "PARTY_NAME" => Some(TaskType::PartyName),
            "CASE_NUMBER" => Some(TaskType::CaseNumber),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchOperator {
    Exact,
    Prefix,
    Contains,
}

impl SearchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOperator::Exact => "EXACT",
            SearchOperator::Prefix => "PREFIX",
            SearchOperator::Contains => "CONTAINS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXACT" => Some(SearchOperator::Exact),
            "PREFIX" => Some(SearchOperator::Prefix),
            "CONTAINS" => Some(SearchOperator::Contains),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RateLimited,
    Exhausted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::RateLimited => "RATE_LIMITED",
            TaskStatus::Exhausted => "EXHAUSTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            "RATE_LIMITED" => Some(TaskStatus::RateLimited),
            "EXHAUSTED" => Some(TaskStatus::Exhausted),
            _ => None,
        }
    }

    /// Completed, permanently failed, or exhausted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Exhausted
        )
    }
}

/// Uniqueness key of a search task
///
/// Date bounds are part of identity: a bounded retry of an unbounded name
/// search is a different task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub property_id: String,
    pub task_type: TaskType,
    pub term: String,
    pub operator: SearchOperator,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTask {
    pub property_id: String,
    pub task_type: TaskType,
    /// Uppercased, whitespace-collapsed search term
    pub term: String,
    pub operator: SearchOperator,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub priority: i32,
    pub status: TaskStatus,
    /// Failed attempts; rate limits do not count
    pub attempts: u32,
    /// Rate-limit responses received (drives exponential backoff)
    pub rate_limit_hits: u32,
    /// What produced this task (seed name or document key)
    pub triggered_by: Option<String>,
    /// Earliest time a rate-limited task may be retried
    pub retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Number of genuinely new documents the search yielded
    pub new_documents: u32,
}

impl SearchTask {
    pub fn new(
        property_id: impl Into<String>,
        task_type: TaskType,
        term: &str,
        operator: SearchOperator,
        priority: i32,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            task_type,
            term: normalize_term(term),
            operator,
            date_from: None,
            date_to: None,
            priority,
            status: TaskStatus::Pending,
            attempts: 0,
            rate_limit_hits: 0,
            triggered_by: None,
            retry_at: None,
            last_error: None,
            new_documents: 0,
        }
    }

    /// Instrument number or `BOOK/PAGE` lookup
    pub fn reference(property_id: impl Into<String>, reference: &str) -> Self {
        Self::new(
            property_id,
            TaskType::Reference,
            reference,
            SearchOperator::Exact,
            priority::REFERENCE,
        )
    }

    pub fn case_number(property_id: impl Into<String>, case_number: &str) -> Self {
        Self::new(
            property_id,
            TaskType::CaseNumber,
            case_number,
            SearchOperator::Exact,
            priority::CASE_NUMBER,
        )
    }

    /// Party-name search; priority band depends on whether it is date bounded
    pub fn party_name(
        property_id: impl Into<String>,
        name: &str,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Self {
        let bounded = date_from.is_some() || date_to.is_some();
        let mut task = Self::new(
            property_id,
            TaskType::PartyName,
            name,
            SearchOperator::Prefix,
            if bounded {
                priority::NAME_BOUNDED
            } else {
                priority::NAME_UNBOUNDED
            },
        );
        task.date_from = date_from;
        task.date_to = date_to;
        task
    }

    pub fn with_trigger(mut self, triggered_by: impl Into<String>) -> Self {
        self.triggered_by = Some(triggered_by.into());
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            property_id: self.property_id.clone(),
            task_type: self.task_type,
            term: self.term.clone(),
            operator: self.operator,
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }

    pub fn is_date_bounded(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    /// Short label for logs and events
    pub fn describe(&self) -> String {
        let mut label = format!(
            "{} {} '{}'",
            self.task_type.as_str(),
            self.operator.as_str(),
            self.term
        );
        if self.is_date_bounded() {
            let from = self.date_from.map(|d| d.to_string()).unwrap_or_default();
            let to = self.date_to.map(|d| d.to_string()).unwrap_or_default();
            label.push_str(&format!(" [{}..{}]", from, to));
        }
        label
    }
}

pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}
