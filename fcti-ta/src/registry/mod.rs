//! Document registry collaborator
//!
//! The registry is the external record system discovery searches. The
//! engine depends only on the `DocumentRegistry` trait; `HttpRegistryClient`
//! talks to a JSON search endpoint and `RegistryChannels` wraps a primary
//! and fallback channel with shared rate-limit state.

pub mod channels;
pub mod decode;
pub mod http;

pub use channels::{ChannelOutcome, RegistryChannels};
pub use decode::{decode_response, decode_summary};
pub use http::HttpRegistryClient;

use crate::models::{DocType, Document, SearchOperator, SearchTask, TaskType};
use chrono::NaiveDate;
use fcti_common::time::parse_recording_date;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One registry search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub task_type: TaskType,
    pub term: String,
    pub operator: SearchOperator,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl From<&SearchTask> for SearchQuery {
    fn from(task: &SearchTask) -> Self {
        Self {
            task_type: task.task_type,
            term: task.term.clone(),
            operator: task.operator,
            date_from: task.date_from,
            date_to: task.date_to,
        }
    }
}

/// Registry search hit, decoded from whatever shape the backend returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub instrument: Option<String>,
    pub book: Option<String>,
    pub page: Option<String>,
    /// Recording timestamp exactly as reported
    pub recorded_raw: Option<String>,
    pub doc_type_code: String,
    pub party_one: Vec<String>,
    pub party_two: Vec<String>,
    pub legal_text: Option<String>,
    pub case_number: Option<String>,
    pub amount: Option<f64>,
    /// Stored document text, when the registry returns it inline
    pub content: Option<String>,
}

impl DocumentSummary {
    pub fn recording_date(&self) -> Option<NaiveDate> {
        self.recorded_raw.as_deref().and_then(parse_recording_date)
    }

    /// Convert into a property document (extraction fills the rest later)
    pub fn into_document(self, property_id: &str, discovered_by: &str) -> Document {
        let recording_date = self.recording_date();
        Document {
            property_id: property_id.to_string(),
            instrument: self.instrument,
            book: self.book,
            page: self.page,
            recording_date,
            doc_type: DocType::from_code(&self.doc_type_code),
            doc_type_code: self.doc_type_code,
            party_one: self.party_one,
            party_two: self.party_two,
            legal_text: self.legal_text,
            amount: self.amount,
            case_number: self.case_number,
            maturity_date: None,
            referenced_instruments: Vec::new(),
            is_self_transfer: false,
            raw_text: self.content,
            discovered_by: Some(discovered_by.to_string()),
        }
    }
}

/// Registry failure
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP 429 or an equivalent throttling signal
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Registry returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match any known shape
    #[error("Undecodable response: {0}")]
    Decode(String),
}

impl RegistryError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RegistryError::RateLimited { .. })
    }

    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::RateLimited { .. }
            | RegistryError::Timeout(_)
            | RegistryError::Network(_) => true,
            RegistryError::Status { status, .. } => *status >= 500,
            RegistryError::Decode(_) => false,
        }
    }
}

/// Document registry search backend
#[async_trait::async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Channel name for logs and events
    fn name(&self) -> &str;

    /// Run one search
    ///
    /// # Errors
    /// `RegistryError::RateLimited` must be distinguishable from other
    /// failures so the caller can back off instead of burning attempts.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<DocumentSummary>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_into_document() {
        let summary = DocumentSummary {
            instrument: Some("2015-0001".into()),
            recorded_raw: Some("03/15/2015".into()),
            doc_type_code: "MTG".into(),
            party_one: vec!["DOE JANE".into()],
            party_two: vec!["FIRST NATIONAL LENDER".into()],
            amount: Some(300_000.0),
            ..Default::default()
        };
        let doc = summary.into_document("p1", "REFERENCE EXACT '2015-0001'");
        assert_eq!(doc.doc_type, DocType::Mortgage);
        assert_eq!(doc.recording_date, NaiveDate::from_ymd_opt(2015, 3, 15));
        assert_eq!(doc.creditors(), &["FIRST NATIONAL LENDER".to_string()]);
    }

    #[test]
    fn test_transient_errors() {
        assert!(RegistryError::RateLimited { retry_after_secs: None }.is_transient());
        assert!(RegistryError::Status { status: 503, message: String::new() }.is_transient());
        assert!(!RegistryError::Status { status: 400, message: String::new() }.is_transient());
        assert!(!RegistryError::Decode("x".into()).is_transient());
    }
}
