//! Property and legal-description variation models

use chrono::{DateTime, Utc};
use fcti_common::events::DiscoveryState;
use serde::{Deserialize, Serialize};

/// A parcel under analysis, keyed by folio / parcel id
///
/// The key is immutable; everything else is derived state the pipeline
/// rewrites as it learns more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub property_id: String,
    pub case_number: Option<String>,
    pub discovery_state: DiscoveryState,
    /// Set only when the chain builder actually produced periods
    pub chain_complete: bool,
    /// Set only when classification ran over the current encumbrance set
    pub survival_complete: bool,
    /// A rebuild replaced encumbrances whose classification could not be carried over
    pub needs_reanalysis: bool,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            case_number: None,
            discovery_state: DiscoveryState::Initializing,
            chain_complete: false,
            survival_complete: false,
            needs_reanalysis: false,
            updated_at: Utc::now(),
        }
    }
}

/// Where a legal-description variant was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegalSource {
    Judgment,
    RegistryAppraisal,
    DiscoveredDocument,
    BulkImport,
}

impl LegalSource {
    /// Trust rank of the source (lower = more trusted)
    pub fn priority(&self) -> i32 {
        match self {
            LegalSource::Judgment => 1,
            LegalSource::RegistryAppraisal => 2,
            LegalSource::BulkImport => 3,
            LegalSource::DiscoveredDocument => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegalSource::Judgment => "JUDGMENT",
            LegalSource::RegistryAppraisal => "REGISTRY_APPRAISAL",
            LegalSource::DiscoveredDocument => "DISCOVERED_DOCUMENT",
            LegalSource::BulkImport => "BULK_IMPORT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "JUDGMENT" => Some(LegalSource::Judgment),
            "REGISTRY_APPRAISAL" => Some(LegalSource::RegistryAppraisal),
            "DISCOVERED_DOCUMENT" => Some(LegalSource::DiscoveredDocument),
            "BULK_IMPORT" => Some(LegalSource::BulkImport),
            _ => None,
        }
    }
}

/// One observed spelling of the property's legal description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalVariation {
    pub property_id: String,
    pub text: String,
    pub source: LegalSource,
    pub priority: i32,
    /// Flips false → true exactly once, when its permutations are queued
    pub search_attempted: bool,
}

impl LegalVariation {
    pub fn new(property_id: impl Into<String>, text: &str, source: LegalSource) -> Self {
        Self {
            property_id: property_id.into(),
            text: normalize_legal_text(text),
            source,
            priority: source.priority(),
            search_attempted: false,
        }
    }
}

/// Uppercase and collapse whitespace so cosmetic variants share one row
pub fn normalize_legal_text(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}
