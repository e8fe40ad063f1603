//! Typed data-quality warnings
//!
//! Data-quality problems are attached to the property and surfaced to
//! downstream consumers instead of being silently defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    UnparseableDate,
    ThinExtraction,
    AmbiguousIdentity,
    UnkeyedDocument,
    UnassociatedDocument,
    ChainGap,
    CrossLotRejected,
    MissingPartyList,
    OrphanEvent,
    UnknownForeclosureType,
    ZeroPeriods,
    SearchFailed,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::UnparseableDate => "UNPARSEABLE_DATE",
            WarningKind::ThinExtraction => "THIN_EXTRACTION",
            WarningKind::AmbiguousIdentity => "AMBIGUOUS_IDENTITY",
            WarningKind::UnkeyedDocument => "UNKEYED_DOCUMENT",
            WarningKind::UnassociatedDocument => "UNASSOCIATED_DOCUMENT",
            WarningKind::ChainGap => "CHAIN_GAP",
            WarningKind::CrossLotRejected => "CROSS_LOT_REJECTED",
            WarningKind::MissingPartyList => "MISSING_PARTY_LIST",
            WarningKind::OrphanEvent => "ORPHAN_EVENT",
            WarningKind::UnknownForeclosureType => "UNKNOWN_FORECLOSURE_TYPE",
            WarningKind::ZeroPeriods => "ZERO_PERIODS",
            WarningKind::SearchFailed => "SEARCH_FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        const ALL: &[WarningKind] = &[
            WarningKind::UnparseableDate,
            WarningKind::ThinExtraction,
            WarningKind::AmbiguousIdentity,
            WarningKind::UnkeyedDocument,
            WarningKind::UnassociatedDocument,
            WarningKind::ChainGap,
            WarningKind::CrossLotRejected,
            WarningKind::MissingPartyList,
            WarningKind::OrphanEvent,
            WarningKind::UnknownForeclosureType,
            WarningKind::ZeroPeriods,
            WarningKind::SearchFailed,
        ];
        ALL.iter().copied().find(|k| k.as_str() == value)
    }

    /// Kinds derived from the chain as a whole; a rebuild replaces them
    pub const REBUILD_OWNED: &'static [WarningKind] = &[
        WarningKind::ChainGap,
        WarningKind::CrossLotRejected,
        WarningKind::UnassociatedDocument,
        WarningKind::ZeroPeriods,
    ];

    pub fn rebuild_owned(&self) -> bool {
        Self::REBUILD_OWNED.contains(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityWarning {
    pub property_id: String,
    pub kind: WarningKind,
    /// Entity the warning is about (document key, task label, name)
    pub target: Option<String>,
    pub detail: String,
    /// Raw text kept for manual review (thin extractions)
    pub review_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DataQualityWarning {
    pub fn new(
        property_id: impl Into<String>,
        kind: WarningKind,
        target: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            kind,
            target,
            detail: detail.into(),
            review_text: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_review_text(mut self, text: impl Into<String>) -> Self {
        self.review_text = Some(text.into());
        self
    }
}
