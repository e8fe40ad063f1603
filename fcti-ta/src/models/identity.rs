//! Identity model: name variants grouped into one logical party

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Individual,
    Trust,
    Llc,
    Corporation,
    Institution,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Individual => "INDIVIDUAL",
            EntityType::Trust => "TRUST",
            EntityType::Llc => "LLC",
            EntityType::Corporation => "CORPORATION",
            EntityType::Institution => "INSTITUTION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INDIVIDUAL" => Some(EntityType::Individual),
            "TRUST" => Some(EntityType::Trust),
            "LLC" => Some(EntityType::Llc),
            "CORPORATION" => Some(EntityType::Corporation),
            "INSTITUTION" => Some(EntityType::Institution),
            _ => None,
        }
    }
}

/// How two names were judged to be the same party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    Exact,
    TrustTransfer,
    SpellingVariation,
    NameChange,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Exact => "EXACT",
            LinkType::TrustTransfer => "TRUST_TRANSFER",
            LinkType::SpellingVariation => "SPELLING_VARIATION",
            LinkType::NameChange => "NAME_CHANGE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXACT" => Some(LinkType::Exact),
            "TRUST_TRANSFER" => Some(LinkType::TrustTransfer),
            "SPELLING_VARIATION" => Some(LinkType::SpellingVariation),
            "NAME_CHANGE" => Some(LinkType::NameChange),
            _ => None,
        }
    }
}

/// Result of comparing two names
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDecision {
    /// `None` when the names are not linked
    pub link_type: Option<LinkType>,
    pub confidence: f64,
}

impl LinkDecision {
    pub fn none() -> Self {
        Self {
            link_type: None,
            confidence: 0.0,
        }
    }

    pub fn linked(link_type: LinkType, confidence: f64) -> Self {
        Self {
            link_type: Some(link_type),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.link_type.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMember {
    pub name: String,
    pub canonical_key: String,
    pub link_type: LinkType,
    pub confidence: f64,
}

/// A logical party: every recorded spelling that resolves to it
///
/// Grows by adding members; two existing identities are never merged
/// automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub members: Vec<IdentityMember>,
    /// Weakest link that joined any member
    pub link_type: LinkType,
    /// Lowest member confidence
    pub confidence: f64,
}

impl Identity {
    pub fn contains_key(&self, canonical_key: &str) -> bool {
        self.members.iter().any(|m| m.canonical_key == canonical_key)
    }
}
