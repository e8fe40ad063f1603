//! Encumbrances, their survival classification, and instrument events

use super::{DocType, DocumentKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ASSOCIATION_WORDS: &[&str] = &[
    "ASSOCIATION",
    "ASSN",
    "HOMEOWNERS",
    "CONDOMINIUM",
    "CONDO",
    "HOA",
    "PROPERTY OWNERS",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncumbranceKind {
    Mortgage,
    AssociationLien,
    MechanicsLien,
    JudgmentLien,
    PropertyTax,
    FederalTax,
    MunicipalUtility,
    CodeEnforcement,
    OtherLien,
}

impl EncumbranceKind {
    /// Kind of encumbrance a document creates, if any
    ///
    /// A claim of lien is an association lien when the claimant is an
    /// association, otherwise a construction (mechanic's) lien.
    pub fn classify(doc_type: DocType, creditors: &[String]) -> Option<Self> {
        let creditor_is_association = creditors.iter().any(|c| {
            let upper = c.to_uppercase();
            ASSOCIATION_WORDS.iter().any(|w| upper.contains(w))
        });
        let kind = match doc_type {
            DocType::Mortgage => EncumbranceKind::Mortgage,
            DocType::Judgment => EncumbranceKind::JudgmentLien,
            DocType::TaxLien => EncumbranceKind::PropertyTax,
            DocType::FederalTaxLien => EncumbranceKind::FederalTax,
            DocType::UtilityLien => EncumbranceKind::MunicipalUtility,
            DocType::CodeEnforcementLien => EncumbranceKind::CodeEnforcement,
            DocType::ClaimOfLien if creditor_is_association => EncumbranceKind::AssociationLien,
            DocType::ClaimOfLien => EncumbranceKind::MechanicsLien,
            DocType::Lien if creditor_is_association => EncumbranceKind::AssociationLien,
            DocType::Lien => EncumbranceKind::OtherLien,
            _ => return None,
        };
        Some(kind)
    }

    /// Lien classes that survive foreclosure regardless of recording date
    pub fn is_superpriority(&self) -> bool {
        matches!(
            self,
            EncumbranceKind::PropertyTax
                | EncumbranceKind::FederalTax
                | EncumbranceKind::MunicipalUtility
                | EncumbranceKind::CodeEnforcement
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncumbranceKind::Mortgage => "MORTGAGE",
            EncumbranceKind::AssociationLien => "ASSOCIATION_LIEN",
            EncumbranceKind::MechanicsLien => "MECHANICS_LIEN",
            EncumbranceKind::JudgmentLien => "JUDGMENT_LIEN",
            EncumbranceKind::PropertyTax => "PROPERTY_TAX",
            EncumbranceKind::FederalTax => "FEDERAL_TAX",
            EncumbranceKind::MunicipalUtility => "MUNICIPAL_UTILITY",
            EncumbranceKind::CodeEnforcement => "CODE_ENFORCEMENT",
            EncumbranceKind::OtherLien => "OTHER_LIEN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        const ALL: &[EncumbranceKind] = &[
            EncumbranceKind::Mortgage,
            EncumbranceKind::AssociationLien,
            EncumbranceKind::MechanicsLien,
            EncumbranceKind::JudgmentLien,
            EncumbranceKind::PropertyTax,
            EncumbranceKind::FederalTax,
            EncumbranceKind::MunicipalUtility,
            EncumbranceKind::CodeEnforcement,
            EncumbranceKind::OtherLien,
        ];
        ALL.iter().copied().find(|k| k.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LienStatus {
    Open,
    Satisfied,
}

impl LienStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LienStatus::Open => "OPEN",
            LienStatus::Satisfied => "SATISFIED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(LienStatus::Open),
            "SATISFIED" => Some(LienStatus::Satisfied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurvivalStatus {
    Survived,
    Extinguished,
    Expired,
    Satisfied,
    Historical,
    Foreclosing,
    Uncertain,
}

impl SurvivalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurvivalStatus::Survived => "SURVIVED",
            SurvivalStatus::Extinguished => "EXTINGUISHED",
            SurvivalStatus::Expired => "EXPIRED",
            SurvivalStatus::Satisfied => "SATISFIED",
            SurvivalStatus::Historical => "HISTORICAL",
            SurvivalStatus::Foreclosing => "FORECLOSING",
            SurvivalStatus::Uncertain => "UNCERTAIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SURVIVED" => Some(SurvivalStatus::Survived),
            "EXTINGUISHED" => Some(SurvivalStatus::Extinguished),
            "EXPIRED" => Some(SurvivalStatus::Expired),
            "SATISFIED" => Some(SurvivalStatus::Satisfied),
            "HISTORICAL" => Some(SurvivalStatus::Historical),
            "FORECLOSING" => Some(SurvivalStatus::Foreclosing),
            "UNCERTAIN" => Some(SurvivalStatus::Uncertain),
            _ => None,
        }
    }
}

/// Output of the survival engine for one encumbrance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalClassification {
    pub status: SurvivalStatus,
    pub reason: String,
    /// Surviving dollar amount, where defined (safe-harbor cap or balance)
    pub amount: Option<f64>,
    pub is_inferred: bool,
}

/// A recorded mortgage, lien or judgment attached to the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encumbrance {
    pub property_id: String,
    pub key: DocumentKey,
    /// Book/page alias when the primary key is an instrument number
    pub book_page: Option<DocumentKey>,
    /// Assigned only from persisted periods
    pub ownership_period_id: Option<Uuid>,
    pub kind: EncumbranceKind,
    pub recording_date: NaiveDate,
    pub amount: Option<f64>,
    /// Current holder; assignments rewrite it
    pub creditor: String,
    pub original_creditor: String,
    pub debtor: String,
    pub maturity_date: Option<NaiveDate>,
    pub status: LienStatus,
    pub survival_status: Option<SurvivalStatus>,
    pub survival_reason: Option<String>,
    pub surviving_amount: Option<f64>,
    /// `None` when the foreclosure's party list was never extracted
    pub is_joined: Option<bool>,
    pub is_inferred: bool,
}

impl Encumbrance {
    pub fn matches_reference(&self, reference: &DocumentKey) -> bool {
        &self.key == reference || self.book_page.as_ref() == Some(reference)
    }

    pub fn apply_classification(&mut self, classification: &SurvivalClassification) {
        self.survival_status = Some(classification.status);
        self.survival_reason = Some(classification.reason.clone());
        self.surviving_amount = classification.amount;
        self.is_inferred = classification.is_inferred;
    }
}

/// Survival work captured before a chain rebuild, keyed by document key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalSnapshot {
    pub key: DocumentKey,
    pub book_page: Option<DocumentKey>,
    pub creditor: String,
    pub status: LienStatus,
    pub survival_status: Option<SurvivalStatus>,
    pub survival_reason: Option<String>,
    pub surviving_amount: Option<f64>,
    pub is_joined: Option<bool>,
    pub is_inferred: bool,
}

impl SurvivalSnapshot {
    pub fn of(encumbrance: &Encumbrance) -> Self {
        Self {
            key: encumbrance.key.clone(),
            book_page: encumbrance.book_page.clone(),
            creditor: encumbrance.creditor.clone(),
            status: encumbrance.status,
            survival_status: encumbrance.survival_status,
            survival_reason: encumbrance.survival_reason.clone(),
            surviving_amount: encumbrance.surviving_amount,
            is_joined: encumbrance.is_joined,
            is_inferred: encumbrance.is_inferred,
        }
    }

    pub fn matches(&self, encumbrance: &Encumbrance) -> bool {
        encumbrance.matches_reference(&self.key)
            || self
                .book_page
                .as_ref()
                .map_or(false, |bp| encumbrance.matches_reference(bp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Assignment,
    Satisfaction,
}

/// Assignment or satisfaction/release of an earlier encumbrance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentEvent {
    pub instrument: DocumentKey,
    pub event_type: EventType,
    pub recording_date: NaiveDate,
    pub referenced: DocumentKey,
    /// Assignee for assignments; releasing party for satisfactions
    pub counterparty_name: Option<String>,
}
