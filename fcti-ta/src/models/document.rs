//! Recorded instrument model
//!
//! A `Document` is one recorded instrument as summarized by the registry and
//! enriched by text extraction. Documents are keyed by instrument number when
//! one exists, else by book/page.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniqueness key of a document within a property
///
/// The same shape doubles as a cross-reference from one document to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DocumentKey {
    Instrument { number: String },
    BookPage { book: String, page: String },
}

impl DocumentKey {
    pub fn instrument(number: &str) -> Self {
        DocumentKey::Instrument {
            number: clean_reference(number),
        }
    }

    pub fn book_page(book: &str, page: &str) -> Self {
        DocumentKey::BookPage {
            book: clean_reference(book).trim_start_matches('0').to_string(),
            page: clean_reference(page).trim_start_matches('0').to_string(),
        }
    }

    /// Term submitted to the registry for a reference lookup
    pub fn search_term(&self) -> String {
        match self {
            DocumentKey::Instrument { number } => number.clone(),
            DocumentKey::BookPage { book, page } => format!("{}/{}", book, page),
        }
    }

    /// Inverse of `Display`, used by the store
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(number) = value.strip_prefix("INSTR:") {
            return Some(DocumentKey::instrument(number));
        }
        let rest = value.strip_prefix("BK:")?;
        let (book, page) = rest.split_once("/PG:")?;
        Some(DocumentKey::book_page(book, page))
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKey::Instrument { number } => write!(f, "INSTR:{}", number),
            DocumentKey::BookPage { book, page } => write!(f, "BK:{}/PG:{}", book, page),
        }
    }
}

fn clean_reference(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_uppercase()
}

/// Instrument classification derived from the registry's type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    WarrantyDeed,
    SpecialWarrantyDeed,
    QuitClaimDeed,
    Deed,
    CertificateOfTitle,
    TaxDeed,
    TrusteeDeed,
    PersonalRepresentativeDeed,
    Plat,
    Patent,
    GovernmentDeed,
    Mortgage,
    Assignment,
    Satisfaction,
    Release,
    LisPendens,
    Judgment,
    ClaimOfLien,
    Lien,
    TaxLien,
    FederalTaxLien,
    CodeEnforcementLien,
    UtilityLien,
    Other,
}

/// Exact registry codes, checked before keyword matching
const CODE_TABLE: &[(&str, DocType)] = &[
    ("D", DocType::Deed),
    ("DEED", DocType::Deed),
    ("WD", DocType::WarrantyDeed),
    ("SWD", DocType::SpecialWarrantyDeed),
    ("QC", DocType::QuitClaimDeed),
    ("QCD", DocType::QuitClaimDeed),
    ("CT", DocType::CertificateOfTitle),
    ("COT", DocType::CertificateOfTitle),
    ("TD", DocType::TaxDeed),
    ("TXD", DocType::TaxDeed),
    ("TRD", DocType::TrusteeDeed),
    ("PRD", DocType::PersonalRepresentativeDeed),
    ("PL", DocType::Plat),
    ("PLAT", DocType::Plat),
    ("PAT", DocType::Patent),
    ("GD", DocType::GovernmentDeed),
    ("M", DocType::Mortgage),
    ("MTG", DocType::Mortgage),
    ("MORT", DocType::Mortgage),
    ("ASG", DocType::Assignment),
    ("AMTG", DocType::Assignment),
    ("SAT", DocType::Satisfaction),
    ("SMTG", DocType::Satisfaction),
    ("REL", DocType::Release),
    ("LP", DocType::LisPendens),
    ("J", DocType::Judgment),
    ("JUD", DocType::Judgment),
    ("FJ", DocType::Judgment),
    ("CCJ", DocType::Judgment),
    ("CL", DocType::ClaimOfLien),
    ("LN", DocType::Lien),
    ("LIEN", DocType::Lien),
    ("TL", DocType::TaxLien),
    ("FTL", DocType::FederalTaxLien),
    ("CEL", DocType::CodeEnforcementLien),
    ("UL", DocType::UtilityLien),
];

/// Keyword fallbacks for descriptive type strings, most specific first
const KEYWORD_TABLE: &[(&str, DocType)] = &[
    ("SPECIAL WARRANTY", DocType::SpecialWarrantyDeed),
    ("WARRANTY DEED", DocType::WarrantyDeed),
    ("QUIT CLAIM", DocType::QuitClaimDeed),
    ("QUITCLAIM", DocType::QuitClaimDeed),
    ("CERTIFICATE OF TITLE", DocType::CertificateOfTitle),
    ("TAX DEED", DocType::TaxDeed),
    ("TRUSTEE", DocType::TrusteeDeed),
    ("PERSONAL REPRESENTATIVE", DocType::PersonalRepresentativeDeed),
    ("PLAT", DocType::Plat),
    ("PATENT", DocType::Patent),
    ("GOVERNMENT DEED", DocType::GovernmentDeed),
    ("STATE DEED", DocType::GovernmentDeed),
    ("ASSIGNMENT", DocType::Assignment),
    ("SATISFACTION", DocType::Satisfaction),
    ("RELEASE", DocType::Release),
    ("LIS PENDENS", DocType::LisPendens),
    ("FEDERAL TAX", DocType::FederalTaxLien),
    ("INTERNAL REVENUE", DocType::FederalTaxLien),
    ("CODE ENFORCEMENT", DocType::CodeEnforcementLien),
    ("UTILITY", DocType::UtilityLien),
    ("TAX LIEN", DocType::TaxLien),
    ("TAX CERTIFICATE", DocType::TaxLien),
    ("CLAIM OF LIEN", DocType::ClaimOfLien),
    ("JUDGMENT", DocType::Judgment),
    ("MORTGAGE", DocType::Mortgage),
    ("LIEN", DocType::Lien),
    ("DEED", DocType::Deed),
];

impl DocType {
    /// Map a registry type code or description onto a `DocType`
    pub fn from_code(code: &str) -> Self {
        let upper = code.trim().to_uppercase();
        if let Some((_, doc_type)) = CODE_TABLE.iter().find(|(c, _)| *c == upper) {
            return *doc_type;
        }
        // Registries often prefix codes ("(WD) WARRANTY DEED")
        let stripped: String = upper
            .trim_start_matches('(')
            .split(|c: char| c == ')' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_string();
        if let Some((_, doc_type)) = CODE_TABLE.iter().find(|(c, _)| *c == stripped) {
            return *doc_type;
        }
        KEYWORD_TABLE
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
            .map(|(_, doc_type)| *doc_type)
            .unwrap_or(DocType::Other)
    }

    /// Instruments that transfer ownership
    pub fn is_deed(&self) -> bool {
        matches!(
            self,
            DocType::WarrantyDeed
                | DocType::SpecialWarrantyDeed
                | DocType::QuitClaimDeed
                | DocType::Deed
                | DocType::CertificateOfTitle
                | DocType::TaxDeed
                | DocType::TrusteeDeed
                | DocType::PersonalRepresentativeDeed
                | DocType::Plat
                | DocType::Patent
                | DocType::GovernmentDeed
        )
    }

    /// Instruments sufficient to anchor a chain on their own
    pub fn is_root_of_title(&self) -> bool {
        matches!(self, DocType::Plat | DocType::Patent | DocType::GovernmentDeed)
    }

    /// Instruments that record a debt against the property
    pub fn is_encumbrance(&self) -> bool {
        matches!(
            self,
            DocType::Mortgage
                | DocType::Judgment
                | DocType::ClaimOfLien
                | DocType::Lien
                | DocType::TaxLien
                | DocType::FederalTaxLien
                | DocType::CodeEnforcementLien
                | DocType::UtilityLien
        )
    }

    /// Instruments that modify an existing encumbrance
    pub fn is_instrument_event(&self) -> bool {
        matches!(
            self,
            DocType::Assignment | DocType::Satisfaction | DocType::Release
        )
    }

    /// Which party list names the creditor of an encumbrance
    ///
    /// Mortgages list the borrower first; liens and judgments list the lienor.
    pub fn creditor_side(&self) -> PartySide {
        match self {
            DocType::Mortgage => PartySide::Two,
            _ => PartySide::One,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::WarrantyDeed => "WARRANTY_DEED",
            DocType::SpecialWarrantyDeed => "SPECIAL_WARRANTY_DEED",
            DocType::QuitClaimDeed => "QUIT_CLAIM_DEED",
            DocType::Deed => "DEED",
            DocType::CertificateOfTitle => "CERTIFICATE_OF_TITLE",
            DocType::TaxDeed => "TAX_DEED",
            DocType::TrusteeDeed => "TRUSTEE_DEED",
            DocType::PersonalRepresentativeDeed => "PERSONAL_REPRESENTATIVE_DEED",
            DocType::Plat => "PLAT",
            DocType::Patent => "PATENT",
            DocType::GovernmentDeed => "GOVERNMENT_DEED",
            DocType::Mortgage => "MORTGAGE",
            DocType::Assignment => "ASSIGNMENT",
            DocType::Satisfaction => "SATISFACTION",
            DocType::Release => "RELEASE",
            DocType::LisPendens => "LIS_PENDENS",
            DocType::Judgment => "JUDGMENT",
            DocType::ClaimOfLien => "CLAIM_OF_LIEN",
            DocType::Lien => "LIEN",
            DocType::TaxLien => "TAX_LIEN",
            DocType::FederalTaxLien => "FEDERAL_TAX_LIEN",
            DocType::CodeEnforcementLien => "CODE_ENFORCEMENT_LIEN",
            DocType::UtilityLien => "UTILITY_LIEN",
            DocType::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        const ALL: &[DocType] = &[
            DocType::WarrantyDeed,
            DocType::SpecialWarrantyDeed,
            DocType::QuitClaimDeed,
            DocType::Deed,
            DocType::CertificateOfTitle,
            DocType::TaxDeed,
            DocType::TrusteeDeed,
            DocType::PersonalRepresentativeDeed,
            DocType::Plat,
            DocType::Patent,
            DocType::GovernmentDeed,
            DocType::Mortgage,
            DocType::Assignment,
            DocType::Satisfaction,
            DocType::Release,
            DocType::LisPendens,
            DocType::Judgment,
            DocType::ClaimOfLien,
            DocType::Lien,
            DocType::TaxLien,
            DocType::FederalTaxLien,
            DocType::CodeEnforcementLien,
            DocType::UtilityLien,
            DocType::Other,
        ];
        ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartySide {
    One,
    Two,
}

/// One recorded instrument affecting the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub property_id: String,
    pub instrument: Option<String>,
    pub book: Option<String>,
    pub page: Option<String>,
    pub recording_date: Option<NaiveDate>,
    pub doc_type: DocType,
    /// Type code exactly as the registry reported it
    pub doc_type_code: String,
    /// Grantors / mortgagors / lienors, in registry order
    pub party_one: Vec<String>,
    /// Grantees / mortgagees / debtors, in registry order
    pub party_two: Vec<String>,
    pub legal_text: Option<String>,
    pub amount: Option<f64>,
    pub case_number: Option<String>,
    pub maturity_date: Option<NaiveDate>,
    pub referenced_instruments: Vec<DocumentKey>,
    pub is_self_transfer: bool,
    /// Extracted full text, when the extractor produced any
    pub raw_text: Option<String>,
    /// Description of the search task that surfaced the document
    pub discovered_by: Option<String>,
}

impl Document {
    /// Instrument number when present, else book/page
    pub fn key(&self) -> Option<DocumentKey> {
        if let Some(number) = self.instrument.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(DocumentKey::instrument(number));
        }
        match (self.book.as_deref(), self.page.as_deref()) {
            (Some(book), Some(page)) if !book.trim().is_empty() && !page.trim().is_empty() => {
                Some(DocumentKey::book_page(book, page))
            }
            _ => None,
        }
    }

    /// Book/page key even when an instrument number exists
    pub fn book_page_key(&self) -> Option<DocumentKey> {
        match (self.book.as_deref(), self.page.as_deref()) {
            (Some(book), Some(page)) if !book.trim().is_empty() && !page.trim().is_empty() => {
                Some(DocumentKey::book_page(book, page))
            }
            _ => None,
        }
    }

    /// True when `reference` names this document by either key form
    pub fn matches_reference(&self, reference: &DocumentKey) -> bool {
        self.key().as_ref() == Some(reference) || self.book_page_key().as_ref() == Some(reference)
    }

    pub fn grantors(&self) -> &[String] {
        &self.party_one
    }

    pub fn grantees(&self) -> &[String] {
        &self.party_two
    }

    pub fn creditors(&self) -> &[String] {
        match self.doc_type.creditor_side() {
            PartySide::One => &self.party_one,
            PartySide::Two => &self.party_two,
        }
    }

    pub fn debtors(&self) -> &[String] {
        match self.doc_type.creditor_side() {
            PartySide::One => &self.party_two,
            PartySide::Two => &self.party_one,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(instrument: Option<&str>, book: Option<&str>, page: Option<&str>) -> Document {
        Document {
            property_id: "p1".to_string(),
            instrument: instrument.map(String::from),
            book: book.map(String::from),
            page: page.map(String::from),
            recording_date: None,
            doc_type: DocType::Deed,
            doc_type_code: "D".to_string(),
            party_one: vec![],
            party_two: vec![],
            legal_text: None,
            amount: None,
            case_number: None,
            maturity_date: None,
            referenced_instruments: vec![],
            is_self_transfer: false,
            raw_text: None,
            discovered_by: None,
        }
    }

    #[test]
    fn test_instrument_key_preferred() {
        let d = doc(Some("2019-123456"), Some("1234"), Some("56"));
        assert_eq!(d.key(), Some(DocumentKey::instrument("2019-123456")));
        assert!(d.matches_reference(&DocumentKey::book_page("1234", "0056")));
    }

    #[test]
    fn test_book_page_key_fallback() {
        let d = doc(None, Some("01234"), Some("56"));
        assert_eq!(d.key(), Some(DocumentKey::book_page("1234", "56")));
        assert_eq!(doc(Some("  "), None, Some("5")).key(), None);
    }

    #[test]
    fn test_key_display_parse() {
        for key in [
            DocumentKey::instrument("2019123456"),
            DocumentKey::book_page("1234", "567"),
        ] {
            assert_eq!(DocumentKey::parse(&key.to_string()), Some(key));
        }
    }

    #[test]
    fn test_doc_type_codes_and_keywords() {
        assert_eq!(DocType::from_code("wd"), DocType::WarrantyDeed);
        assert_eq!(DocType::from_code("(MTG) MORTGAGE"), DocType::Mortgage);
        assert_eq!(DocType::from_code("SPECIAL WARRANTY DEED"), DocType::SpecialWarrantyDeed);
        assert_eq!(DocType::from_code("NOTICE OF LIS PENDENS"), DocType::LisPendens);
        assert_eq!(DocType::from_code("CLAIM OF LIEN"), DocType::ClaimOfLien);
        assert_eq!(DocType::from_code("NOTICE OF COMMENCEMENT"), DocType::Other);
    }

    #[test]
    fn test_deed_and_root_classes() {
        assert!(DocType::QuitClaimDeed.is_deed());
        assert!(DocType::Plat.is_root_of_title());
        assert!(!DocType::Mortgage.is_deed());
        assert!(DocType::Mortgage.is_encumbrance());
        assert!(DocType::Satisfaction.is_instrument_event());
        assert_eq!(DocType::Mortgage.creditor_side(), PartySide::Two);
        assert_eq!(DocType::Judgment.creditor_side(), PartySide::One);
    }
}
