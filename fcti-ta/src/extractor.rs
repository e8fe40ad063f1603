//! Document text extraction
//!
//! Turns a document's stored text into structured fields: legal text,
//! case number, referenced instruments, amounts, maturity, party roles and
//! the instruments a foreclosure names. A document whose text exists but is
//! unusable comes back as `Extraction::Thin`, never as "nothing found".

use crate::models::{Document, DocumentKey};
use chrono::NaiveDate;
use fcti_common::time::parse_recording_date;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured fields recovered from a document's text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub legal_text: Option<String>,
    pub case_number: Option<String>,
    pub referenced_instruments: Vec<DocumentKey>,
    /// References named as the subject of a foreclosure
    pub foreclosed_instruments: Vec<DocumentKey>,
    pub amount: Option<f64>,
    pub maturity_date: Option<NaiveDate>,
    pub grantors: Vec<String>,
    pub grantees: Vec<String>,
    pub plaintiff: Option<String>,
    pub defendants: Vec<String>,
}

/// Extractor verdict for one document
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Structured(ExtractedFields),
    /// Text present but unusable; keep the dump for manual review
    Thin { reason: String, text_dump: String },
}

#[async_trait::async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Extraction;
}

/// Minimum usable text length
const MIN_TEXT_LEN: usize = 40;
/// Minimum share of letters/digits/whitespace for text to count as legible
const MIN_LEGIBLE_RATIO: f64 = 0.7;
/// Characters scanned before a reference for foreclosure language
const FORECLOSURE_LOOKBEHIND: usize = 240;

static LEGAL_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)LEGAL\s+DESCRIPTION\s*:?\s*(.+?)(?:\n\s*\n|$)").expect("valid regex")
});
static LEGAL_LOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b((?:LOTS?\s+\d+[A-Z]?\s*,?\s*(?:BLOCK|BLK)\s+\w+|UNIT\s+(?:NO\.?\s*)?[0-9A-Z-]+)[^\n]*)")
        .expect("valid regex")
});
static CASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{2,4}-[A-Z]{2}-\d{3,8}(?:-[A-Z0-9]{1,6})?)\b").expect("valid regex")
});
static INSTRUMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:INSTRUMENT|INSTR|CFN|CLERK'?S\s+FILE)\s*(?:NO\.?|NUMBER|#)?\s*:?\s*(\d{4}-?\d{3,10}|\d{6,12})\b")
        .expect("valid regex")
});
static BOOK_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(PLAT\s+)?(?:OFFICIAL\s+RECORDS?\s+|O\.?\s?R\.?\s+)?(?:BOOK|BK)\.?\s*(\d+)\s*,?\s*(?:AT\s+)?(?:PAGES?|PGS?|PG)\.?\s*(\d+)")
        .expect("valid regex")
});
static PRINCIPAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)PRINCIPAL\s+(?:SUM|AMOUNT)\s+OF\s+[^$]{0,80}\$\s?([\d,]+(?:\.\d{2})?)")
        .expect("valid regex")
});
static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?([\d,]+(?:\.\d{2})?)").expect("valid regex"));
static MATURITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)MATUR(?:ITY|ES)\s+(?:DATE\s+)?(?:IS\s+|ON\s+|OF\s+)?:?\s*([A-Z]+\s+\d{1,2},?\s+\d{4}|\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})")
        .expect("valid regex")
});
static ROLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(GRANTORS?|GRANTEES?|PLAINTIFFS?|DEFENDANTS?)\s*:\s*(.+)$").expect("valid regex")
});

fn legible(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let good = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ",.$/-:#'&()".contains(*c))
        .count();
    good as f64 / total as f64 >= MIN_LEGIBLE_RATIO
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(';')
        .flat_map(|part| part.split(" AND "))
        .map(|n| n.trim().trim_end_matches(',').trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Regex-driven extractor over the document's stored text
#[derive(Debug, Default, Clone)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract fields from raw text
    pub fn extract_text(&self, text: &str) -> Extraction {
        let trimmed = text.trim();
        if trimmed.len() < MIN_TEXT_LEN {
            return Extraction::Thin {
                reason: format!("text too short ({} chars)", trimmed.len()),
                text_dump: trimmed.to_string(),
            };
        }
        if !legible(trimmed) {
            return Extraction::Thin {
                reason: "text is mostly non-textual noise".to_string(),
                text_dump: trimmed.to_string(),
            };
        }

        let upper = trimmed.to_uppercase();
        let mut fields = ExtractedFields::default();

        fields.legal_text = LEGAL_LABEL_RE
            .captures(&upper)
            .or_else(|| LEGAL_LOT_RE.captures(&upper))
            .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
            .map(|s| s.chars().take(300).collect());

        fields.case_number = CASE_RE.captures(&upper).map(|c| c[1].to_string());

        let mut references: Vec<(usize, DocumentKey)> = Vec::new();
        for caps in INSTRUMENT_RE.captures_iter(&upper) {
            if let Some(m) = caps.get(1) {
                references.push((m.start(), DocumentKey::instrument(m.as_str())));
            }
        }
        for caps in BOOK_PAGE_RE.captures_iter(&upper) {
            if caps.get(1).is_some() {
                continue; // plat book reference, not a recorded instrument
            }
            if let (Some(book), Some(page)) = (caps.get(2), caps.get(3)) {
                references.push((book.start(), DocumentKey::book_page(book.as_str(), page.as_str())));
            }
        }
        references.sort_by_key(|(pos, _)| *pos);
        for (pos, key) in references {
            let mut window_start = pos.saturating_sub(FORECLOSURE_LOOKBEHIND);
            while !upper.is_char_boundary(window_start) {
                window_start += 1;
            }
            let preceding = &upper[window_start..pos];
            if preceding.contains("FORECLOS") && !fields.foreclosed_instruments.contains(&key) {
                fields.foreclosed_instruments.push(key.clone());
            }
            if !fields.referenced_instruments.contains(&key) {
                fields.referenced_instruments.push(key);
            }
        }

        fields.amount = PRINCIPAL_RE
            .captures(&upper)
            .or_else(|| AMOUNT_RE.captures(&upper))
            .and_then(|c| parse_amount(&c[1]));

        fields.maturity_date = MATURITY_RE
            .captures(&upper)
            .and_then(|c| parse_recording_date(&c[1]));

        for caps in ROLE_RE.captures_iter(&upper) {
            let names = split_names(&caps[2]);
            match &caps[1] {
                r if r.starts_with("GRANTOR") => fields.grantors.extend(names),
                r if r.starts_with("GRANTEE") => fields.grantees.extend(names),
                r if r.starts_with("PLAINTIFF") => {
                    if fields.plaintiff.is_none() {
                        fields.plaintiff = names.into_iter().next();
                    }
                }
                _ => fields.defendants.extend(names),
            }
        }

        Extraction::Structured(fields)
    }
}

#[async_trait::async_trait]
impl DocumentTextExtractor for RuleBasedExtractor {
    async fn extract(&self, document: &Document) -> Extraction {
        match document.raw_text.as_deref() {
            Some(text) => self.extract_text(text),
            None => Extraction::Structured(ExtractedFields::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIS_PENDENS: &str = "NOTICE OF LIS PENDENS\n\
        CASE NO. 2022-CA-001234\n\
        PLAINTIFF: FIRST NATIONAL LENDER\n\
        DEFENDANTS: DOE JANE; DOE JOHN AND PALM ESTATES HOMEOWNERS ASSOCIATION INC\n\
        This action seeks to foreclose the mortgage recorded in Official Records Book 28000, Page 1450 \
        (Instrument No. 2015-0001) against the following property:\n\
        Legal Description: Lot 5, Block 3, PALM ESTATES, according to the plat thereof \
        recorded in Plat Book 45, Page 12.\n\n\
        Also referenced: Instrument 2018-0042.";

    #[test]
    fn test_lis_pendens_fields() {
        let Extraction::Structured(fields) = RuleBasedExtractor::new().extract_text(LIS_PENDENS) else {
            panic!("expected structured extraction");
        };
        assert_eq!(fields.case_number.as_deref(), Some("2022-CA-001234"));
        assert_eq!(fields.plaintiff.as_deref(), Some("FIRST NATIONAL LENDER"));
        assert_eq!(fields.defendants.len(), 3);
        assert!(fields
            .legal_text
            .as_deref()
            .unwrap()
            .starts_with("LOT 5, BLOCK 3, PALM ESTATES"));

        assert!(fields.referenced_instruments.contains(&DocumentKey::book_page("28000", "1450")));
        assert!(fields.referenced_instruments.contains(&DocumentKey::instrument("2015-0001")));
        assert!(fields.referenced_instruments.contains(&DocumentKey::instrument("2018-0042")));
        // Plat book is not an instrument reference
        assert!(!fields.referenced_instruments.contains(&DocumentKey::book_page("45", "12")));

        assert!(fields.foreclosed_instruments.contains(&DocumentKey::instrument("2015-0001")));
    }

    #[test]
    fn test_mortgage_amount_and_maturity() {
        let text = "MORTGAGE. Borrower owes Lender the principal sum of Three Hundred Thousand \
            Dollars (U.S. $300,000.00). This debt is due and payable in full; maturity date \
            is April 1, 2045. Grantor: DOE JANE";
        let Extraction::Structured(fields) = RuleBasedExtractor::new().extract_text(text) else {
            panic!("expected structured extraction");
        };
        assert_eq!(fields.amount, Some(300_000.0));
        assert_eq!(fields.maturity_date, NaiveDate::from_ymd_opt(2045, 4, 1));
    }

    #[test]
    fn test_thin_text() {
        match RuleBasedExtractor::new().extract_text("~~ ## ~~") {
            Extraction::Thin { text_dump, .. } => assert_eq!(text_dump, "~~ ## ~~"),
            other => panic!("expected thin, got {:?}", other),
        }
        let noise = "@@@@ %%%% ^^^^ **** @@@@ %%%% ^^^^ **** @@@@ %%%% ^^^^ **** abc";
        assert!(matches!(
            RuleBasedExtractor::new().extract_text(noise),
            Extraction::Thin { .. }
        ));
    }
}
