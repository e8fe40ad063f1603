//! Free-text legal description parsing
//!
//! Recognizes the platted-lot shapes registries actually record
//! ("LOT 5 BLOCK 3 PALM ESTATES PB 45 PG 12", "PALM ESTATES LOT 5 BLK 3",
//! "UNIT 204 OCEAN TOWERS CONDOMINIUM"). Fields that cannot be resolved are
//! left `None`; nothing is guessed.

use crate::models::normalize_legal_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bLOTS?\s+(?:NO\.?\s*)?([0-9]+[A-Z]?)\b").expect("valid regex"));
static BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:BLOCK|BLK)\s+(?:NO\.?\s*)?([0-9]+[A-Z]?|[A-Z])\b").expect("valid regex"));
static UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:UNIT|APT|APARTMENT)\s+(?:NO\.?\s*)?([0-9A-Z]+(?:-[0-9A-Z]+)?)\b").expect("valid regex")
});
static PLAT_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:PLAT\s+BOOK|PB|P\.B\.|OR\s+BOOK|ORB|O\.R\.B\.)\s*\d+\s*,?\s*(?:(?:PAGES?|PGS?|P)\.?\s*)?\d+(?:\s*-\s*\d+)?")
        .expect("valid regex")
});
static TAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:ACCORDING\s+TO|AS\s+RECORDED|AS\s+PER|OF\s+THE\s+PUBLIC\s+RECORDS|RECORDED\s+IN|THEREOF)\b.*$")
        .expect("valid regex")
});
static METES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:BEG(?:IN)?|COMMENC(?:E|ING)|THENCE|TWP|RGE|SEC(?:TION)?\s+\d+\s+TOWNSHIP)\b")
        .expect("valid regex")
});
static CONDO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bCONDO(?:MINIUM)?S?\b").expect("valid regex"));

/// Designators dropped from the end of a subdivision name
const SUBDIVISION_DESIGNATORS: &[&str] = &[
    "SUBDIVISION",
    "SUBD",
    "SUB",
    "S/D",
    "CONDOMINIUM",
    "CONDO",
    "ADDITION",
    "ADDN",
    "ADD",
    "REPLAT",
    "UNREC",
    "A",
    "OF",
    "IN",
    "THE",
    "AND",
];

/// Structured fields of a legal description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLegal {
    pub subdivision: Option<String>,
    pub lot: Option<String>,
    pub block: Option<String>,
    pub unit: Option<String>,
    pub is_condo: bool,
}

impl ParsedLegal {
    /// Nothing searchable was recovered
    pub fn is_empty(&self) -> bool {
        self.subdivision.is_none()
    }

    /// True when `other` describes a different lot/unit in the same subdivision
    ///
    /// Documents that do not name a specific lot, block or unit never
    /// conflict; only an explicit mismatch does.
    pub fn conflicts_with(&self, other: &ParsedLegal) -> bool {
        let (Some(ours), Some(theirs)) = (&self.subdivision, &other.subdivision) else {
            return false;
        };
        if !same_subdivision(ours, theirs) {
            return false;
        }
        let differs = |a: &Option<String>, b: &Option<String>| match (a, b) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        differs(&self.lot, &other.lot)
            || differs(&self.block, &other.block)
            || differs(&self.unit, &other.unit)
    }
}

fn compact(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Same subdivision, allowing registry truncation of long names
pub fn same_subdivision(a: &str, b: &str) -> bool {
    let a = compact(a);
    let b = compact(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || (a.len().min(b.len()) >= 8 && (a.starts_with(&b) || b.starts_with(&a)))
}

/// Parse a raw legal description
pub fn parse(raw: &str) -> ParsedLegal {
    let text = normalize_legal_text(&raw.replace([',', ';'], " "));
    if text.is_empty() {
        return ParsedLegal::default();
    }

    let lot = LOT_RE.captures(&text).map(|c| c[1].to_string());
    let block = BLOCK_RE.captures(&text).map(|c| c[1].to_string());
    let unit = UNIT_RE.captures(&text).map(|c| c[1].to_string());
    let is_condo = CONDO_RE.is_match(&text) || (unit.is_some() && lot.is_none());

    let subdivision = if METES_RE.is_match(&text) {
        None
    } else {
        extract_subdivision(&text)
    };

    ParsedLegal {
        subdivision,
        lot,
        block,
        unit,
        is_condo,
    }
}

fn extract_subdivision(text: &str) -> Option<String> {
    let mut rest = TAIL_RE.replace(text, "").to_string();
    rest = PLAT_REF_RE.replace_all(&rest, " ").to_string();
    rest = LOT_RE.replace_all(&rest, " ").to_string();
    rest = BLOCK_RE.replace_all(&rest, " ").to_string();
    rest = UNIT_RE.replace_all(&rest, " ").to_string();

    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    while tokens
        .first()
        .map_or(false, |t| SUBDIVISION_DESIGNATORS.contains(t))
    {
        tokens.remove(0);
    }
    while tokens
        .last()
        .map_or(false, |t| SUBDIVISION_DESIGNATORS.contains(t))
    {
        tokens.pop();
    }

    let name = tokens.join(" ");
    if name.is_empty() || !name.chars().any(|c| c.is_ascii_alphabetic()) {
        None
    } else {
        Some(name)
    }
}
