//! Party-name normalization
//!
//! Canonical keys strip titles, suffixes, joiners and punctuation, then
//! sort the remaining tokens so reordered variants ("Smith, John Jr." and
//! "John Smith") collapse to the same key.

use crate::models::EntityType;

const TITLES: &[&str] = &["MR", "MRS", "MS", "MISS", "DR", "REV", "HON"];

const SUFFIXES: &[&str] = &["JR", "SR", "II", "III", "IV", "ESQ", "MD", "PHD"];

/// Marital and co-party joiners that carry no identity
const JOINERS: &[&str] = &[
    "AND", "ET", "AL", "ETAL", "UX", "ETUX", "VIR", "ETVIR", "HW", "HUSBAND", "WIFE", "AKA", "FKA",
    "NKA", "A/K/A",
];

/// Words that mark a trust or trustee capacity, dropped to find the base name
const TRUST_WORDS: &[&str] = &[
    "TRUST",
    "TRUSTS",
    "TRUSTEE",
    "TRUSTEES",
    "TR",
    "TRS",
    "TTEE",
    "TTEES",
    "OF",
    "THE",
    "FAMILY",
    "REVOCABLE",
    "IRREVOCABLE",
    "LIVING",
    "LAND",
    "AS",
    "DATED",
    "DTD",
    "UAD",
    "UTD",
    "UA",
    "AGREEMENT",
    "DECLARATION",
    "UNDER",
    "SUCCESSOR",
];

/// Institutional name fragments: never linked, never used as search seeds
const INSTITUTION_PHRASES: &[&str] = &[
    "BANK",
    "MORTGAGE",
    "MERS",
    "NATIONAL ASSOCIATION",
    " N A ",
    "FSB",
    "FEDERAL NATIONAL",
    "FANNIE MAE",
    "FREDDIE MAC",
    "SAVINGS",
    "CREDIT UNION",
    "SERVICING",
    "LENDING",
    "FUNDING",
    "FINANCIAL",
    "TITLE",
    "ABSTRACT",
    "ESCROW",
    "COUNTY",
    "CITY OF",
    "TOWN OF",
    "VILLAGE OF",
    "STATE OF",
    "UNITED STATES",
    "DEPARTMENT",
    "SECRETARY OF",
    "CLERK",
    "INTERNAL REVENUE",
    "TAX COLLECTOR",
    "HOUSING AND URBAN",
    "TRUST COMPANY",
    "UTILITIES",
];

const LLC_MARKERS: &[&str] = &["LLC", "L L C", "LIMITED LIABILITY"];

const CORPORATE_MARKERS: &[&str] = &[
    "INC",
    "CORP",
    "CORPORATION",
    "CO",
    "COMPANY",
    "LTD",
    "LP",
    "LLP",
    "PA",
    "PLLC",
    "INCORPORATED",
    "ASSOCIATION",
    "ASSN",
];

/// Uppercase, drop apostrophes, turn remaining punctuation into spaces
fn clean(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\'' && *c != '`')
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect()
}

/// Raw tokens in their original order (no filtering)
pub fn raw_tokens(name: &str) -> Vec<String> {
    clean(name).split_whitespace().map(String::from).collect()
}

fn is_noise(token: &str) -> bool {
    TITLES.contains(&token) || SUFFIXES.contains(&token) || JOINERS.contains(&token)
}

/// Identity-bearing tokens in original order
pub fn name_tokens(name: &str) -> Vec<String> {
    raw_tokens(name)
        .into_iter()
        .filter(|t| !is_noise(t))
        .collect()
}

/// Canonical key: identity-bearing tokens, sorted, space-joined
pub fn normalize(name: &str) -> String {
    let mut tokens = name_tokens(name);
    tokens.sort();
    tokens.join(" ")
}

fn padded(name: &str) -> String {
    format!(" {} ", raw_tokens(name).join(" "))
}

/// True for banks, title companies, government bodies and similar
pub fn is_institutional(name: &str) -> bool {
    let text = padded(name);
    INSTITUTION_PHRASES.iter().any(|phrase| {
        if phrase.starts_with(' ') {
            text.contains(phrase)
        } else {
            // Whole-word match so "BANKS" the surname is not an institution
            text.contains(&format!(" {} ", phrase))
        }
    })
}

pub fn has_trust_language(name: &str) -> bool {
    raw_tokens(name).iter().any(|t| {
        matches!(
            t.as_str(),
            "TRUST" | "TRUSTS" | "TRUSTEE" | "TRUSTEES" | "TR" | "TRS" | "TTEE" | "TTEES"
        )
    })
}

/// Name with trust/trustee language and trust dates removed
pub fn strip_trust_language(name: &str) -> String {
    name_tokens(name)
        .into_iter()
        .filter(|t| !TRUST_WORDS.contains(&t.as_str()))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn entity_type(name: &str) -> EntityType {
    if is_institutional(name) {
        return EntityType::Institution;
    }
    if has_trust_language(name) {
        return EntityType::Trust;
    }
    let text = padded(name);
    if LLC_MARKERS.iter().any(|m| text.contains(&format!(" {} ", m))) {
        return EntityType::Llc;
    }
    let tokens = raw_tokens(name);
    if tokens.iter().any(|t| CORPORATE_MARKERS.contains(&t.as_str())) {
        return EntityType::Corporation;
    }
    EntityType::Individual
}

/// Given name and surname of an individual
///
/// Comma form is `SURNAME, GIVEN`; all-caps registry form is
/// `SURNAME GIVEN MIDDLE`; mixed-case prose form is `Given Middle Surname`.
pub fn split_person_name(name: &str) -> Option<(String, String)> {
    if let Some((surname_part, given_part)) = name.split_once(',') {
        let surname = name_tokens(surname_part);
        let given = name_tokens(given_part);
        return Some((given.first()?.clone(), surname.last()?.clone()));
    }

    let tokens = name_tokens(name);
    if tokens.len() < 2 {
        return None;
    }
    let prose_order = name.chars().any(|c| c.is_lowercase());
    if prose_order {
        Some((tokens[0].clone(), tokens[tokens.len() - 1].clone()))
    } else {
        Some((tokens[1].clone(), tokens[0].clone()))
    }
}
