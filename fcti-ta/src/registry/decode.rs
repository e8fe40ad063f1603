//! Multi-key decoding of registry responses
//!
//! Registry backends disagree on field names and casing (`instrumentNumber`,
//! `InstrumentNumber`, `CFN`, `instrument_number` …) and on value shapes
//! (party lists as arrays, delimited strings or objects with roles). Each
//! logical field is looked up under every known spelling; keys are compared
//! case-insensitively with `_`, `-` and spaces ignored.

use super::{DocumentSummary, RegistryError};
use serde_json::{Map, Value};
use tracing::debug;

const ROW_LIST_KEYS: &[&str] = &["results", "documents", "data", "items", "records", "rows", "hits"];

const INSTRUMENT_KEYS: &[&str] = &[
    "instrument",
    "instrumentnumber",
    "instrumentno",
    "instnum",
    "instno",
    "cfn",
    "clerkfilenumber",
    "docnumber",
    "documentnumber",
];
const BOOK_KEYS: &[&str] = &["book", "booknumber", "orbook", "recbook", "bk"];
const PAGE_KEYS: &[&str] = &["page", "pagenumber", "orpage", "recpage", "pg"];
const BOOK_PAGE_KEYS: &[&str] = &["bookpage", "orbookpage"];
const RECORDED_KEYS: &[&str] = &[
    "recordingdate",
    "recorddate",
    "recordeddate",
    "daterecorded",
    "recorded",
    "fileddate",
    "datefiled",
    "date",
];
const DOC_TYPE_KEYS: &[&str] = &[
    "doctype",
    "doctypecode",
    "documenttype",
    "instrumenttype",
    "type",
    "kind",
];
const PARTY_ONE_KEYS: &[&str] = &[
    "partyone",
    "party1",
    "firstparty",
    "grantor",
    "grantors",
    "direct",
    "directname",
    "from",
];
const PARTY_TWO_KEYS: &[&str] = &[
    "partytwo",
    "party2",
    "secondparty",
    "grantee",
    "grantees",
    "reverse",
    "reversename",
    "to",
];
const PARTIES_KEYS: &[&str] = &["parties", "names"];
const LEGAL_KEYS: &[&str] = &["legal", "legaldescription", "legaltext", "legaldesc"];
const CASE_KEYS: &[&str] = &["casenumber", "caseno", "case"];
const AMOUNT_KEYS: &[&str] = &["amount", "consideration", "docamount", "loanamount", "principal"];
const CONTENT_KEYS: &[&str] = &["content", "text", "documenttext", "ocrtext", "body"];
const NAME_KEYS: &[&str] = &["name", "fullname", "partyname"];
const ROLE_KEYS: &[&str] = &["role", "side", "partytype", "direction"];

/// Party roles that place a name on side one
const SIDE_ONE_ROLES: &[&str] = &[
    "GRANTOR", "MORTGAGOR", "PARTY1", "1", "DIRECT", "FROM", "LIENOR", "PLAINTIFF", "ASSIGNOR",
];

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// First value found under any of the folded key spellings
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    for wanted in keys {
        for (key, value) in obj {
            if fold_key(key) == *wanted && !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(obj) => return lookup(obj, NAME_KEYS).and_then(as_text),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(obj, keys).and_then(as_text)
}

fn as_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

/// Party names from a string (`;`, `|` or newline separated), array or object
fn as_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(|c| matches!(c, ';' | '|' | '\n'))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items.iter().flat_map(as_names).collect(),
        Value::Object(_) => as_text(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Split a role-tagged party list into (side one, side two)
fn split_parties(value: &Value) -> (Vec<String>, Vec<String>) {
    let mut one = Vec::new();
    let mut two = Vec::new();
    if let Value::Array(items) = value {
        for item in items {
            let Value::Object(obj) = item else { continue };
            let Some(name) = text_field(obj, NAME_KEYS) else { continue };
            let role = text_field(obj, ROLE_KEYS)
                .map(|r| fold_key(&r).to_uppercase())
                .unwrap_or_default();
            if SIDE_ONE_ROLES.contains(&role.as_str()) {
                one.push(name);
            } else {
                two.push(name);
            }
        }
    }
    (one, two)
}

/// Decode one row; `None` only when the row is not an object
pub fn decode_summary(row: &Value) -> Option<DocumentSummary> {
    let obj = row.as_object()?;

    let mut book = text_field(obj, BOOK_KEYS);
    let mut page = text_field(obj, PAGE_KEYS);
    if book.is_none() || page.is_none() {
        if let Some(combined) = text_field(obj, BOOK_PAGE_KEYS) {
            if let Some((b, p)) = combined.split_once(['/', '-', ' ']) {
                book = Some(b.trim().to_string());
                page = Some(p.trim().to_string());
            }
        }
    }

    let mut party_one = lookup(obj, PARTY_ONE_KEYS).map(as_names).unwrap_or_default();
    let mut party_two = lookup(obj, PARTY_TWO_KEYS).map(as_names).unwrap_or_default();
    if party_one.is_empty() && party_two.is_empty() {
        if let Some(parties) = lookup(obj, PARTIES_KEYS) {
            (party_one, party_two) = split_parties(parties);
        }
    }

    Some(DocumentSummary {
        instrument: text_field(obj, INSTRUMENT_KEYS),
        book,
        page,
        recorded_raw: text_field(obj, RECORDED_KEYS),
        doc_type_code: text_field(obj, DOC_TYPE_KEYS).unwrap_or_default(),
        party_one,
        party_two,
        legal_text: text_field(obj, LEGAL_KEYS),
        case_number: text_field(obj, CASE_KEYS),
        amount: lookup(obj, AMOUNT_KEYS).and_then(as_amount),
        content: text_field(obj, CONTENT_KEYS),
    })
}

fn find_rows(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    match value {
        Value::Array(rows) => Some(rows),
        Value::Object(obj) if depth < 3 => lookup(obj, ROW_LIST_KEYS).and_then(|v| find_rows(v, depth + 1)),
        _ => None,
    }
}

/// Decode a whole search response body
///
/// Accepts a bare array or an envelope (`{"results": [...]}`,
/// `{"data": {"items": [...]}}`, …).
///
/// # Errors
/// `RegistryError::Decode` when no row list can be located.
pub fn decode_response(body: &Value) -> Result<Vec<DocumentSummary>, RegistryError> {
    let rows = find_rows(body, 0).ok_or_else(|| {
        RegistryError::Decode("no result list found in registry response".to_string())
    })?;
    let summaries: Vec<DocumentSummary> = rows.iter().filter_map(decode_summary).collect();
    debug!(rows = rows.len(), decoded = summaries.len(), "Decoded registry response");
    Ok(summaries)
}
