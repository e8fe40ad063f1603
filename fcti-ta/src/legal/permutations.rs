//! Search-term permutations for a parsed legal description
//!
//! Registries match legal text on prefixes and each era formats the same
//! parcel differently, so one exact query under-recalls. Permutations run
//! from most specific to broadest; each becomes its own search task.

use super::parser::ParsedLegal;
use crate::models::{priority, SearchOperator};
use serde::{Deserialize, Serialize};

/// One legal-text query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalPermutation {
    pub term: String,
    pub operator: SearchOperator,
    pub priority: i32,
    /// Broadest permutations may be cancelled once narrower ones pay off
    pub is_broad: bool,
}

impl LegalPermutation {
    fn new(term: String, operator: SearchOperator, offset: i32, is_broad: bool) -> Self {
        Self {
            term,
            operator,
            priority: priority::LEGAL_TEXT + offset,
            is_broad,
        }
    }
}

/// Ordered permutations, most specific first; empty when no subdivision
pub fn generate_permutations(parsed: &ParsedLegal) -> Vec<LegalPermutation> {
    let Some(subdivision) = parsed.subdivision.as_deref() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    if parsed.is_condo {
        if let Some(unit) = &parsed.unit {
            out.push(LegalPermutation::new(
                format!("{} UNIT {}", subdivision, unit),
                SearchOperator::Prefix,
                0,
                false,
            ));
        }
    }
    match (&parsed.lot, &parsed.block) {
        (Some(lot), Some(block)) => out.push(LegalPermutation::new(
            format!("{} LOT {} BLK {}", subdivision, lot, block),
            SearchOperator::Prefix,
            0,
            false,
        )),
        (Some(lot), None) => out.push(LegalPermutation::new(
            format!("{} LOT {}", subdivision, lot),
            SearchOperator::Prefix,
            0,
            false,
        )),
        _ => {}
    }
    if let Some(block) = &parsed.block {
        out.push(LegalPermutation::new(
            format!("{} BLK {}", subdivision, block),
            SearchOperator::Prefix,
            1,
            false,
        ));
    }
    out.push(LegalPermutation::new(
        subdivision.to_string(),
        SearchOperator::Prefix,
        2,
        true,
    ));
    out.push(LegalPermutation::new(
        subdivision.to_string(),
        SearchOperator::Contains,
        3,
        true,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legal::parse;

    #[test]
    fn test_platted_lot_order() {
        let perms = generate_permutations(&parse("LOT 5 BLOCK 3 PALM ESTATES"));
        let terms: Vec<(&str, SearchOperator)> =
            perms.iter().map(|p| (p.term.as_str(), p.operator)).collect();
        assert_eq!(
            terms,
            vec![
                ("PALM ESTATES LOT 5 BLK 3", SearchOperator::Prefix),
                ("PALM ESTATES BLK 3", SearchOperator::Prefix),
                ("PALM ESTATES", SearchOperator::Prefix),
                ("PALM ESTATES", SearchOperator::Contains),
            ]
        );
        // More specific permutations are searched first
        assert!(perms.windows(2).all(|w| w[0].priority < w[1].priority));
        assert!(perms[2].is_broad && perms[3].is_broad && !perms[0].is_broad);
    }

    #[test]
    fn test_condo_unit_leads() {
        let perms = generate_permutations(&parse("UNIT 204 OCEAN TOWERS CONDOMINIUM"));
        assert_eq!(perms[0].term, "OCEAN TOWERS UNIT 204");
        assert_eq!(perms.len(), 3);
    }

    #[test]
    fn test_unresolved_yields_nothing() {
        assert!(generate_permutations(&ParsedLegal::default()).is_empty());
    }
}
