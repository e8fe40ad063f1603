//! Judgment / foreclosure context supplied by the caller

use super::DocumentKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeclosureType {
    /// Foreclosure of a (first) mortgage
    FirstMortgage,
    /// Homeowners' or condominium association lien foreclosure
    Association,
    /// Tax-deed sale
    TaxDeed,
    Unknown,
}

impl ForeclosureType {
    /// Map free-text judgment descriptions onto a type
    pub fn from_description(description: &str) -> Self {
        let upper = description.to_uppercase();
        if upper.contains("TAX DEED") || upper.contains("TAX CERTIFICATE") {
            ForeclosureType::TaxDeed
        } else if upper.contains("ASSOCIATION")
            || upper.contains("HOA")
            || upper.contains("CONDOMINIUM")
            || upper.contains("CLAIM OF LIEN")
        {
            ForeclosureType::Association
        } else if upper.contains("MORTGAGE") {
            ForeclosureType::FirstMortgage
        } else {
            ForeclosureType::Unknown
        }
    }
}

/// Everything the survival engine knows about the pending foreclosure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeclosureContext {
    pub foreclosure_type: ForeclosureType,
    pub plaintiff: Option<String>,
    /// Named defendants; `None` when the party list was not extracted
    pub defendants: Option<Vec<String>>,
    pub case_number: Option<String>,
    /// Lis pendens filing date (not a reliable priority boundary)
    pub filing_date: Option<NaiveDate>,
    pub sale_date: Option<NaiveDate>,
    /// Structured references to the instrument(s) being foreclosed
    #[serde(default)]
    pub foreclosed_instruments: Vec<DocumentKey>,
    pub monthly_assessment: Option<f64>,
    pub months_unpaid: Option<u32>,
    pub market_value: Option<f64>,
}

impl ForeclosureContext {
    pub fn new(foreclosure_type: ForeclosureType) -> Self {
        Self {
            foreclosure_type,
            plaintiff: None,
            defendants: None,
            case_number: None,
            filing_date: None,
            sale_date: None,
            foreclosed_instruments: Vec::new(),
            monthly_assessment: None,
            months_unpaid: None,
            market_value: None,
        }
    }

    pub fn with_plaintiff(mut self, plaintiff: impl Into<String>) -> Self {
        self.plaintiff = Some(plaintiff.into());
        self
    }

    pub fn with_defendants(mut self, defendants: Vec<String>) -> Self {
        self.defendants = Some(defendants);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_description() {
        assert_eq!(
            ForeclosureType::from_description("Mortgage Foreclosure - Homestead"),
            ForeclosureType::FirstMortgage
        );
        assert_eq!(
            ForeclosureType::from_description("Condominium Association Lien Foreclosure"),
            ForeclosureType::Association
        );
        assert_eq!(
            ForeclosureType::from_description("TAX DEED APPLICATION"),
            ForeclosureType::TaxDeed
        );
        assert_eq!(
            ForeclosureType::from_description("Other real property"),
            ForeclosureType::Unknown
        );
    }
}
