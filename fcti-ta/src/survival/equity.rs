//! Equity estimate from classified encumbrances

use crate::models::{Encumbrance, SurvivalStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityEstimate {
    pub market_value: Option<f64>,
    /// Sum of what survives the sale (safe-harbor caps, not full balances)
    pub surviving_total: f64,
    pub estimated_equity: Option<f64>,
}

impl EquityEstimate {
    pub fn compute(market_value: Option<f64>, encumbrances: &[Encumbrance]) -> Self {
        let surviving_total = encumbrances
            .iter()
            .filter(|e| e.survival_status == Some(SurvivalStatus::Survived))
            .filter_map(|e| e.surviving_amount.or(e.amount))
            .sum();
        Self {
            market_value,
            surviving_total,
            estimated_equity: market_value.map(|value| value - surviving_total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKey, EncumbranceKind, LienStatus};
    use chrono::NaiveDate;

    fn classified(status: SurvivalStatus, amount: f64, surviving: Option<f64>) -> Encumbrance {
        Encumbrance {
            property_id: "p1".into(),
            key: DocumentKey::instrument(&format!("{}-{}", status.as_str(), amount)),
            book_page: None,
            ownership_period_id: None,
            kind: EncumbranceKind::Mortgage,
            recording_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            amount: Some(amount),
            creditor: "LENDER".into(),
            original_creditor: "LENDER".into(),
            debtor: "DOE JANE".into(),
            maturity_date: None,
            status: LienStatus::Open,
            survival_status: Some(status),
            survival_reason: None,
            surviving_amount: surviving,
            is_joined: None,
            is_inferred: false,
        }
    }

    #[test]
    fn test_capped_amount_used() {
        let encs = vec![
            classified(SurvivalStatus::Survived, 300_000.0, Some(3_000.0)),
            classified(SurvivalStatus::Survived, 4_200.0, None),
            classified(SurvivalStatus::Extinguished, 50_000.0, None),
        ];
        let estimate = EquityEstimate::compute(Some(250_000.0), &encs);
        assert_eq!(estimate.surviving_total, 7_200.0);
        assert_eq!(estimate.estimated_equity, Some(242_800.0));
    }

    #[test]
    fn test_unknown_market_value() {
        let estimate = EquityEstimate::compute(None, &[]);
        assert_eq!(estimate.surviving_total, 0.0);
        assert_eq!(estimate.estimated_equity, None);
    }
}
