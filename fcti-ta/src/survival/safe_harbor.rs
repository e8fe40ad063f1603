//! Association safe-harbor cap

use crate::config::SurvivalConfig;

/// Capped liability carried by the first mortgage in an association foreclosure
///
/// The lesser of `safe_harbor_months` of unpaid assessments and
/// `safe_harbor_percent` of the original principal. When one side cannot
/// be computed the other is used; `None` when neither can.
///
/// # Arguments
/// * `monthly_assessment` - Periodic assessment rate
/// * `months_unpaid` - Months in arrears; unknown counts as the full window
/// * `principal` - Original principal of the senior mortgage
pub fn safe_harbor_amount(
    config: &SurvivalConfig,
    monthly_assessment: Option<f64>,
    months_unpaid: Option<u32>,
    principal: Option<f64>,
) -> Option<f64> {
    let months = months_unpaid
        .unwrap_or(config.safe_harbor_months)
        .min(config.safe_harbor_months);
    let assessment_cap = monthly_assessment.map(|rate| rate * months as f64);
    let principal_cap = principal.map(|p| p * config.safe_harbor_percent / 100.0);

    match (assessment_cap, principal_cap) {
        (Some(a), Some(p)) => Some(a.min(p)),
        (Some(a), None) => Some(a),
        (None, Some(p)) => Some(p),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_cap_wins() {
        let config = SurvivalConfig::default();
        // min(12 x 400, 1% x 300,000)
        let amount = safe_harbor_amount(&config, Some(400.0), Some(24), Some(300_000.0));
        assert_eq!(amount, Some(3_000.0));
    }

    #[test]
    fn test_assessment_cap_wins() {
        let config = SurvivalConfig::default();
        let amount = safe_harbor_amount(&config, Some(150.0), Some(6), Some(300_000.0));
        assert_eq!(amount, Some(900.0));
    }

    #[test]
    fn test_missing_inputs() {
        let config = SurvivalConfig::default();
        assert_eq!(safe_harbor_amount(&config, None, None, Some(200_000.0)), Some(2_000.0));
        assert_eq!(safe_harbor_amount(&config, Some(100.0), None, None), Some(1_200.0));
        assert_eq!(safe_harbor_amount(&config, None, Some(3), None), None);
    }
}
