use analysis_core::AnalysisError;

use crate::round2;

/// Upward bias applied to the annualized run-rate, by quarters reported so far.
/// A single quarter understates a growing company's year, so it gets the most lift.
pub fn quarter_bias(quarters: usize) -> f64 {
    match quarters {
        1 => 1.13,
        2 => 1.06,
        _ => 1.0,
    }
}

/// Project a full fiscal-year value from the quarters reported so far:
/// `mean * 4 * quarter_bias(n)`, rounded to two decimals.
pub fn implied_full_period(partial: &[f64]) -> Result<f64, AnalysisError> {
    if partial.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Need at least 1 quarterly value".to_string(),
        ));
    }

    let mean = partial.iter().sum::<f64>() / partial.len() as f64;
    let implied = mean * 4.0 * quarter_bias(partial.len());

    if !implied.is_finite() {
        return Err(AnalysisError::CalculationError(format!(
            "Implied value is not finite for {:?}",
            partial
        )));
    }
    Ok(round2(implied))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quarter_gets_largest_bias() {
        assert_eq!(implied_full_period(&[10.0]).unwrap(), 45.2);
    }

    #[test]
    fn test_bias_decays_with_more_quarters() {
        assert_eq!(implied_full_period(&[4.0, 4.0]).unwrap(), 16.96);
        assert_eq!(implied_full_period(&[10.0, 10.0, 10.0]).unwrap(), 40.0);
        assert_eq!(implied_full_period(&[10.0, 10.0, 10.0, 10.0]).unwrap(), 40.0);
        assert_eq!(quarter_bias(5), 1.0);
    }

    #[test]
    fn test_uses_mean_of_reported_quarters() {
        // mean 15 -> 60 with no bias
        assert_eq!(implied_full_period(&[10.0, 15.0, 20.0]).unwrap(), 60.0);
        assert_eq!(implied_full_period(&[-2.0, -4.0, -3.0]).unwrap(), -12.0);
    }

    #[test]
    fn test_empty_input_cannot_project() {
        assert!(matches!(
            implied_full_period(&[]),
            Err(AnalysisError::InsufficientData(_))
        ));
    }
}
