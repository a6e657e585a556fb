use analysis_core::{AnalysisError, GrowthResult};

use crate::growth::cagr;
use crate::round2;

/// Compare growth before and after the newest period.
///
/// `values` is a yearly series, oldest first, whose last element is the implied
/// current-year value. The old rate runs from the first value to the second-to-last
/// over `n - 2` periods; the new rate runs to the last value over `n - 1` periods.
pub fn growth_and_jump(values: &[f64]) -> Result<GrowthResult, AnalysisError> {
    let n = values.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Need at least 2 values (oldest to latest), got {}",
            n
        )));
    }

    let first = values[0];
    let latest = values[n - 1];

    let old_rate = cagr(first, values[n - 2], (n - 2) as f64);
    let new_rate = cagr(first, latest, (n - 1) as f64).ok_or_else(|| {
        AnalysisError::InvalidData(format!("Growth rate undefined for {:?}", values))
    })?;

    let change = old_rate.map(|old| new_rate - old);
    let jump_percent = match old_rate {
        Some(old) if old != 0.0 => Some((new_rate - old) / old.abs() * 100.0),
        _ => None,
    };

    Ok(GrowthResult {
        old_growth_rate: old_rate.map(round2),
        new_growth_rate: round2(new_rate),
        jump_percent: jump_percent.filter(|j| j.is_finite()).map(round2),
        change: change.map(round2),
        implied_value: latest,
    })
}
