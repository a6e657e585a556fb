/// Compound annual growth rate in percent, defined across sign changes.
///
/// Plain CAGR is meaningless once either endpoint is negative, so the four sign
/// combinations are handled separately:
/// - both positive: `(final / begin)^(1/years) - 1`
/// - both negative: the same on absolute values, negated
/// - loss to profit: `((final + 2|begin|) / |begin|)^(1/years) - 1`
/// - profit to loss: `-(((|final| + 2 begin) / begin)^(1/years) - 1)`
///
/// A zero endpoint yields 0. Returns `None` when `years <= 0` or the result is not finite.
pub fn cagr(begin: f64, final_value: f64, years: f64) -> Option<f64> {
    if !(years > 0.0) {
        return None;
    }
    let exponent = 1.0 / years;

    let rate = if begin > 0.0 && final_value > 0.0 {
        (final_value / begin).powf(exponent) - 1.0
    } else if begin < 0.0 && final_value < 0.0 {
        -((final_value.abs() / begin.abs()).powf(exponent) - 1.0)
    } else if begin < 0.0 && final_value > 0.0 {
        ((final_value + 2.0 * begin.abs()) / begin.abs()).powf(exponent) - 1.0
    } else if begin > 0.0 && final_value < 0.0 {
        -(((final_value.abs() + 2.0 * begin) / begin).powf(exponent) - 1.0)
    } else {
        0.0
    };

    let percent = rate * 100.0;
    percent.is_finite().then_some(percent)
}
