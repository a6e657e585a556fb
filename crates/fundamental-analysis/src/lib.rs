//! Early-rerating recommendation engine.
//!
//! Turns yearly and quarterly EPS, Sales, Operating Profit and PAT series into a
//! BUY/SELL/HOLD decision and a 0-100 Doubling Potential Score. Everything here is
//! pure: no I/O, no shared state.

mod dps;
mod engine;
mod growth;
mod jump;
mod projection;

pub use dps::{dps_score, score_company, DpsAccumulator};
pub use engine::{classify, Clause, RecommendationEngine, RecommendationInput, DEFAULT_PE};
pub use growth::cagr;
pub use jump::growth_and_jump;
pub use projection::{implied_full_period, quarter_bias};

/// Round to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
