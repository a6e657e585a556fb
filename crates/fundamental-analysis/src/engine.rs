use analysis_core::{CompanyFundamentals, Decision, GrowthResult, Recommendation};
use serde::{Deserialize, Serialize};

use crate::jump::growth_and_jump;
use crate::projection::implied_full_period;
use crate::round2;

/// PE assumed when the fundamentals source has none
pub const DEFAULT_PE: f64 = 30.0;

// Rerating trigger: any one of these jumps (%)
const OP_JUMP_TRIGGER: f64 = 30.0;
const EPS_JUMP_TRIGGER: f64 = 40.0;
const PAT_JUMP_TRIGGER: f64 = 40.0;

// Confirmation gates for a BUY
const MIN_SALES_GROWTH: f64 = 10.0;
const MIN_PAT_GROWTH: f64 = 10.0;
const MAX_BUY_PEG: f64 = 5.0;

// Exit conditions
const WEAK_EPS_GROWTH: f64 = 15.0;
const MAX_HOLD_PEG: f64 = 3.0;
const MAX_PE_EXPANSION: f64 = 100.0;

/// Outcome of one threshold check on a value that may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Pass,
    Fail,
    Absent,
}

impl Clause {
    pub fn check(value: Option<f64>, predicate: impl Fn(f64) -> bool) -> Self {
        match value {
            Some(v) if predicate(v) => Clause::Pass,
            Some(_) => Clause::Fail,
            None => Clause::Absent,
        }
    }

    /// Gate semantics: a missing value does not block
    pub fn holds(self) -> bool {
        self != Clause::Fail
    }

    /// Trigger semantics: only a present, passing value fires
    pub fn fired(self) -> bool {
        self == Clause::Pass
    }
}

/// Series and scalars for one company, present values only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub yearly_eps: Vec<f64>,
    pub quarterly_eps: Vec<f64>,
    pub yearly_sales: Vec<f64>,
    pub quarterly_sales: Vec<f64>,
    pub yearly_op_profit: Vec<f64>,
    pub quarterly_op_profit: Vec<f64>,
    pub yearly_pat: Vec<f64>,
    pub quarterly_pat: Vec<f64>,
    pub pe: f64,
    pub current_price: Option<f64>,
}

impl RecommendationInput {
    /// Build from a fundamentals record; a missing PE falls back to `default_pe`.
    /// The current price is left unset, callers opt into the PE-expansion check
    /// with [`RecommendationInput::with_current_price`].
    pub fn from_fundamentals(company: &CompanyFundamentals, default_pe: f64) -> Self {
        Self {
            yearly_eps: company.yearly_eps.values(),
            quarterly_eps: company.quarterly_eps.values(),
            yearly_sales: company.yearly_sales.values(),
            quarterly_sales: company.quarterly_sales.values(),
            yearly_op_profit: company.yearly_op_profit.values(),
            quarterly_op_profit: company.quarterly_op_profit.values(),
            yearly_pat: company.yearly_pat.values(),
            quarterly_pat: company.quarterly_pat.values(),
            pe: company.pe_ratio.filter(|pe| pe.is_finite()).unwrap_or(default_pe),
            current_price: None,
        }
    }

    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecommendationEngine {
    default_pe: f64,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::with_default_pe(DEFAULT_PE)
    }

    /// PE used for companies whose fundamentals carry none
    pub fn with_default_pe(default_pe: f64) -> Self {
        Self { default_pe }
    }

    fn analyze_metric(&self, metric: &str, yearly: &[f64], quarterly: &[f64]) -> Option<GrowthResult> {
        let analysis = implied_full_period(quarterly).and_then(|implied| {
            let mut combined = yearly.to_vec();
            combined.push(implied);
            growth_and_jump(&combined)
        });

        match analysis {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!("Skipping {} growth: {}", metric, e);
                None
            }
        }
    }

    /// Evaluate one company.
    pub fn recommend(&self, input: &RecommendationInput) -> Recommendation {
        let eps = self.analyze_metric("EPS", &input.yearly_eps, &input.quarterly_eps);
        let sales = self.analyze_metric("Sales", &input.yearly_sales, &input.quarterly_sales);
        let op = self.analyze_metric("OP", &input.yearly_op_profit, &input.quarterly_op_profit);
        let pat = self.analyze_metric("PAT", &input.yearly_pat, &input.quarterly_pat);

        let pe = input.pe;
        // Floor of 1 keeps PEG finite and positive for flat or shrinking EPS.
        // Without an EPS result there is no PEG at all.
        let peg = eps
            .as_ref()
            .map(|r| pe / r.new_growth_rate.max(1.0))
            .filter(|p| p.is_finite());

        let pe_change = pe_expansion(pe, input.current_price, &input.yearly_eps);

        let (decision, rerating_candidate) =
            classify(eps.as_ref(), sales.as_ref(), op.as_ref(), pat.as_ref(), peg, pe_change);

        Recommendation {
            eps,
            sales,
            op,
            pat,
            pe,
            peg: peg.map(round2),
            pe_change: pe_change.map(round2),
            decision,
            rerating_candidate,
        }
    }

    /// Evaluate one company straight from its fundamentals record.
    pub fn recommend_company(&self, company: &CompanyFundamentals) -> Recommendation {
        self.recommend(&RecommendationInput::from_fundamentals(company, self.default_pe))
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage change of the current PE over the PE implied by the oldest yearly EPS
/// at today's price. `None` without a price, with fewer than two yearly EPS values,
/// or when the oldest EPS is not positive.
fn pe_expansion(pe: f64, current_price: Option<f64>, yearly_eps: &[f64]) -> Option<f64> {
    let price = current_price.filter(|p| *p > 0.0)?;
    if yearly_eps.len() < 2 || yearly_eps[0] <= 0.0 {
        return None;
    }
    let old_pe = price / yearly_eps[0];
    let change = ((pe / old_pe) - 1.0) * 100.0;
    change.is_finite().then_some(change)
}

/// Apply the rerating policy. First match wins:
///
/// 1. BUY when OP jumps >= 30% or EPS >= 40% or PAT >= 40%, and Sales growth >= 10,
///    PAT growth >= 10 and PEG < 5. Missing growth figures or PEG do not block the gates.
/// 2. SELL when EPS growth < 15, PEG > 3, or PE expanded more than 100%.
/// 3. HOLD otherwise.
///
/// Returns the decision and whether the company is a rerating candidate.
pub fn classify(
    eps: Option<&GrowthResult>,
    sales: Option<&GrowthResult>,
    op: Option<&GrowthResult>,
    pat: Option<&GrowthResult>,
    peg: Option<f64>,
    pe_change: Option<f64>,
) -> (Decision, bool) {
    let jump = |r: Option<&GrowthResult>| r.and_then(|r| r.jump_percent);
    let growth = |r: Option<&GrowthResult>| r.map(|r| r.new_growth_rate);
    let peg = peg.filter(|p| p.is_finite());

    let triggered = Clause::check(jump(op), |j| j >= OP_JUMP_TRIGGER).fired()
        || Clause::check(jump(eps), |j| j >= EPS_JUMP_TRIGGER).fired()
        || Clause::check(jump(pat), |j| j >= PAT_JUMP_TRIGGER).fired();

    let confirmed = Clause::check(growth(sales), |g| g >= MIN_SALES_GROWTH).holds()
        && Clause::check(growth(pat), |g| g >= MIN_PAT_GROWTH).holds()
        && Clause::check(peg, |p| p < MAX_BUY_PEG).holds();

    if triggered && confirmed {
        return (Decision::Buy, true);
    }

    let weak = Clause::check(growth(eps), |g| g < WEAK_EPS_GROWTH).fired()
        || Clause::check(peg, |p| p > MAX_HOLD_PEG).fired()
        || Clause::check(pe_change, |c| c > MAX_PE_EXPANSION).fired();

    if weak {
        (Decision::Sell, false)
    } else {
        (Decision::Hold, false)
    }
}
