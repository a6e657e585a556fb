use analysis_core::{CompanyFundamentals, GrowthResult, Recommendation, ScoredCompany};

const EPS_WEIGHT: f64 = 0.25;
const SALES_WEIGHT: f64 = 0.25;
const PAT_WEIGHT: f64 = 0.20;
const OP_WEIGHT: f64 = 0.15;
const PE_WEIGHT: f64 = 0.05;
const PEG_WEIGHT: f64 = 0.05;
const ROE_WEIGHT: f64 = 0.05;

const GROWTH_CAP: f64 = 50.0;
const PE_CAP: f64 = 30.0;
const ROE_CAP: f64 = 40.0;

/// Weighted blend over whichever inputs are present. Missing inputs shrink the
/// denominator instead of dragging the score down.
#[derive(Debug, Clone, Copy, Default)]
pub struct DpsAccumulator {
    weighted_sum: f64,
    total_weight: f64,
}

impl DpsAccumulator {
    /// Growth rates count up to 50%
    pub fn add_growth(&mut self, growth: Option<f64>, weight: f64) {
        if let Some(g) = growth.filter(|g| g.is_finite()) {
            self.weighted_sum += g.min(GROWTH_CAP) * weight;
            self.total_weight += weight;
        }
    }

    /// Lower PE scores higher; anything at or above 30 scores zero
    pub fn add_pe(&mut self, pe: Option<f64>) {
        if let Some(pe) = pe.filter(|p| p.is_finite()) {
            let pe_score = PE_CAP - pe.min(PE_CAP);
            self.weighted_sum += (pe_score / PE_CAP) * 100.0 * PE_WEIGHT;
            self.total_weight += PE_WEIGHT;
        }
    }

    /// PEG closest to 1.0 scores highest
    pub fn add_peg(&mut self, peg: Option<f64>) {
        if let Some(peg) = peg.filter(|p| p.is_finite()) {
            let peg_score = (50.0 - (1.0 - peg).abs() * 50.0).max(0.0);
            self.weighted_sum += (peg_score / 50.0) * 100.0 * PEG_WEIGHT;
            self.total_weight += PEG_WEIGHT;
        }
    }

    /// ROE counts up to 40%
    pub fn add_roe(&mut self, roe: Option<f64>) {
        if let Some(roe) = roe.filter(|r| r.is_finite()) {
            self.weighted_sum += (roe.min(ROE_CAP) / ROE_CAP) * 100.0 * ROE_WEIGHT;
            self.total_weight += ROE_WEIGHT;
        }
    }

    /// Final score in 0..=100; 0 when nothing was added
    pub fn score(&self) -> u8 {
        if self.total_weight <= 0.0 {
            return 0;
        }
        let score = (self.weighted_sum / self.total_weight).round();
        if !score.is_finite() {
            return 0;
        }
        score.clamp(0.0, 100.0) as u8
    }
}

/// Doubling Potential Score for a recommendation plus the company's ROE.
pub fn dps_score(recommendation: &Recommendation, roe: Option<f64>) -> u8 {
    let growth = |r: &Option<GrowthResult>| r.as_ref().map(|r| r.new_growth_rate);

    let mut acc = DpsAccumulator::default();
    acc.add_growth(growth(&recommendation.eps), EPS_WEIGHT);
    acc.add_growth(growth(&recommendation.sales), SALES_WEIGHT);
    acc.add_growth(growth(&recommendation.pat), PAT_WEIGHT);
    acc.add_growth(growth(&recommendation.op), OP_WEIGHT);
    acc.add_pe(Some(recommendation.pe));
    acc.add_peg(recommendation.peg);
    acc.add_roe(roe);
    acc.score()
}

/// Pair a company with its recommendation and score. The inputs are moved into a
/// new record; nothing the caller still holds is modified.
pub fn score_company(company: CompanyFundamentals, recommendation: Recommendation) -> ScoredCompany {
    let dps = dps_score(&recommendation, company.roe);
    ScoredCompany {
        company,
        recommendation,
        dps,
    }
}
