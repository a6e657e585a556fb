use analysis_core::{GrowthResult, ScoredCompany};

use crate::AlertType;

/// Plain-text message bodies, laid out for reading on a phone.
pub struct MessageTemplate;

fn value_or_dash(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn growth_line(label: &str, metric: &Option<GrowthResult>) -> String {
    let old = metric.as_ref().and_then(|m| m.old_growth_rate);
    let new = metric.as_ref().map(|m| m.new_growth_rate);
    format!("{}: {}% → {}%", label, value_or_dash(old), value_or_dash(new))
}

fn jump_line(label: &str, metric: &Option<GrowthResult>) -> String {
    let jump = metric.as_ref().and_then(|m| m.jump_percent);
    format!("{}: {}%", label, value_or_dash(jump))
}

fn render_company(scored: &ScoredCompany) -> String {
    let company = &scored.company;
    let rec = &scored.recommendation;
    let latest_quarter = company.quarters.last().map(String::as_str).unwrap_or("-");

    [
        format!("{} ({})", company.display_name(), latest_quarter),
        String::new(),
        "GROWTH RATE CAGR:".to_string(),
        growth_line("EPS", &rec.eps),
        growth_line("Sales", &rec.sales),
        growth_line("PAT", &rec.pat),
        growth_line("OP", &rec.op),
        String::new(),
        "YOY JUMP PERCENT:".to_string(),
        jump_line("EPS", &rec.eps),
        jump_line("Sales", &rec.sales),
        jump_line("PAT", &rec.pat),
        jump_line("OP", &rec.op),
        String::new(),
        format!(
            "PE: {} | PEG: {} | ROE: {}%",
            rec.pe,
            value_or_dash(rec.peg),
            value_or_dash(company.roe)
        ),
        format!("DPS: {}", scored.dps),
        format!("Decision: {}", rec.decision),
    ]
    .join("\n")
}

impl MessageTemplate {
    pub fn render(alert_type: &AlertType) -> String {
        match alert_type {
            AlertType::FilingsReleased { names } => {
                if names.is_empty() {
                    "No results released".to_string()
                } else {
                    format!("Results have been released today for: {}", names.join(", "))
                }
            }
            AlertType::CompanyResult(scored) => render_company(scored),
            AlertType::RerateCandidate { name, eps_jump } => format!(
                "Rerating candidate: {}\nEPS jump: {}%",
                name,
                value_or_dash(*eps_jump)
            ),
            AlertType::PositionClosed { name, pnl_percent } => {
                let pnl = pnl_percent
                    .map(|p| format!("{:+.2}%", p))
                    .unwrap_or_else(|| "-".to_string());
                format!("Position closed: {}\nP&L: {}", name, pnl)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{CompanyFundamentals, Decision, Recommendation};

    fn scored() -> ScoredCompany {
        ScoredCompany {
            company: CompanyFundamentals {
                stock_name: "Mangal Electrical Industries Ltd".into(),
                ticker: Some("MEIL".into()),
                quarters: vec!["Jun 2025".into(), "Sep 2025".into()],
                roe: Some(18.2),
                ..Default::default()
            },
            recommendation: Recommendation {
                eps: Some(GrowthResult {
                    old_growth_rate: Some(20.0),
                    new_growth_rate: 30.23,
                    jump_percent: Some(51.15),
                    change: Some(10.23),
                    implied_value: 16.96,
                }),
                sales: None,
                op: None,
                pat: None,
                pe: 25.0,
                peg: Some(0.83),
                pe_change: None,
                decision: Decision::Buy,
                rerating_candidate: true,
            },
            dps: 42,
        }
    }

    #[test]
    fn test_company_result_layout() {
        let text = MessageTemplate::render(&AlertType::CompanyResult(Box::new(scored())));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "MEIL (Sep 2025)");
        assert!(lines.contains(&"EPS: 20% → 30.23%"));
        assert!(lines.contains(&"Sales: -% → -%"));
        assert!(lines.contains(&"EPS: 51.15%"));
        assert!(lines.contains(&"PE: 25 | PEG: 0.83 | ROE: 18.2%"));
        assert!(lines.contains(&"DPS: 42"));
        assert_eq!(*lines.last().unwrap(), "Decision: BUY");
    }

    #[test]
    fn test_company_without_ticker_uses_name() {
        let mut scored = scored();
        scored.company.ticker = None;
        scored.company.quarters.clear();
        let text = MessageTemplate::render(&AlertType::CompanyResult(Box::new(scored)));
        assert!(text.starts_with("Mangal Electrical Industries Ltd (-)"));
    }

    #[test]
    fn test_filings_released() {
        let text = MessageTemplate::render(&AlertType::FilingsReleased {
            names: vec!["TCS".into(), "INFY".into()],
        });
        assert_eq!(text, "Results have been released today for: TCS, INFY");
        assert_eq!(
            MessageTemplate::render(&AlertType::FilingsReleased { names: vec![] }),
            "No results released"
        );
    }

    #[test]
    fn test_position_closed_signs_pnl() {
        let text = MessageTemplate::render(&AlertType::PositionClosed {
            name: "MEIL".into(),
            pnl_percent: Some(12.5),
        });
        assert_eq!(text, "Position closed: MEIL\nP&L: +12.50%");
    }
}
