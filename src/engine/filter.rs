use serde::{Deserialize, Serialize};

use crate::engine::elp::ElpRow;
use crate::model::RiskCategory;

/// The interactive filter surface over the ELP table: vendor multi-select,
/// risk category, minimum savings, subscriptions-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElpFilter {
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub risk: RiskCategory,
    #[serde(default)]
    pub min_savings_usd: f64,
    #[serde(default)]
    pub subscriptions_only: bool,
}

impl ElpFilter {
    pub fn matches(&self, row: &ElpRow) -> bool {
        if !self.vendors.is_empty() {
            let vendor = row.vendor.as_deref().unwrap_or("");
            if !self.vendors.iter().any(|v| v == vendor) {
                return false;
            }
        }
        if self.subscriptions_only && !row.is_subscription() {
            return false;
        }
        let risk_ok = match self.risk {
            RiskCategory::All => true,
            RiskCategory::OverUsed => row.overage > 0,
            RiskCategory::ExpiringSoon => row.renewal_due,
            RiskCategory::InactiveUsers => row.inactive_installs > 0,
        };
        risk_ok && row.potential_savings_usd >= self.min_savings_usd
    }

    pub fn apply(&self, rows: &[ElpRow]) -> Vec<ElpRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Headline numbers over a (filtered) ELP set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioOverview {
    pub vendors: usize,
    pub products: usize,
    pub total_seats_purchased: u64,
    pub total_potential_savings_usd: f64,
}

pub fn portfolio_overview(rows: &[ElpRow]) -> PortfolioOverview {
    let mut vendors: Vec<&str> = rows.iter().filter_map(|r| r.vendor.as_deref()).collect();
    vendors.sort();
    vendors.dedup();

    PortfolioOverview {
        vendors: vendors.len(),
        products: rows.len(),
        total_seats_purchased: rows.iter().map(|r| u64::from(r.seats_purchased)).sum(),
        total_potential_savings_usd: rows.iter().map(|r| r.potential_savings_usd).sum(),
    }
}
