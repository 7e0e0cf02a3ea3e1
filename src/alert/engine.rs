use serde::{Deserialize, Serialize};

use crate::alert::rules::AlertKind;
use crate::config::{AlertRulesConfig, AnalysisConfig};
use crate::engine::elp::ElpRow;
use crate::model::NEVER_EXPIRES_DAYS;

/// How many alerts the feed surfaces. The priority-4 optimization alert
/// only appears when fewer than this many higher-priority alerts fired.
pub const MAX_ALERTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub priority: u8,
    pub title: String,
    pub body: String,
}

/// Evaluate the portfolio alert feed over computed ELP rows. Each kind
/// emits at most one event whose body names the offending products; the
/// feed is ordered by priority and truncated to `MAX_ALERTS`. No triggering
/// condition means an empty feed, never an error.
pub fn evaluate_alerts(rows: &[ElpRow], analysis: &AnalysisConfig) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    let urgent: Vec<&ElpRow> = rows
        .iter()
        .filter(|r| {
            r.contract_days_remaining <= analysis.urgent_window_days
                && r.contract_days_remaining != NEVER_EXPIRES_DAYS
        })
        .collect();
    if !urgent.is_empty() {
        events.push(AlertEvent {
            kind: AlertKind::UrgentExpiry,
            priority: AlertKind::UrgentExpiry.priority(),
            title: format!(
                "{} contract(s) expiring within {} days",
                urgent.len(),
                analysis.urgent_window_days
            ),
            body: urgent
                .iter()
                .map(|r| format!("{} ({} days)", r.software, r.contract_days_remaining))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let over_used: Vec<&ElpRow> = rows.iter().filter(|r| r.overage > 0).collect();
    if !over_used.is_empty() {
        events.push(AlertEvent {
            kind: AlertKind::ComplianceOverage,
            priority: AlertKind::ComplianceOverage.priority(),
            title: format!("{} product(s) used beyond purchased seats", over_used.len()),
            body: over_used
                .iter()
                .map(|r| format!("{} (+{} seats)", r.software, r.overage))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let reclaimable: f64 = rows
        .iter()
        .filter(|r| r.is_subscription() && r.inactive_installs > 0)
        .map(|r| f64::from(r.inactive_installs) * r.unit_cost_usd)
        .sum();
    if reclaimable > 0.0 {
        events.push(AlertEvent {
            kind: AlertKind::ReclaimOpportunity,
            priority: AlertKind::ReclaimOpportunity.priority(),
            title: format!("${reclaimable:.2} reclaimable from terminated users"),
            body: "Terminated users still hold subscription installations; reclaim their seats."
                .to_string(),
        });
    }

    let high_value: Vec<&ElpRow> = rows
        .iter()
        .filter(|r| r.potential_savings_usd >= analysis.high_savings_alert_usd)
        .collect();
    if !high_value.is_empty() {
        events.push(AlertEvent {
            kind: AlertKind::HighValueOptimization,
            priority: AlertKind::HighValueOptimization.priority(),
            title: format!(
                "{} product(s) with ${:.0}+ potential savings",
                high_value.len(),
                analysis.high_savings_alert_usd
            ),
            body: high_value
                .iter()
                .map(|r| format!("{} (${:.2})", r.software, r.potential_savings_usd))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    events.sort_by_key(|e| e.priority);
    events.truncate(MAX_ALERTS);
    events
}

/// Drop alert kinds the deployment disabled.
pub fn apply_alert_rules(alerts: Vec<AlertEvent>, rules: &AlertRulesConfig) -> Vec<AlertEvent> {
    alerts
        .into_iter()
        .filter(|event| match event.kind {
            AlertKind::UrgentExpiry => rules.urgent_expiry,
            AlertKind::ComplianceOverage => rules.compliance_overage,
            AlertKind::ReclaimOpportunity => rules.reclaim_opportunity,
            AlertKind::HighValueOptimization => rules.high_value_optimization,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row(software: &str) -> ElpRow {
        ElpRow {
            software: software.to_string(),
            vendor: Some("Vendor".to_string()),
            license_type: Some("subscription".to_string()),
            seats_purchased: 10,
            seats_used: 5,
            elp: 5,
            overage: 0,
            seats_unused: 5,
            unit_cost_usd: 10.0,
            potential_savings_usd: 50.0,
            contract_end: None,
            contract_days_remaining: NEVER_EXPIRES_DAYS,
            renewal_due: false,
            inactive_installs: 0,
            installs_count: 5,
        }
    }

    fn analysis() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn quiet_portfolio_yields_empty_feed() {
        let rows = vec![base_row("Zoom Pro")];
        assert!(evaluate_alerts(&rows, &analysis()).is_empty());
    }

    #[test]
    fn urgent_expiry_is_priority_one() {
        let mut row = base_row("Zoom Pro");
        row.contract_days_remaining = 5;
        row.renewal_due = true;
        let events = evaluate_alerts(&[row], &analysis());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::UrgentExpiry);
        assert!(events[0].body.contains("Zoom Pro (5 days)"));
    }

    #[test]
    fn open_ended_contracts_never_trigger_expiry_alerts() {
        let row = base_row("Visio Plan 2");
        assert_eq!(row.contract_days_remaining, NEVER_EXPIRES_DAYS);
        let events = evaluate_alerts(&[row], &analysis());
        assert!(events.iter().all(|e| e.kind != AlertKind::UrgentExpiry));
    }

    #[test]
    fn reclaim_alert_sums_subscription_rows_only() {
        let mut subscription = base_row("Zoom Pro");
        subscription.inactive_installs = 3;
        let mut perpetual = base_row("SAP S/4HANA");
        perpetual.license_type = Some("perpetual".to_string());
        perpetual.inactive_installs = 4;
        perpetual.unit_cost_usd = 2500.0;
        perpetual.potential_savings_usd = 0.0;

        let events = evaluate_alerts(&[subscription, perpetual], &analysis());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::ReclaimOpportunity);
        assert!(events[0].title.contains("$30.00"));
    }

    #[test]
    fn high_value_alert_is_crowded_out_by_higher_priorities() {
        let mut urgent = base_row("A");
        urgent.contract_days_remaining = 2;
        let mut over = base_row("B");
        over.overage = 3;
        let mut inactive = base_row("C");
        inactive.inactive_installs = 1;
        let mut rich = base_row("D");
        rich.potential_savings_usd = 9000.0;

        let events = evaluate_alerts(
            &[urgent.clone(), over.clone(), inactive.clone(), rich.clone()],
            &analysis(),
        );
        assert_eq!(events.len(), MAX_ALERTS);
        assert!(events
            .iter()
            .all(|e| e.kind != AlertKind::HighValueOptimization));

        // with only one higher-priority alert, the optimization shows
        let events = evaluate_alerts(&[over, rich], &analysis());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, AlertKind::HighValueOptimization);
    }

    #[test]
    fn disabled_rules_filter_the_feed() {
        let mut over = base_row("B");
        over.overage = 3;
        let events = evaluate_alerts(&[over], &analysis());
        assert_eq!(events.len(), 1);

        let rules = AlertRulesConfig {
            compliance_overage: false,
            ..AlertRulesConfig::default()
        };
        assert!(apply_alert_rules(events, &rules).is_empty());
    }
}
