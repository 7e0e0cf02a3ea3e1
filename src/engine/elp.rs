use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::usage::ProductUsage;
use crate::model::LicenseRecord;

/// One product's Effective License Position: entitlement vs. measured use,
/// contract timing, and the savings a rightsize would unlock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElpRow {
    pub software: String,
    pub vendor: Option<String>,
    pub license_type: Option<String>,
    pub seats_purchased: u32,
    pub seats_used: u32,
    /// Signed position: purchased - used. Negative means overage.
    pub elp: i64,
    pub overage: u32,
    pub seats_unused: u32,
    pub unit_cost_usd: f64,
    pub potential_savings_usd: f64,
    pub contract_end: Option<NaiveDate>,
    pub contract_days_remaining: i64,
    pub renewal_due: bool,
    pub inactive_installs: u32,
    pub installs_count: u32,
}

impl ElpRow {
    pub fn is_subscription(&self) -> bool {
        self.license_type
            .as_deref()
            .map(|t| t.to_ascii_lowercase().contains("subscription"))
            .unwrap_or(false)
    }
}

/// Merge license entitlements with aggregated usage (left join on software,
/// absent usage filled with zeros) and derive the position metrics.
/// Duplicate license rows resolve to the first match. `today` is injected so
/// the result is deterministic under a fixed clock.
pub fn compute_elp(
    licenses: &[LicenseRecord],
    usage: &[ProductUsage],
    today: NaiveDate,
    renewal_window_days: i64,
) -> Vec<ElpRow> {
    let usage_by_software: HashMap<&str, &ProductUsage> =
        usage.iter().map(|u| (u.software.as_str(), u)).collect();

    let mut seen: HashMap<&str, ()> = HashMap::with_capacity(licenses.len());
    let mut rows = Vec::with_capacity(licenses.len());
    for license in licenses {
        if seen.insert(license.software.as_str(), ()).is_some() {
            continue;
        }
        let usage = usage_by_software.get(license.software.as_str());
        let seats_used = usage.map(|u| u.active_installs).unwrap_or(0);
        let inactive_installs = usage.map(|u| u.inactive_installs).unwrap_or(0);
        let installs_count = usage.map(|u| u.installs_count).unwrap_or(0);

        let purchased = i64::from(license.seats_purchased);
        let used = i64::from(seats_used);
        let seats_unused = (purchased - used).max(0) as u32;
        let overage = (used - purchased).max(0) as u32;

        let contract_days_remaining = license.contract_days_remaining(today);
        let renewal_due = contract_days_remaining <= renewal_window_days;

        let potential_savings_usd = if license.is_subscription() {
            f64::from(seats_unused) * license.unit_cost_usd
        } else {
            0.0
        };

        rows.push(ElpRow {
            software: license.software.clone(),
            vendor: license.vendor.clone(),
            license_type: license.license_type.clone(),
            seats_purchased: license.seats_purchased,
            seats_used,
            elp: purchased - used,
            overage,
            seats_unused,
            unit_cost_usd: license.unit_cost_usd,
            potential_savings_usd,
            contract_end: license.contract_end,
            contract_days_remaining,
            renewal_due,
            inactive_installs,
            installs_count,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NEVER_EXPIRES_DAYS;

    const RENEWAL_WINDOW: i64 = 30;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn zoom_license() -> LicenseRecord {
        LicenseRecord::new("Zoom Pro")
            .with_vendor("Zoom")
            .with_license_type("subscription")
            .with_seats(50, 12.0)
    }

    fn usage(active: u32, inactive: u32) -> ProductUsage {
        ProductUsage {
            software: "Zoom Pro".to_string(),
            installs_count: active + inactive,
            active_installs: active,
            inactive_installs: inactive,
            last_used_max: None,
        }
    }

    #[test]
    fn under_used_subscription_reports_savings() {
        let rows = compute_elp(&[zoom_license()], &[usage(30, 5)], today(), RENEWAL_WINDOW);
        let row = &rows[0];
        assert_eq!(row.seats_used, 30);
        assert_eq!(row.seats_unused, 20);
        assert_eq!(row.overage, 0);
        assert_eq!(row.elp, 20);
        assert!((row.potential_savings_usd - 240.0).abs() < 1e-9);
    }

    #[test]
    fn overage_zeroes_unused_and_savings() {
        let rows = compute_elp(&[zoom_license()], &[usage(55, 0)], today(), RENEWAL_WINDOW);
        let row = &rows[0];
        assert_eq!(row.overage, 5);
        assert_eq!(row.elp, -5);
        assert_eq!(row.seats_unused, 0);
        assert_eq!(row.potential_savings_usd, 0.0);
    }

    #[test]
    fn perpetual_licenses_never_report_savings() {
        let perpetual = LicenseRecord::new("SAP S/4HANA")
            .with_license_type("perpetual")
            .with_seats(10, 2500.0);
        let usage = ProductUsage {
            software: "SAP S/4HANA".to_string(),
            installs_count: 2,
            active_installs: 2,
            inactive_installs: 0,
            last_used_max: None,
        };
        let rows = compute_elp(&[perpetual], &[usage], today(), RENEWAL_WINDOW);
        assert_eq!(rows[0].seats_unused, 8);
        assert_eq!(rows[0].potential_savings_usd, 0.0);
    }

    #[test]
    fn product_without_installs_fills_zero_usage() {
        let rows = compute_elp(&[zoom_license()], &[], today(), RENEWAL_WINDOW);
        let row = &rows[0];
        assert_eq!(row.seats_used, 0);
        assert_eq!(row.installs_count, 0);
        assert_eq!(row.seats_unused, 50);
    }

    #[test]
    fn contract_timing_uses_injected_today() {
        let expiring = zoom_license().with_contract(None, NaiveDate::from_ymd_opt(2025, 6, 6));
        let rows = compute_elp(&[expiring], &[], today(), RENEWAL_WINDOW);
        assert_eq!(rows[0].contract_days_remaining, 5);
        assert!(rows[0].renewal_due);

        let open_ended = zoom_license();
        let rows = compute_elp(&[open_ended], &[], today(), RENEWAL_WINDOW);
        assert_eq!(rows[0].contract_days_remaining, NEVER_EXPIRES_DAYS);
        assert!(!rows[0].renewal_due);
    }

    #[test]
    fn recomputation_is_idempotent_under_fixed_today() {
        let licenses = [zoom_license()];
        let usage = [usage(30, 5)];
        let first = compute_elp(&licenses, &usage, today(), RENEWAL_WINDOW);
        let second = compute_elp(&licenses, &usage, today(), RENEWAL_WINDOW);
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_license_rows_use_first_match() {
        let rows = compute_elp(
            &[zoom_license(), zoom_license().with_seats(5, 1.0)],
            &[usage(30, 0)],
            today(),
            RENEWAL_WINDOW,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seats_purchased, 50);
    }
}
