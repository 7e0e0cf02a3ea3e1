use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{LicenseRecord, VendorRecord, NEVER_EXPIRES_DAYS};

/// One contract on the renewal radar: timing, vendor notice window, and an
/// annual spend proxy (seats x unit cost).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenewalRow {
    pub software: String,
    pub vendor: Option<String>,
    pub license_type: Option<String>,
    pub seats_purchased: u32,
    pub unit_cost_usd: f64,
    pub contract_end: Option<NaiveDate>,
    /// Raw days remaining; negative once expired, sentinel when open-ended.
    pub days_remaining: i64,
    /// Clamped at zero for display.
    pub days_remaining_display: i64,
    pub renewal_notice_days: i64,
    pub notice_start: Option<NaiveDate>,
    pub in_notice_window: bool,
    pub expiring_soon: bool,
    pub annual_spend_proxy: f64,
    pub is_subscription: bool,
}

/// Licenses LEFT JOIN Vendors on `vendor` for notice windows, sorted by
/// days remaining ascending. A missing vendors table or vendor row falls
/// back to `default_notice_days`; a missing contract end is never in the
/// notice window.
pub fn build_renewal_schedule(
    licenses: &[LicenseRecord],
    vendors: &[VendorRecord],
    today: NaiveDate,
    default_notice_days: i64,
    renewal_window_days: i64,
) -> Vec<RenewalRow> {
    let notice_by_vendor: HashMap<&str, i64> = vendors
        .iter()
        .map(|v| (v.vendor.as_str(), v.renewal_notice_days))
        .collect();

    let mut rows: Vec<RenewalRow> = licenses
        .iter()
        .map(|license| {
            let renewal_notice_days = license
                .vendor
                .as_deref()
                .and_then(|v| notice_by_vendor.get(v).copied())
                .unwrap_or(default_notice_days);

            let days_remaining = license.contract_days_remaining(today);
            let notice_start = license
                .contract_end
                .map(|end| end - Duration::days(renewal_notice_days));
            let in_notice_window = notice_start
                .map(|start| today >= start && days_remaining > 0)
                .unwrap_or(false);

            RenewalRow {
                software: license.software.clone(),
                vendor: license.vendor.clone(),
                license_type: license.license_type.clone(),
                seats_purchased: license.seats_purchased,
                unit_cost_usd: license.unit_cost_usd,
                contract_end: license.contract_end,
                days_remaining,
                days_remaining_display: days_remaining.max(0),
                renewal_notice_days,
                notice_start,
                in_notice_window,
                expiring_soon: days_remaining <= renewal_window_days,
                annual_spend_proxy: f64::from(license.seats_purchased) * license.unit_cost_usd,
                is_subscription: license.is_subscription(),
            }
        })
        .collect();

    rows.sort_by_key(|r| r.days_remaining);
    rows
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalFilter {
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub subscriptions_only: bool,
    #[serde(default)]
    pub max_days: Option<i64>,
}

impl RenewalFilter {
    pub fn apply(&self, rows: &[RenewalRow]) -> Vec<RenewalRow> {
        rows.iter()
            .filter(|r| {
                if !self.vendors.is_empty() {
                    let vendor = r.vendor.as_deref().unwrap_or("");
                    if !self.vendors.iter().any(|v| v == vendor) {
                        return false;
                    }
                }
                if self.subscriptions_only && !r.is_subscription {
                    return false;
                }
                match self.max_days {
                    Some(max_days) => r.days_remaining <= max_days,
                    None => true,
                }
            })
            .cloned()
            .collect()
    }
}

/// Plain-text digest of contracts inside the expiry window, suitable for
/// pasting into email or chat. `None` when nothing is expiring.
pub fn renewal_alert_digest(rows: &[RenewalRow]) -> Option<String> {
    let expiring: Vec<&RenewalRow> = rows
        .iter()
        .filter(|r| r.expiring_soon && r.days_remaining != NEVER_EXPIRES_DAYS)
        .collect();
    if expiring.is_empty() {
        return None;
    }

    let mut text = format!(
        "RENEWAL ALERT: {} product(s) expiring soon\n\n",
        expiring.len()
    );
    for row in &expiring {
        let end = row
            .contract_end
            .map(|d| d.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            text,
            "- {} | {} | Expires: {} ({} days) | Seats: {} | Annual Cost: ${:.2}",
            row.software,
            row.vendor.as_deref().unwrap_or("Unknown"),
            end,
            row.days_remaining,
            row.seats_purchased,
            row.annual_spend_proxy,
        );
    }
    let total: f64 = expiring
        .iter()
        .filter(|r| r.is_subscription)
        .map(|r| r.annual_spend_proxy)
        .sum();
    let _ = write!(
        text,
        "\nTotal renewal spend (subscriptions): ${total:.2}\nAction Required: Contact vendors to initiate renewal process.\n"
    );
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn license(software: &str, vendor: &str, end: Option<NaiveDate>) -> LicenseRecord {
        LicenseRecord::new(software)
            .with_vendor(vendor)
            .with_license_type("subscription")
            .with_seats(10, 20.0)
            .with_contract(None, end)
    }

    #[test]
    fn vendor_notice_days_override_default() {
        let licenses = vec![
            license("Zoom Pro", "Zoom", NaiveDate::from_ymd_opt(2025, 8, 1)),
            license("Figma", "Figma Inc", NaiveDate::from_ymd_opt(2025, 8, 1)),
        ];
        let vendors = vec![VendorRecord {
            vendor: "Zoom".to_string(),
            renewal_notice_days: 90,
        }];
        let rows = build_renewal_schedule(&licenses, &vendors, today(), 30, 30);
        let zoom = rows.iter().find(|r| r.software == "Zoom Pro").unwrap();
        let figma = rows.iter().find(|r| r.software == "Figma").unwrap();
        assert_eq!(zoom.renewal_notice_days, 90);
        assert!(zoom.in_notice_window);
        assert_eq!(figma.renewal_notice_days, 30);
        assert!(!figma.in_notice_window);
    }

    #[test]
    fn missing_contract_end_is_never_in_notice_window() {
        let rows = build_renewal_schedule(
            &[license("Visio Plan 2", "Microsoft", None)],
            &[],
            today(),
            30,
            30,
        );
        assert_eq!(rows[0].days_remaining, NEVER_EXPIRES_DAYS);
        assert!(!rows[0].in_notice_window);
        assert!(!rows[0].expiring_soon);
        assert!(rows[0].notice_start.is_none());
    }

    #[test]
    fn schedule_sorts_by_days_remaining_and_clamps_display() {
        let rows = build_renewal_schedule(
            &[
                license("Later", "V", NaiveDate::from_ymd_opt(2025, 9, 1)),
                license("Expired", "V", NaiveDate::from_ymd_opt(2025, 5, 1)),
                license("Sooner", "V", NaiveDate::from_ymd_opt(2025, 6, 10)),
            ],
            &[],
            today(),
            30,
            30,
        );
        let order: Vec<&str> = rows.iter().map(|r| r.software.as_str()).collect();
        assert_eq!(order, vec!["Expired", "Sooner", "Later"]);
        assert!(rows[0].days_remaining < 0);
        assert_eq!(rows[0].days_remaining_display, 0);
    }

    #[test]
    fn max_days_filter_trims_schedule() {
        let rows = build_renewal_schedule(
            &[
                license("Soon", "V", NaiveDate::from_ymd_opt(2025, 6, 20)),
                license("Later", "V", NaiveDate::from_ymd_opt(2026, 6, 20)),
            ],
            &[],
            today(),
            30,
            30,
        );
        let filter = RenewalFilter {
            max_days: Some(90),
            ..RenewalFilter::default()
        };
        let filtered = filter.apply(&rows);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].software, "Soon");
    }

    #[test]
    fn digest_lists_expiring_contracts_only() {
        let rows = build_renewal_schedule(
            &[
                license("Zoom Pro", "Zoom", NaiveDate::from_ymd_opt(2025, 6, 6)),
                license("Figma", "Figma Inc", NaiveDate::from_ymd_opt(2026, 6, 6)),
            ],
            &[],
            today(),
            30,
            30,
        );
        let digest = renewal_alert_digest(&rows).unwrap();
        assert!(digest.contains("Zoom Pro"));
        assert!(!digest.contains("Figma"));
        assert!(digest.contains("$200.00"));

        let quiet = build_renewal_schedule(
            &[license("Figma", "Figma Inc", NaiveDate::from_ymd_opt(2026, 6, 6))],
            &[],
            today(),
            30,
            30,
        );
        assert!(renewal_alert_digest(&quiet).is_none());
    }
}
