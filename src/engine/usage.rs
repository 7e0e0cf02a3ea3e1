use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::counting::{distinct_seats, CountingPolicy};
use crate::engine::join::EnrichedInstall;
use crate::model::UserStatus;

/// Per-product utilization counts. Products with zero installations produce
/// no row here; the ELP merge left-joins and fills zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductUsage {
    pub software: String,
    pub installs_count: u32,
    pub active_installs: u32,
    pub inactive_installs: u32,
    pub last_used_max: Option<NaiveDate>,
}

/// Group enriched installations by product and count seats under the given
/// policy. `Unknown`-status rows count toward `installs_count` but neither
/// active nor inactive. Output is sorted by software name.
pub fn aggregate_usage(
    enriched: &[EnrichedInstall],
    policy: &dyn CountingPolicy,
) -> Vec<ProductUsage> {
    let mut by_software: BTreeMap<&str, Vec<&EnrichedInstall>> = BTreeMap::new();
    for row in enriched {
        by_software.entry(row.software.as_str()).or_default().push(row);
    }

    by_software
        .into_iter()
        .map(|(software, rows)| ProductUsage {
            software: software.to_string(),
            installs_count: distinct_seats(rows.iter().copied(), policy),
            active_installs: distinct_seats(
                rows.iter().copied().filter(|r| r.status == UserStatus::Active),
                policy,
            ),
            inactive_installs: distinct_seats(
                rows.iter()
                    .copied()
                    .filter(|r| r.status == UserStatus::Terminated),
                policy,
            ),
            last_used_max: rows.iter().filter_map(|r| r.last_used_date).max(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::counting::{ByDevice, ByUser};

    fn row(device: &str, user: &str, software: &str, status: UserStatus) -> EnrichedInstall {
        EnrichedInstall {
            device_id: device.to_string(),
            user_email: user.to_string(),
            software: software.to_string(),
            install_date: None,
            last_used_date: None,
            status,
            department: "Engineering".to_string(),
        }
    }

    #[test]
    fn counts_respect_policy() {
        // one active user on two devices, one terminated user, one unknown
        let rows = vec![
            row("LAP-1", "a@acme.com", "Zoom Pro", UserStatus::Active),
            row("LAP-2", "a@acme.com", "Zoom Pro", UserStatus::Active),
            row("LAP-3", "t@acme.com", "Zoom Pro", UserStatus::Terminated),
            row("LAP-4", "g@acme.com", "Zoom Pro", UserStatus::Unknown),
        ];

        let by_device = aggregate_usage(&rows, &ByDevice);
        assert_eq!(by_device.len(), 1);
        assert_eq!(by_device[0].installs_count, 4);
        assert_eq!(by_device[0].active_installs, 2);
        assert_eq!(by_device[0].inactive_installs, 1);

        let by_user = aggregate_usage(&rows, &ByUser);
        assert_eq!(by_user[0].installs_count, 3);
        assert_eq!(by_user[0].active_installs, 1);
        assert_eq!(by_user[0].inactive_installs, 1);
    }

    #[test]
    fn tracks_latest_usage_date_per_product() {
        let mut first = row("LAP-1", "a@acme.com", "Zoom Pro", UserStatus::Active);
        first.last_used_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        let mut second = row("LAP-2", "b@acme.com", "Zoom Pro", UserStatus::Active);
        second.last_used_date = NaiveDate::from_ymd_opt(2025, 5, 20);
        let undated = row("LAP-3", "c@acme.com", "Zoom Pro", UserStatus::Active);

        let usage = aggregate_usage(&[first, second, undated], &ByDevice);
        assert_eq!(usage[0].last_used_max, NaiveDate::from_ymd_opt(2025, 5, 20));
    }

    #[test]
    fn products_are_grouped_and_sorted() {
        let rows = vec![
            row("LAP-1", "a@acme.com", "Zoom Pro", UserStatus::Active),
            row("LAP-2", "a@acme.com", "Figma", UserStatus::Active),
        ];
        let usage = aggregate_usage(&rows, &ByDevice);
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].software, "Figma");
        assert_eq!(usage[1].software, "Zoom Pro");
    }
}
