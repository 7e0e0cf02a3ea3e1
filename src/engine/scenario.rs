use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::engine::counting::{distinct_seats, CountingPolicy};
use crate::engine::join::{license_index, EnrichedInstall};
use crate::engine::optimize::InstallDetail;
use crate::model::{LicenseRecord, UserStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub software: String,
    pub reduce_seats: u32,
    /// When set (recommended), the removal list draws from active users
    /// only; terminated holders belong to the reclaim process instead.
    #[serde(default = "default_exclude_terminated")]
    pub exclude_terminated: bool,
}

fn default_exclude_terminated() -> bool {
    true
}

/// What-if projection for reducing one product's seat count. Pure: nothing
/// in the underlying data changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPlan {
    pub software: String,
    pub license_type: Option<String>,
    pub is_subscription: bool,
    pub seats_purchased: u32,
    /// The applied reduction, clamped to the purchased seat count.
    pub reduce_seats: u32,
    pub new_seat_count: u32,
    pub active_count: u32,
    pub terminated_count: u32,
    pub unused_seats: u32,
    pub remaining_active_users: u32,
    pub projected_savings_usd: f64,
    /// Seats by which remaining active users would exceed the reduced
    /// entitlement; zero when the reduction is safe.
    pub projected_overage: u32,
    pub removals: Vec<InstallDetail>,
}

/// Rank removal candidates by staleness and project the post-reduction
/// position. Candidates sort ascending by `last_used_date`; rows with no
/// usage history go to the bottom of the ordering (no history is not
/// evidence of disuse), then one row per seat key (earliest date wins) and
/// the first N rows become the recommendation.
pub fn plan_scenario(
    licenses: &[LicenseRecord],
    enriched: &[EnrichedInstall],
    request: &ScenarioRequest,
    policy: &dyn CountingPolicy,
    has_department: bool,
) -> Result<ScenarioPlan> {
    let index = license_index(licenses);
    let license = index
        .get(request.software.as_str())
        .ok_or_else(|| anyhow!("no license information found for {}", request.software))?;

    let product_rows: Vec<&EnrichedInstall> = enriched
        .iter()
        .filter(|r| r.software == request.software)
        .collect();

    let active_count = distinct_seats(
        product_rows
            .iter()
            .copied()
            .filter(|r| r.status == UserStatus::Active),
        policy,
    );
    let terminated_count = distinct_seats(
        product_rows
            .iter()
            .copied()
            .filter(|r| r.status == UserStatus::Terminated),
        policy,
    );

    let reduce_seats = request.reduce_seats.min(license.seats_purchased);
    let new_seat_count = license.seats_purchased - reduce_seats;
    let unused_seats = (i64::from(license.seats_purchased) - i64::from(active_count)).max(0) as u32;

    let mut candidates: Vec<&EnrichedInstall> = if request.exclude_terminated {
        product_rows
            .iter()
            .copied()
            .filter(|r| r.status == UserStatus::Active)
            .collect()
    } else {
        product_rows.clone()
    };

    // Least-recently-used first; unknown usage history last.
    candidates.sort_by_key(|r| (r.last_used_date.is_none(), r.last_used_date));

    // One candidate per seat key, keeping the stalest row. Collapses a
    // multi-device user to a single recommendation in user mode.
    let mut seen: Vec<&str> = Vec::new();
    let mut deduped: Vec<&EnrichedInstall> = Vec::new();
    for row in candidates {
        let key = policy.seat_key(row);
        if !seen.contains(&key) {
            seen.push(key);
            deduped.push(row);
        }
    }

    let removals: Vec<InstallDetail> = deduped
        .into_iter()
        .take(reduce_seats as usize)
        .map(|r| InstallDetail {
            user_email: r.user_email.clone(),
            software: r.software.clone(),
            device_id: r.device_id.clone(),
            last_used_date: r.last_used_date,
            status: r.status,
            department: has_department.then(|| r.department.clone()),
        })
        .collect();

    let is_subscription = license.is_subscription();
    let projected_savings_usd = if is_subscription {
        f64::from(reduce_seats) * license.unit_cost_usd
    } else {
        0.0
    };

    let remaining_active_users = active_count - reduce_seats.min(active_count);
    let projected_overage =
        (i64::from(remaining_active_users) - i64::from(new_seat_count)).max(0) as u32;

    Ok(ScenarioPlan {
        software: request.software.clone(),
        license_type: license.license_type.clone(),
        is_subscription,
        seats_purchased: license.seats_purchased,
        reduce_seats,
        new_seat_count,
        active_count,
        terminated_count,
        unused_seats,
        remaining_active_users,
        projected_savings_usd,
        projected_overage,
        removals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::counting::{ByDevice, ByUser};
    use chrono::NaiveDate;

    fn row(
        device: &str,
        user: &str,
        status: UserStatus,
        last_used: Option<NaiveDate>,
    ) -> EnrichedInstall {
        EnrichedInstall {
            device_id: device.to_string(),
            user_email: user.to_string(),
            software: "Zoom Pro".to_string(),
            install_date: None,
            last_used_date: last_used,
            status,
            department: "Engineering".to_string(),
        }
    }

    fn date(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 3, day)
    }

    fn zoom(seats: u32) -> Vec<LicenseRecord> {
        vec![LicenseRecord::new("Zoom Pro")
            .with_license_type("subscription")
            .with_seats(seats, 12.0)]
    }

    fn request(reduce: u32, exclude_terminated: bool) -> ScenarioRequest {
        ScenarioRequest {
            software: "Zoom Pro".to_string(),
            reduce_seats: reduce,
            exclude_terminated,
        }
    }

    #[test]
    fn undated_rows_sort_last_in_the_removal_ordering() {
        // 10 active users: 8 dated ascending, 2 with no history
        let mut rows: Vec<EnrichedInstall> = (1..=8)
            .map(|i| row(&format!("LAP-{i}"), &format!("u{i}@acme.com"), UserStatus::Active, date(i)))
            .collect();
        rows.push(row("LAP-9", "u9@acme.com", UserStatus::Active, None));
        rows.push(row("LAP-10", "u10@acme.com", UserStatus::Active, None));

        let plan = plan_scenario(&zoom(10), &rows, &request(9, true), &ByDevice, true).unwrap();
        assert_eq!(plan.removals.len(), 9);
        for (i, removal) in plan.removals.iter().take(8).enumerate() {
            assert_eq!(removal.last_used_date, date(i as u32 + 1));
        }
        assert!(plan.removals[8].last_used_date.is_none());
    }

    #[test]
    fn recommendation_is_a_prefix_of_the_staleness_ordering() {
        let rows = vec![
            row("LAP-1", "a@acme.com", UserStatus::Active, date(20)),
            row("LAP-2", "b@acme.com", UserStatus::Active, date(5)),
            row("LAP-3", "c@acme.com", UserStatus::Active, date(12)),
        ];
        let full = plan_scenario(&zoom(10), &rows, &request(3, true), &ByDevice, false).unwrap();
        for n in 0..=3u32 {
            let plan =
                plan_scenario(&zoom(10), &rows, &request(n, true), &ByDevice, false).unwrap();
            assert_eq!(plan.removals.len(), n as usize);
            assert_eq!(plan.removals[..], full.removals[..n as usize]);
        }
        assert_eq!(full.removals[0].user_email, "b@acme.com");
        assert_eq!(full.removals[1].user_email, "c@acme.com");
    }

    #[test]
    fn list_is_bounded_by_candidate_pool() {
        let rows = vec![
            row("LAP-1", "a@acme.com", UserStatus::Active, date(1)),
            row("LAP-2", "t@acme.com", UserStatus::Terminated, date(2)),
        ];
        let plan = plan_scenario(&zoom(10), &rows, &request(10, true), &ByDevice, false).unwrap();
        assert_eq!(plan.removals.len(), 1);

        let with_terminated =
            plan_scenario(&zoom(10), &rows, &request(10, false), &ByDevice, false).unwrap();
        assert_eq!(with_terminated.removals.len(), 2);
    }

    #[test]
    fn user_mode_collapses_devices_keeping_earliest_use() {
        let rows = vec![
            row("LAP-1", "a@acme.com", UserStatus::Active, date(15)),
            row("LAP-2", "a@acme.com", UserStatus::Active, date(2)),
            row("LAP-3", "b@acme.com", UserStatus::Active, date(8)),
        ];
        let plan = plan_scenario(&zoom(10), &rows, &request(2, true), &ByUser, false).unwrap();
        assert_eq!(plan.removals.len(), 2);
        assert_eq!(plan.removals[0].user_email, "a@acme.com");
        assert_eq!(plan.removals[0].last_used_date, date(2));
        assert_eq!(plan.removals[1].user_email, "b@acme.com");
        assert_eq!(plan.active_count, 2);
    }

    #[test]
    fn impact_metrics_project_savings() {
        let rows: Vec<EnrichedInstall> = (1..=8)
            .map(|i| row(&format!("LAP-{i}"), &format!("u{i}@acme.com"), UserStatus::Active, date(i)))
            .collect();
        let plan = plan_scenario(&zoom(10), &rows, &request(4, true), &ByDevice, false).unwrap();
        assert_eq!(plan.new_seat_count, 6);
        assert_eq!(plan.remaining_active_users, 4);
        assert!((plan.projected_savings_usd - 48.0).abs() < 1e-9);
        assert_eq!(plan.projected_overage, 0);
    }

    #[test]
    fn overage_warning_when_remaining_users_exceed_reduced_seats() {
        // already over-used: 10 active users against 8 purchased seats
        let rows: Vec<EnrichedInstall> = (1..=10)
            .map(|i| row(&format!("LAP-{i}"), &format!("u{i}@acme.com"), UserStatus::Active, date(i)))
            .collect();
        let plan = plan_scenario(&zoom(8), &rows, &request(2, true), &ByDevice, false).unwrap();
        assert_eq!(plan.new_seat_count, 6);
        assert_eq!(plan.remaining_active_users, 8);
        assert_eq!(plan.projected_overage, 2);
    }

    #[test]
    fn reduction_is_clamped_and_perpetual_saves_nothing() {
        let perpetual = vec![LicenseRecord::new("Zoom Pro")
            .with_license_type("perpetual")
            .with_seats(5, 100.0)];
        let rows = vec![row("LAP-1", "a@acme.com", UserStatus::Active, date(1))];
        let plan = plan_scenario(&perpetual, &rows, &request(50, true), &ByDevice, false).unwrap();
        assert_eq!(plan.reduce_seats, 5);
        assert_eq!(plan.new_seat_count, 0);
        assert_eq!(plan.projected_savings_usd, 0.0);
    }

    #[test]
    fn unknown_product_is_an_error() {
        let err = plan_scenario(&zoom(10), &[], &request(1, true), &ByDevice, false);
        assert!(err.is_err());
    }
}
