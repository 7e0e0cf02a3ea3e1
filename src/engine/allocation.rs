use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::engine::counting::{distinct_seats, CountingPolicy};
use crate::engine::join::{license_index, CostedInstall, EnrichedInstall};
use crate::engine::optimize::InstallDetail;
use crate::model::{LicenseRecord, UserStatus};

/// Department-level utilization and cost view. `share_of_spend` is a
/// proportional proxy: the total subscription portfolio cost allocated by
/// active-seat share, assuming uniform cost distribution within a
/// department. It is not a traced per-seat cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentRow {
    pub department: String,
    pub used_seats: u32,
    pub terminated_seats: u32,
    pub total_installs: u32,
    pub reclaimable_savings_usd: f64,
    pub share_of_spend_usd: f64,
    pub share_percent: f64,
}

/// Total subscription portfolio cost: sum of unit cost x purchased seats
/// over subscription licenses, first row per product.
pub fn subscription_portfolio_cost(licenses: &[LicenseRecord]) -> f64 {
    let index = license_index(licenses);
    index
        .values()
        .filter(|l| l.is_subscription())
        .map(|l| l.unit_cost_usd * f64::from(l.seats_purchased))
        .sum()
}

/// Group costed installations by department and derive seat counts,
/// reclaimable savings, and the proportional spend allocation. Sorted by
/// share descending. Departments with zero used seats allocate nothing; a
/// portfolio with zero used seats anywhere allocates nothing anywhere.
pub fn allocate_departments(
    costed: &[CostedInstall],
    licenses: &[LicenseRecord],
    policy: &dyn CountingPolicy,
) -> Vec<DepartmentRow> {
    let mut by_department: BTreeMap<&str, Vec<&CostedInstall>> = BTreeMap::new();
    for row in costed {
        by_department
            .entry(row.install.department.as_str())
            .or_default()
            .push(row);
    }

    let mut rows: Vec<DepartmentRow> = by_department
        .into_iter()
        .map(|(department, dept_rows)| {
            let installs: Vec<&EnrichedInstall> =
                dept_rows.iter().map(|r| &r.install).collect();
            let used_seats = distinct_seats(
                installs
                    .iter()
                    .copied()
                    .filter(|r| r.status == UserStatus::Active),
                policy,
            );
            let terminated_seats = distinct_seats(
                installs
                    .iter()
                    .copied()
                    .filter(|r| r.status == UserStatus::Terminated),
                policy,
            );
            let total_installs = distinct_seats(installs.iter().copied(), policy);

            // One charge per distinct seat key; in user mode this collapses a
            // multi-device user to the first matching cost.
            let mut seen: HashSet<&str> = HashSet::new();
            let mut reclaimable_savings_usd = 0.0;
            for row in dept_rows
                .iter()
                .filter(|r| r.install.status == UserStatus::Terminated && r.subscription)
            {
                if seen.insert(policy.seat_key(&row.install)) {
                    reclaimable_savings_usd += row.unit_cost_usd;
                }
            }

            DepartmentRow {
                department: department.to_string(),
                used_seats,
                terminated_seats,
                total_installs,
                reclaimable_savings_usd,
                share_of_spend_usd: 0.0,
                share_percent: 0.0,
            }
        })
        .collect();

    let total_used_seats: u32 = rows.iter().map(|r| r.used_seats).sum();
    if total_used_seats > 0 {
        let portfolio_cost = subscription_portfolio_cost(licenses);
        for row in &mut rows {
            let weight = f64::from(row.used_seats) / f64::from(total_used_seats);
            row.share_of_spend_usd = weight * portfolio_cost;
            row.share_percent = weight * 100.0;
        }
    }

    rows.sort_by(|a, b| {
        b.share_of_spend_usd
            .total_cmp(&a.share_of_spend_usd)
            .then_with(|| a.department.cmp(&b.department))
    });
    rows
}

/// Per-software status breakdown within one department, plus its reclaim
/// list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentDetail {
    pub department: String,
    pub software_breakdown: Vec<SoftwareStatusCount>,
    pub reclaim: Vec<InstallDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoftwareStatusCount {
    pub software: String,
    pub active: u32,
    pub terminated: u32,
    pub unknown: u32,
}

pub fn department_detail(
    costed: &[CostedInstall],
    department: &str,
    policy: &dyn CountingPolicy,
) -> DepartmentDetail {
    let dept_rows: Vec<&EnrichedInstall> = costed
        .iter()
        .map(|r| &r.install)
        .filter(|r| r.department == department)
        .collect();

    let mut by_software: BTreeMap<&str, Vec<&EnrichedInstall>> = BTreeMap::new();
    for row in &dept_rows {
        by_software.entry(row.software.as_str()).or_default().push(row);
    }

    let software_breakdown = by_software
        .into_iter()
        .map(|(software, rows)| SoftwareStatusCount {
            software: software.to_string(),
            active: distinct_seats(
                rows.iter().copied().filter(|r| r.status == UserStatus::Active),
                policy,
            ),
            terminated: distinct_seats(
                rows.iter()
                    .copied()
                    .filter(|r| r.status == UserStatus::Terminated),
                policy,
            ),
            unknown: distinct_seats(
                rows.iter()
                    .copied()
                    .filter(|r| r.status == UserStatus::Unknown),
                policy,
            ),
        })
        .collect();

    let reclaim = dept_rows
        .iter()
        .filter(|r| r.status == UserStatus::Terminated)
        .map(|r| InstallDetail {
            user_email: r.user_email.clone(),
            software: r.software.clone(),
            device_id: r.device_id.clone(),
            last_used_date: r.last_used_date,
            status: r.status,
            department: Some(r.department.clone()),
        })
        .collect();

    DepartmentDetail {
        department: department.to_string(),
        software_breakdown,
        reclaim,
    }
}
