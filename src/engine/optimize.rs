use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::engine::counting::{distinct_seats, CountingPolicy};
use crate::engine::join::{license_index, EnrichedInstall};
use crate::model::{LicenseRecord, UserStatus};

/// One installation surfaced in a reclaim / low-usage / removal table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallDetail {
    pub user_email: String,
    pub software: String,
    pub device_id: String,
    pub last_used_date: Option<NaiveDate>,
    pub status: UserStatus,
    pub department: Option<String>,
}

impl InstallDetail {
    fn from_enriched(row: &EnrichedInstall, has_department: bool) -> Self {
        Self {
            user_email: row.user_email.clone(),
            software: row.software.clone(),
            device_id: row.device_id.clone(),
            last_used_date: row.last_used_date,
            status: row.status,
            department: has_department.then(|| row.department.clone()),
        }
    }
}

/// Installations still held by terminated users. Reclaim these first.
pub fn reclaim_candidates(
    enriched: &[EnrichedInstall],
    has_department: bool,
) -> Vec<InstallDetail> {
    enriched
        .iter()
        .filter(|r| r.status == UserStatus::Terminated)
        .map(|r| InstallDetail::from_enriched(r, has_department))
        .collect()
}

/// Active-status installations with no recorded activity in the stale window
/// (or no usage history at all). Terminated holders are excluded here; they
/// belong to the reclaim list.
pub fn low_usage_candidates(
    enriched: &[EnrichedInstall],
    today: NaiveDate,
    low_usage_days: u64,
    has_department: bool,
) -> Vec<InstallDetail> {
    let threshold = today
        .checked_sub_days(Days::new(low_usage_days))
        .unwrap_or(today);
    enriched
        .iter()
        .filter(|r| r.status == UserStatus::Active)
        .filter(|r| match r.last_used_date {
            Some(last_used) => last_used < threshold,
            None => true,
        })
        .map(|r| InstallDetail::from_enriched(r, has_department))
        .collect()
}

/// Deep-dive summary for one product: position metrics plus the three
/// install tables (active, reclaim, low-usage) with their savings figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDrilldown {
    pub software: String,
    pub vendor: Option<String>,
    pub license_type: Option<String>,
    pub seats_purchased: u32,
    pub active_installs: u32,
    pub seats_unused: u32,
    pub overage: u32,
    pub unit_cost_usd: f64,
    pub potential_savings_usd: f64,
    pub active: Vec<InstallDetail>,
    pub reclaim: Vec<InstallDetail>,
    pub immediate_savings_usd: f64,
    pub low_usage: Vec<InstallDetail>,
    pub low_usage_savings_usd: f64,
}

pub fn product_drilldown(
    licenses: &[LicenseRecord],
    enriched: &[EnrichedInstall],
    software: &str,
    policy: &dyn CountingPolicy,
    today: NaiveDate,
    low_usage_days: u64,
    has_department: bool,
) -> Result<ProductDrilldown> {
    let index = license_index(licenses);
    let license = index
        .get(software)
        .ok_or_else(|| anyhow!("no license information found for {software}"))?;

    let product_rows: Vec<&EnrichedInstall> = enriched
        .iter()
        .filter(|r| r.software == software)
        .collect();

    let active_rows: Vec<&EnrichedInstall> = product_rows
        .iter()
        .copied()
        .filter(|r| r.status == UserStatus::Active)
        .collect();
    let active_installs = distinct_seats(active_rows.iter().copied(), policy);

    let purchased = i64::from(license.seats_purchased);
    let seats_unused = (purchased - i64::from(active_installs)).max(0) as u32;
    let overage = (i64::from(active_installs) - purchased).max(0) as u32;
    let subscription = license.is_subscription();

    let potential_savings_usd = if subscription {
        f64::from(seats_unused) * license.unit_cost_usd
    } else {
        0.0
    };

    let terminated_rows: Vec<&EnrichedInstall> = product_rows
        .iter()
        .copied()
        .filter(|r| r.status == UserStatus::Terminated)
        .collect();
    let terminated_count = distinct_seats(terminated_rows.iter().copied(), policy);
    let immediate_savings_usd = if subscription {
        f64::from(terminated_count) * license.unit_cost_usd
    } else {
        0.0
    };

    let product_enriched: Vec<EnrichedInstall> =
        product_rows.iter().map(|r| (*r).clone()).collect();
    let low_usage = low_usage_candidates(&product_enriched, today, low_usage_days, has_department);
    let low_usage_refs: Vec<&EnrichedInstall> = product_rows
        .iter()
        .copied()
        .filter(|r| {
            low_usage
                .iter()
                .any(|c| c.device_id == r.device_id && c.user_email == r.user_email)
        })
        .collect();
    let low_usage_count = distinct_seats(low_usage_refs.iter().copied(), policy);
    let low_usage_savings_usd = if subscription {
        f64::from(low_usage_count) * license.unit_cost_usd
    } else {
        0.0
    };

    Ok(ProductDrilldown {
        software: software.to_string(),
        vendor: license.vendor.clone(),
        license_type: license.license_type.clone(),
        seats_purchased: license.seats_purchased,
        active_installs,
        seats_unused,
        overage,
        unit_cost_usd: license.unit_cost_usd,
        potential_savings_usd,
        active: active_rows
            .iter()
            .map(|r| InstallDetail::from_enriched(r, has_department))
            .collect(),
        reclaim: terminated_rows
            .iter()
            .map(|r| InstallDetail::from_enriched(r, has_department))
            .collect(),
        immediate_savings_usd,
        low_usage,
        low_usage_savings_usd,
    })
}
