use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{InstallRecord, LicenseRecord, UserRecord, UserStatus};

pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// Installation row enriched with the owning user's status and department.
/// Produced by a left join, so every installation survives; installs whose
/// user is absent from the users table carry `Unknown` status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedInstall {
    pub device_id: String,
    pub user_email: String,
    pub software: String,
    pub install_date: Option<NaiveDate>,
    pub last_used_date: Option<NaiveDate>,
    pub status: UserStatus,
    pub department: String,
}

/// `EnrichedInstall` further joined with the product's license cost. Cost
/// defaults to 0 for installs referencing software with no license row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostedInstall {
    pub install: EnrichedInstall,
    pub unit_cost_usd: f64,
    pub subscription: bool,
}

/// Installations LEFT JOIN Users on `user_email`. Pure transform, never
/// drops or rejects a row.
pub fn join_installs_with_users(
    installs: &[InstallRecord],
    users: &[UserRecord],
) -> Vec<EnrichedInstall> {
    let mut by_email: HashMap<&str, &UserRecord> = HashMap::with_capacity(users.len());
    for user in users {
        // first row wins on duplicate emails
        by_email.entry(user.user_email.as_str()).or_insert(user);
    }

    installs
        .iter()
        .map(|install| {
            let user = by_email.get(install.user_email.as_str());
            EnrichedInstall {
                device_id: install.device_id.clone(),
                user_email: install.user_email.clone(),
                software: install.software.clone(),
                install_date: install.install_date,
                last_used_date: install.last_used_date,
                status: user.map(|u| u.status).unwrap_or(UserStatus::Unknown),
                department: user
                    .and_then(|u| u.department.clone())
                    .unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string()),
            }
        })
        .collect()
}

/// Index licenses by software, keeping the first row per product.
pub fn license_index(licenses: &[LicenseRecord]) -> HashMap<&str, &LicenseRecord> {
    let mut index: HashMap<&str, &LicenseRecord> = HashMap::with_capacity(licenses.len());
    for license in licenses {
        index.entry(license.software.as_str()).or_insert(license);
    }
    index
}

/// Enriched installations LEFT JOIN Licenses on `software`, carrying the
/// unit cost and subscription flag. Unmatched software keeps cost 0.
pub fn join_installs_with_costs(
    enriched: &[EnrichedInstall],
    licenses: &[LicenseRecord],
) -> Vec<CostedInstall> {
    let index = license_index(licenses);
    enriched
        .iter()
        .map(|row| {
            let license = index.get(row.software.as_str());
            CostedInstall {
                install: row.clone(),
                unit_cost_usd: license.map(|l| l.unit_cost_usd).unwrap_or(0.0),
                subscription: license.map(|l| l.is_subscription()).unwrap_or(false),
            }
        })
        .collect()
}
