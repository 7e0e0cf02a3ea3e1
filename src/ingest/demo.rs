use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};

use crate::ingest::csv::{INSTALLS_FILE, LICENSES_FILE, USERS_FILE, VENDORS_FILE};
use crate::model::{InstallRecord, LicenseRecord, UserRecord, UserStatus, VendorRecord};
use crate::snapshot::PortfolioSnapshot;

const FIRST_NAMES: [&str; 25] = [
    "ana", "bob", "carla", "dev", "elena", "felix", "grace", "hugo", "iris", "jon", "kira",
    "liam", "maya", "nils", "olga", "pete", "quinn", "rosa", "sam", "tara", "uma", "viktor",
    "wren", "ximena", "yuri",
];

const DEPARTMENTS: [&str; 7] = [
    "Engineering",
    "Sales",
    "Marketing",
    "Finance",
    "Support",
    "Design",
    "Data",
];

/// Deterministic sample portfolio for demos and tests: five products
/// (including a near-expiry subscription and a perpetual license), fifty
/// users across seven departments, and partial-utilization installs with a
/// spread of staleness. No randomness; the same `today` always produces the
/// same snapshot.
pub fn sample_portfolio(today: NaiveDate) -> PortfolioSnapshot {
    let users: Vec<UserRecord> = (0..50)
        .map(|idx| {
            let name = FIRST_NAMES[idx % FIRST_NAMES.len()];
            let email = if idx < FIRST_NAMES.len() {
                format!("{name}@acme.com")
            } else {
                format!("{name}2@acme.com")
            };
            let status = if idx % 7 == 3 {
                UserStatus::Terminated
            } else {
                UserStatus::Active
            };
            UserRecord {
                user_email: email,
                status,
                department: Some(DEPARTMENTS[idx % DEPARTMENTS.len()].to_string()),
                country: Some("US".to_string()),
            }
        })
        .collect();

    // (software, vendor, type, unit cost, seats, days until contract end,
    //  install ratio in tenths)
    let products: [(&str, &str, &str, f64, u32, u64, u32); 5] = [
        ("Microsoft 365 E3", "Microsoft", "subscription", 36.0, 100, 45, 6),
        ("Visio Plan 2", "Microsoft", "subscription", 15.0, 25, 200, 5),
        ("SAP S/4HANA", "SAP", "perpetual", 2500.0, 10, 1400, 8),
        ("Tableau Creator", "Salesforce", "subscription", 70.0, 12, 8, 9),
        ("Zoom Pro", "Zoom", "subscription", 12.0, 50, 25, 7),
    ];

    let licenses: Vec<LicenseRecord> = products
        .iter()
        .enumerate()
        .map(|(idx, (software, vendor, license_type, cost, seats, end_days, _))| LicenseRecord {
            software: software.to_string(),
            vendor: Some(vendor.to_string()),
            license_type: Some(license_type.to_string()),
            unit_cost_usd: *cost,
            seats_purchased: *seats,
            contract_start: today.checked_sub_days(Days::new(120)),
            contract_end: today.checked_add_days(Days::new(*end_days)),
            license_key: Some(format!("KEY-{idx:04}")),
        })
        .collect();

    let mut installs = Vec::new();
    let mut device_seq = 1000u32;
    for (product_idx, (software, _, _, _, seats, _, ratio_tenths)) in products.iter().enumerate() {
        let install_count = (seats * ratio_tenths) / 10;
        for i in 0..install_count {
            let user = &users[((i as usize) * 7 + product_idx * 3) % users.len()];
            let staleness = (u64::from(i) * 13 + product_idx as u64 * 29) % 200;
            let last_used = if (i as usize + product_idx) % 11 == 0 {
                None
            } else {
                today.checked_sub_days(Days::new(staleness))
            };
            installs.push(InstallRecord {
                device_id: format!("LAP-{device_seq}"),
                user_email: user.user_email.clone(),
                software: software.to_string(),
                install_date: today.checked_sub_days(Days::new(staleness + 90)),
                last_used_date: last_used,
            });
            device_seq += 1;
        }
    }

    let vendors = vec![
        VendorRecord {
            vendor: "Microsoft".to_string(),
            renewal_notice_days: 60,
        },
        VendorRecord {
            vendor: "SAP".to_string(),
            renewal_notice_days: 90,
        },
        VendorRecord {
            vendor: "Salesforce".to_string(),
            renewal_notice_days: 45,
        },
        VendorRecord {
            vendor: "Zoom".to_string(),
            renewal_notice_days: 30,
        },
    ];

    PortfolioSnapshot::new(licenses, installs, users, vendors)
}

/// Write the sample portfolio as the four CSV input files.
pub fn write_demo_csvs(dir: &Path, snapshot: &PortfolioSnapshot) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed creating demo data directory: {}", dir.display()))?;

    write_csv(&dir.join(LICENSES_FILE), &snapshot.licenses)?;
    write_csv(&dir.join(INSTALLS_FILE), &snapshot.installs)?;
    write_csv(&dir.join(USERS_FILE), &snapshot.users)?;
    write_csv(&dir.join(VENDORS_FILE), &snapshot.vendors)?;
    Ok(())
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn sample_is_deterministic() {
        let a = sample_portfolio(today());
        let b = sample_portfolio(today());
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn sample_covers_every_analytic_path() {
        let snapshot = sample_portfolio(today());
        snapshot.ensure_non_empty().unwrap();
        assert_eq!(snapshot.licenses.len(), 5);
        assert_eq!(snapshot.users.len(), 50);
        assert!(snapshot.capabilities.has_department);
        assert!(snapshot.capabilities.has_vendor_table);
        // terminated users exist so reclaim tables are non-trivial
        assert!(snapshot
            .users
            .iter()
            .any(|u| u.status == UserStatus::Terminated));
        // at least one install has no usage history
        assert!(snapshot.installs.iter().any(|i| i.last_used_date.is_none()));
        // the Tableau contract is inside the urgent window
        let tableau = snapshot.license_for("Tableau Creator").unwrap();
        assert_eq!(tableau.contract_days_remaining(today()), 8);
    }

    #[test]
    fn demo_csvs_round_trip_through_the_loader() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "seatwise-demo-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));

        let snapshot = sample_portfolio(today());
        write_demo_csvs(&dir, &snapshot).unwrap();
        let loaded = crate::ingest::csv::load_portfolio(&dir).unwrap();
        assert_eq!(loaded.licenses.len(), snapshot.licenses.len());
        assert_eq!(loaded.installs.len(), snapshot.installs.len());
        assert_eq!(loaded.users.len(), snapshot.users.len());
        assert_eq!(loaded.vendors.len(), snapshot.vendors.len());
        assert!(loaded.warnings.is_empty());
    }
}
