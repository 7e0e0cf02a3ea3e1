use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ingest::IngestError;
use crate::model::{InstallRecord, LicenseRecord, UserRecord, VendorRecord};

/// Which optional columns/tables the loaded data actually carries. Computed
/// once at load time; downstream components query these flags instead of
/// re-probing rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SchemaCapabilities {
    pub has_department: bool,
    pub has_country: bool,
    pub has_vendor_table: bool,
    pub has_install_date: bool,
    pub has_last_used: bool,
    pub has_contract_end: bool,
    pub has_license_type: bool,
    pub has_unit_cost: bool,
}

impl SchemaCapabilities {
    /// Infer capabilities from in-memory records, for snapshots that were not
    /// built from CSV headers (demo data, tests).
    pub fn infer(
        licenses: &[LicenseRecord],
        installs: &[InstallRecord],
        users: &[UserRecord],
        vendors: &[VendorRecord],
    ) -> Self {
        Self {
            has_department: users.iter().any(|u| u.department.is_some()),
            has_country: users.iter().any(|u| u.country.is_some()),
            has_vendor_table: !vendors.is_empty(),
            has_install_date: installs.iter().any(|i| i.install_date.is_some()),
            has_last_used: installs.iter().any(|i| i.last_used_date.is_some()),
            has_contract_end: licenses.iter().any(|l| l.contract_end.is_some()),
            has_license_type: licenses.iter().any(|l| l.license_type.is_some()),
            has_unit_cost: licenses.iter().any(|l| l.unit_cost_usd > 0.0),
        }
    }
}

/// Immutable bundle of the input tables for one analytic run. Constructed
/// once, then passed by shared reference; the engine only derives new values
/// and never mutates the snapshot. Fresh data means a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub licenses: Vec<LicenseRecord>,
    pub installs: Vec<InstallRecord>,
    pub users: Vec<UserRecord>,
    pub vendors: Vec<VendorRecord>,
    pub capabilities: SchemaCapabilities,
    pub warnings: Vec<String>,
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn new(
        licenses: Vec<LicenseRecord>,
        installs: Vec<InstallRecord>,
        users: Vec<UserRecord>,
        vendors: Vec<VendorRecord>,
    ) -> Self {
        let capabilities = SchemaCapabilities::infer(&licenses, &installs, &users, &vendors);
        Self::with_capabilities(licenses, installs, users, vendors, capabilities, Vec::new())
    }

    pub fn with_capabilities(
        licenses: Vec<LicenseRecord>,
        installs: Vec<InstallRecord>,
        users: Vec<UserRecord>,
        vendors: Vec<VendorRecord>,
        capabilities: SchemaCapabilities,
        warnings: Vec<String>,
    ) -> Self {
        let fingerprint = fingerprint_tables(&licenses, &installs, &users, &vendors);
        Self {
            licenses,
            installs,
            users,
            vendors,
            capabilities,
            warnings,
            fingerprint,
            loaded_at: Utc::now(),
        }
    }

    /// The three required tables must be non-empty; an empty one is fatal to
    /// the whole run, never a partial result.
    pub fn ensure_non_empty(&self) -> Result<(), IngestError> {
        if self.licenses.is_empty() {
            return Err(IngestError::EmptyTable("licenses"));
        }
        if self.installs.is_empty() {
            return Err(IngestError::EmptyTable("installations"));
        }
        if self.users.is_empty() {
            return Err(IngestError::EmptyTable("users"));
        }
        Ok(())
    }

    /// First license row for a product; duplicate software rows resolve to
    /// the first match.
    pub fn license_for(&self, software: &str) -> Option<&LicenseRecord> {
        self.licenses.iter().find(|l| l.software == software)
    }

    /// Distinct product names from the license table, sorted.
    pub fn products(&self) -> Vec<String> {
        let mut names: Vec<String> = self.licenses.iter().map(|l| l.software.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

fn fingerprint_tables(
    licenses: &[LicenseRecord],
    installs: &[InstallRecord],
    users: &[UserRecord],
    vendors: &[VendorRecord],
) -> String {
    let mut hasher = Sha256::new();
    for table in [
        serde_json::to_string(licenses).unwrap_or_default(),
        serde_json::to_string(installs).unwrap_or_default(),
        serde_json::to_string(users).unwrap_or_default(),
        serde_json::to_string(vendors).unwrap_or_default(),
    ] {
        hasher.update(table.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
