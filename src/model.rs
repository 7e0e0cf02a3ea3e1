use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days-remaining value assigned to contracts with no end date. Large enough
/// to clear every renewal window; "never expires" for all comparisons.
pub const NEVER_EXPIRES_DAYS: i64 = 999_999;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LicenseRecord {
    pub software: String,
    pub vendor: Option<String>,
    pub license_type: Option<String>,
    pub unit_cost_usd: f64,
    pub seats_purchased: u32,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub license_key: Option<String>,
}

impl LicenseRecord {
    pub fn new(software: impl Into<String>) -> Self {
        Self {
            software: software.into(),
            vendor: None,
            license_type: None,
            unit_cost_usd: 0.0,
            seats_purchased: 0,
            contract_start: None,
            contract_end: None,
            license_key: None,
        }
    }

    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = Some(vendor.to_string());
        self
    }

    pub fn with_license_type(mut self, license_type: &str) -> Self {
        self.license_type = Some(license_type.to_string());
        self
    }

    pub fn with_seats(mut self, seats_purchased: u32, unit_cost_usd: f64) -> Self {
        self.seats_purchased = seats_purchased;
        self.unit_cost_usd = unit_cost_usd;
        self
    }

    pub fn with_contract(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.contract_start = start;
        self.contract_end = end;
        self
    }

    /// Subscription classification is a case-insensitive substring match on
    /// the free-text license type; everything else is perpetual/other.
    pub fn is_subscription(&self) -> bool {
        self.license_type
            .as_deref()
            .map(|t| t.to_ascii_lowercase().contains("subscription"))
            .unwrap_or(false)
    }

    /// Days until contract end relative to `today`, negative once expired.
    /// Missing end dates never expire.
    pub fn contract_days_remaining(&self, today: NaiveDate) -> i64 {
        match self.contract_end {
            Some(end) => (end - today).num_days(),
            None => NEVER_EXPIRES_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallRecord {
    pub device_id: String,
    pub user_email: String,
    pub software: String,
    pub install_date: Option<NaiveDate>,
    pub last_used_date: Option<NaiveDate>,
}

impl InstallRecord {
    pub fn new(
        device_id: impl Into<String>,
        user_email: impl Into<String>,
        software: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            user_email: user_email.into(),
            software: software.into(),
            install_date: None,
            last_used_date: None,
        }
    }

    pub fn with_last_used(mut self, last_used_date: Option<NaiveDate>) -> Self {
        self.last_used_date = last_used_date;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_email: String,
    pub status: UserStatus,
    pub department: Option<String>,
    pub country: Option<String>,
}

impl UserRecord {
    pub fn new(user_email: impl Into<String>, status: UserStatus) -> Self {
        Self {
            user_email: user_email.into(),
            status,
            department: None,
            country: None,
        }
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorRecord {
    pub vendor: String,
    pub renewal_notice_days: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Terminated,
    Unknown,
}

impl UserStatus {
    /// Lenient parse: anything that is not a recognized status collapses to
    /// `Unknown` rather than failing the row.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "terminated" => Self::Terminated,
            _ => Self::Unknown,
        }
    }
}

impl Display for UserStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
#[error("unknown risk category: {0}")]
pub struct RiskCategoryParseError(pub String);

/// Risk buckets used by the ELP filter surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    #[default]
    All,
    OverUsed,
    ExpiringSoon,
    InactiveUsers,
}

impl Display for RiskCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::All => "All",
            Self::OverUsed => "Over-Used",
            Self::ExpiringSoon => "Expiring < 30d",
            Self::InactiveUsers => "Inactive Users Present",
        };
        write!(f, "{label}")
    }
}

impl FromStr for RiskCategory {
    type Err = RiskCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // accepts the display labels too ("Expiring < 30d")
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace(' ', "")
            .replace('<', "")
            .replace('_', "-");
        match normalized.as_str() {
            "all" => Ok(Self::All),
            "over-used" | "overused" | "overage" => Ok(Self::OverUsed),
            "expiring" | "expiring-soon" | "expiring-30d" | "expiring30d" => Ok(Self::ExpiringSoon),
            "inactive" | "inactive-users" | "inactiveusers" | "inactiveuserspresent" => {
                Ok(Self::InactiveUsers)
            }
            _ => Err(RiskCategoryParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_match_is_case_insensitive_substring() {
        let annual = LicenseRecord::new("Zoom Pro").with_license_type("Annual Subscription");
        assert!(annual.is_subscription());
        let perpetual = LicenseRecord::new("SAP S/4HANA").with_license_type("perpetual");
        assert!(!perpetual.is_subscription());
        let untyped = LicenseRecord::new("Unknown Tool");
        assert!(!untyped.is_subscription());
    }

    #[test]
    fn missing_contract_end_never_expires() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let license = LicenseRecord::new("Visio Plan 2");
        assert_eq!(license.contract_days_remaining(today), NEVER_EXPIRES_DAYS);

        let dated = LicenseRecord::new("Zoom Pro")
            .with_contract(None, NaiveDate::from_ymd_opt(2025, 6, 6));
        assert_eq!(dated.contract_days_remaining(today), 5);
    }

    #[test]
    fn lenient_status_parse_collapses_to_unknown() {
        assert_eq!(UserStatus::parse_lenient(" Active "), UserStatus::Active);
        assert_eq!(
            UserStatus::parse_lenient("terminated"),
            UserStatus::Terminated
        );
        assert_eq!(UserStatus::parse_lenient("on-leave"), UserStatus::Unknown);
        assert_eq!(UserStatus::parse_lenient(""), UserStatus::Unknown);
    }

    #[test]
    fn risk_category_parses_display_labels() {
        assert_eq!(
            "Over-Used".parse::<RiskCategory>().unwrap(),
            RiskCategory::OverUsed
        );
        assert_eq!(
            "expiring_30d".parse::<RiskCategory>().unwrap(),
            RiskCategory::ExpiringSoon
        );
        assert!("nonsense".parse::<RiskCategory>().is_err());
    }
}
