use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::warn;

use crate::ingest::IngestError;
use crate::model::{InstallRecord, LicenseRecord, UserRecord, UserStatus, VendorRecord};
use crate::snapshot::{PortfolioSnapshot, SchemaCapabilities};

pub const LICENSES_FILE: &str = "licenses.csv";
pub const INSTALLS_FILE: &str = "installations.csv";
pub const USERS_FILE: &str = "users.csv";
pub const VENDORS_FILE: &str = "vendors.csv";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Load the portfolio snapshot from a directory of CSV files. Missing
/// optional columns degrade to warnings and disabled capabilities; an empty
/// (or absent) required table is fatal.
pub fn load_portfolio(dir: &Path) -> Result<PortfolioSnapshot, IngestError> {
    let mut warnings = Vec::new();

    let licenses_table = read_table(&dir.join(LICENSES_FILE))?;
    let installs_table = read_table(&dir.join(INSTALLS_FILE))?;
    let users_table = read_table(&dir.join(USERS_FILE))?;
    let vendors_table = read_table(&dir.join(VENDORS_FILE))?;

    check_columns(
        &licenses_table,
        LICENSES_FILE,
        &[
            "software",
            "vendor",
            "license_type",
            "unit_cost_usd",
            "seats_purchased",
            "contract_end",
        ],
        &mut warnings,
    );
    check_columns(
        &installs_table,
        INSTALLS_FILE,
        &["device_id", "user_email", "software", "last_used_date"],
        &mut warnings,
    );
    check_columns(&users_table, USERS_FILE, &["user_email", "status"], &mut warnings);
    if !vendors_table.rows.is_empty() && !vendors_table.has_column("vendor") {
        warnings.push(format!(
            "{VENDORS_FILE} is missing 'vendor' column; vendor notice windows will not be used"
        ));
    }

    let capabilities = SchemaCapabilities {
        has_department: users_table.has_column("department"),
        has_country: users_table.has_column("country"),
        has_vendor_table: vendors_table.has_column("vendor") && !vendors_table.rows.is_empty(),
        has_install_date: installs_table.has_column("install_date"),
        has_last_used: installs_table.has_column("last_used_date"),
        has_contract_end: licenses_table.has_column("contract_end"),
        has_license_type: licenses_table.has_column("license_type"),
        has_unit_cost: licenses_table.has_column("unit_cost_usd"),
    };

    let licenses = parse_licenses(&licenses_table);
    let installs = parse_installs(&installs_table);
    let users = parse_users(&users_table);
    let vendors = if capabilities.has_vendor_table {
        parse_vendors(&vendors_table)
    } else {
        Vec::new()
    };

    for warning in &warnings {
        warn!("{warning}");
    }

    let snapshot = PortfolioSnapshot::with_capabilities(
        licenses,
        installs,
        users,
        vendors,
        capabilities,
        warnings,
    );
    snapshot.ensure_non_empty()?;
    Ok(snapshot)
}

/// A raw CSV table: header index plus rows. Files that do not exist read as
/// empty tables; whether that is fatal depends on the table.
struct RawTable {
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    fn empty() -> Self {
        Self {
            columns: HashMap::new(),
            rows: Vec::new(),
        }
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    fn field<'a>(&self, record: &'a StringRecord, name: &str) -> Option<&'a str> {
        let idx = *self.columns.get(name)?;
        let value = record.get(idx)?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("nan") {
            None
        } else {
            Some(value)
        }
    }
}

fn read_table(path: &Path) -> Result<RawTable, IngestError> {
    let mut reader = match ::csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(err) => {
            if let ::csv::ErrorKind::Io(io_err) = err.kind() {
                if io_err.kind() == io::ErrorKind::NotFound {
                    return Ok(RawTable::empty());
                }
            }
            return Err(IngestError::Csv {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    let headers = reader.headers().map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record);
    }
    Ok(RawTable { columns, rows })
}

fn check_columns(
    table: &RawTable,
    file: &str,
    expected: &[&str],
    warnings: &mut Vec<String>,
) {
    if table.rows.is_empty() && table.columns.is_empty() {
        return;
    }
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        warnings.push(format!(
            "{file} is missing columns: {}. Some features may be disabled.",
            missing.join(", ")
        ));
    }
}

fn parse_licenses(table: &RawTable) -> Vec<LicenseRecord> {
    table
        .rows
        .iter()
        .filter_map(|record| {
            let software = table.field(record, "software")?.to_string();
            Some(LicenseRecord {
                software,
                vendor: table.field(record, "vendor").map(str::to_string),
                license_type: table.field(record, "license_type").map(str::to_string),
                unit_cost_usd: parse_cost(table.field(record, "unit_cost_usd")),
                seats_purchased: parse_count(table.field(record, "seats_purchased")),
                contract_start: parse_date(table.field(record, "contract_start")),
                contract_end: parse_date(table.field(record, "contract_end")),
                license_key: table.field(record, "license_key").map(str::to_string),
            })
        })
        .collect()
}

fn parse_installs(table: &RawTable) -> Vec<InstallRecord> {
    table
        .rows
        .iter()
        .filter_map(|record| {
            Some(InstallRecord {
                device_id: table.field(record, "device_id")?.to_string(),
                user_email: table.field(record, "user_email")?.to_string(),
                software: table.field(record, "software")?.to_string(),
                install_date: parse_date(table.field(record, "install_date")),
                last_used_date: parse_date(table.field(record, "last_used_date")),
            })
        })
        .collect()
}

fn parse_users(table: &RawTable) -> Vec<UserRecord> {
    table
        .rows
        .iter()
        .filter_map(|record| {
            Some(UserRecord {
                user_email: table.field(record, "user_email")?.to_string(),
                status: table
                    .field(record, "status")
                    .map(UserStatus::parse_lenient)
                    .unwrap_or(UserStatus::Unknown),
                department: table.field(record, "department").map(str::to_string),
                country: table.field(record, "country").map(str::to_string),
            })
        })
        .collect()
}

fn parse_vendors(table: &RawTable) -> Vec<VendorRecord> {
    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .filter_map(|record| {
            let vendor = table.field(record, "vendor")?.to_string();
            if !seen.insert(vendor.clone()) {
                return None;
            }
            Some(VendorRecord {
                renewal_notice_days: table
                    .field(record, "renewal_notice_days")
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(30),
                vendor,
            })
        })
        .collect()
}

fn parse_cost(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.replace(',', "").replace('$', "").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0))
        .unwrap_or(0.0)
}

fn parse_count(raw: Option<&str>) -> u32 {
    raw.and_then(|v| {
        v.parse::<u32>()
            .ok()
            .or_else(|| v.parse::<f64>().ok().map(|f| f.max(0.0) as u32))
    })
    .unwrap_or(0)
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_dir(files: &[(&str, &str)]) -> PathBuf {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "seatwise-ingest-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
        dir
    }

    const LICENSES: &str = "software,vendor,license_type,unit_cost_usd,seats_purchased,contract_start,contract_end,license_key\n\
Zoom Pro,Zoom,subscription,12,50,2025-01-15,2026-01-14,KEY-0001\n\
SAP S/4HANA,SAP,perpetual,2500,10,2024-07-01,,KEY-0002\n";
    const INSTALLS: &str = "device_id,user_email,software,install_date,last_used_date\n\
LAP-1001,ana@acme.com,Zoom Pro,2025-02-01,2025-05-20\n\
LAP-1002,bob@acme.com,Zoom Pro,2025-02-01,\n";
    const USERS: &str = "user_email,status,department,country\n\
ana@acme.com,active,Engineering,US\n\
bob@acme.com,terminated,Sales,US\n";

    #[test]
    fn loads_a_complete_portfolio() {
        let dir = write_dir(&[
            (LICENSES_FILE, LICENSES),
            (INSTALLS_FILE, INSTALLS),
            (USERS_FILE, USERS),
            (VENDORS_FILE, "vendor,renewal_notice_days\nZoom,45\nSAP,\n"),
        ]);
        let snapshot = load_portfolio(&dir).unwrap();
        assert_eq!(snapshot.licenses.len(), 2);
        assert_eq!(snapshot.installs.len(), 2);
        assert_eq!(snapshot.users.len(), 2);
        assert!(snapshot.capabilities.has_vendor_table);
        assert!(snapshot.capabilities.has_department);
        assert!(snapshot.warnings.is_empty());

        let zoom = snapshot.license_for("Zoom Pro").unwrap();
        assert_eq!(zoom.seats_purchased, 50);
        assert!((zoom.unit_cost_usd - 12.0).abs() < 1e-9);
        assert_eq!(
            zoom.contract_end,
            NaiveDate::from_ymd_opt(2026, 1, 14)
        );
        // SAP has no contract_end; a blank notice value falls back to 30
        assert!(snapshot.license_for("SAP S/4HANA").unwrap().contract_end.is_none());
        let sap_vendor = snapshot.vendors.iter().find(|v| v.vendor == "SAP").unwrap();
        assert_eq!(sap_vendor.renewal_notice_days, 30);
        // blank last_used_date coerces to None
        assert!(snapshot.installs[1].last_used_date.is_none());
        assert_eq!(snapshot.users[1].status, UserStatus::Terminated);
    }

    #[test]
    fn empty_required_table_is_fatal() {
        let dir = write_dir(&[
            (LICENSES_FILE, LICENSES),
            (INSTALLS_FILE, "device_id,user_email,software\n"),
            (USERS_FILE, USERS),
        ]);
        let err = load_portfolio(&dir).unwrap_err();
        assert!(matches!(err, IngestError::EmptyTable("installations")));
    }

    #[test]
    fn missing_optional_columns_warn_and_disable_capabilities() {
        let dir = write_dir(&[
            (
                LICENSES_FILE,
                "software,seats_purchased\nZoom Pro,50\n",
            ),
            (INSTALLS_FILE, INSTALLS),
            (USERS_FILE, "user_email,status\nana@acme.com,active\n"),
        ]);
        let snapshot = load_portfolio(&dir).unwrap();
        assert!(!snapshot.capabilities.has_department);
        assert!(!snapshot.capabilities.has_license_type);
        assert!(!snapshot.capabilities.has_unit_cost);
        assert!(!snapshot.capabilities.has_vendor_table);
        assert!(snapshot
            .warnings
            .iter()
            .any(|w| w.contains("licenses.csv") && w.contains("license_type")));
        assert_eq!(snapshot.licenses[0].unit_cost_usd, 0.0);
    }

    #[test]
    fn malformed_values_coerce_to_safe_defaults() {
        let dir = write_dir(&[
            (
                LICENSES_FILE,
                "software,vendor,license_type,unit_cost_usd,seats_purchased,contract_end\n\
Zoom Pro,Zoom,subscription,\"1,200\",not-a-number,someday\n",
            ),
            (INSTALLS_FILE, INSTALLS),
            (USERS_FILE, USERS),
        ]);
        let snapshot = load_portfolio(&dir).unwrap();
        let zoom = &snapshot.licenses[0];
        assert!((zoom.unit_cost_usd - 1200.0).abs() < 1e-9);
        assert_eq!(zoom.seats_purchased, 0);
        assert!(zoom.contract_end.is_none());
    }
}
