use anyhow::Result;

use crate::engine::allocation::DepartmentRow;
use crate::engine::elp::ElpRow;
use crate::engine::optimize::InstallDetail;
use crate::engine::renewal::RenewalRow;
use crate::engine::scenario::ScenarioPlan;
use crate::output::{fmt_date, fmt_days_remaining};

pub fn elp_to_csv(rows: &[ElpRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "software",
        "vendor",
        "license_type",
        "seats_purchased",
        "seats_used",
        "elp",
        "overage",
        "seats_unused",
        "unit_cost_usd",
        "potential_savings_usd",
        "contract_end",
        "contract_days_remaining",
        "renewal_due",
        "inactive_installs",
    ])?;
    for row in rows {
        writer.write_record([
            row.software.clone(),
            row.vendor.clone().unwrap_or_default(),
            row.license_type.clone().unwrap_or_default(),
            row.seats_purchased.to_string(),
            row.seats_used.to_string(),
            row.elp.to_string(),
            row.overage.to_string(),
            row.seats_unused.to_string(),
            format!("{:.2}", row.unit_cost_usd),
            format!("{:.2}", row.potential_savings_usd),
            fmt_date(row.contract_end),
            row.contract_days_remaining.to_string(),
            row.renewal_due.to_string(),
            row.inactive_installs.to_string(),
        ])?;
    }
    finish(writer)
}

pub fn installs_to_csv(rows: &[InstallDetail]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "user_email",
        "software",
        "device_id",
        "last_used_date",
        "status",
        "department",
    ])?;
    for row in rows {
        writer.write_record([
            row.user_email.clone(),
            row.software.clone(),
            row.device_id.clone(),
            fmt_date(row.last_used_date),
            row.status.to_string(),
            row.department.clone().unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn renewals_to_csv(rows: &[RenewalRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "software",
        "vendor",
        "license_type",
        "seats_purchased",
        "unit_cost_usd",
        "contract_end",
        "days_remaining",
        "renewal_notice_days",
        "in_notice_window",
        "expiring_30d",
        "annual_spend_proxy",
    ])?;
    for row in rows {
        writer.write_record([
            row.software.clone(),
            row.vendor.clone().unwrap_or_default(),
            row.license_type.clone().unwrap_or_default(),
            row.seats_purchased.to_string(),
            format!("{:.2}", row.unit_cost_usd),
            fmt_date(row.contract_end),
            row.days_remaining.to_string(),
            row.renewal_notice_days.to_string(),
            row.in_notice_window.to_string(),
            row.expiring_soon.to_string(),
            format!("{:.2}", row.annual_spend_proxy),
        ])?;
    }
    finish(writer)
}

/// Renewal schedule mapped to ServiceNow CMDB import fields. Adjust the
/// mapping for the target instance schema (cmdb_ci, alm_license,
/// software_model).
pub fn renewals_to_servicenow_csv(rows: &[RenewalRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "name",
        "manufacturer",
        "license_metric",
        "cost",
        "quantity",
        "expiration_date",
        "days_until_expiration",
        "requires_action",
    ])?;
    for row in rows {
        writer.write_record([
            row.software.clone(),
            row.vendor.clone().unwrap_or_default(),
            row.license_type.clone().unwrap_or_default(),
            format!("{:.2}", row.unit_cost_usd),
            row.seats_purchased.to_string(),
            fmt_date(row.contract_end),
            fmt_days_remaining(row.days_remaining),
            row.expiring_soon.to_string(),
        ])?;
    }
    finish(writer)
}

pub fn departments_to_csv(rows: &[DepartmentRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "department",
        "used_seats",
        "terminated_seats",
        "total_installs",
        "reclaimable_savings",
        "share_of_spend",
        "share_%",
    ])?;
    for row in rows {
        writer.write_record([
            row.department.clone(),
            row.used_seats.to_string(),
            row.terminated_seats.to_string(),
            row.total_installs.to_string(),
            format!("{:.2}", row.reclaimable_savings_usd),
            format!("{:.2}", row.share_of_spend_usd),
            format!("{:.1}", row.share_percent),
        ])?;
    }
    finish(writer)
}

/// Single-row scenario summary, shaped for sharing with stakeholders.
pub fn scenario_summary_csv(plan: &ScenarioPlan) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "product",
        "license_type",
        "current_seats",
        "reduction",
        "new_seats",
        "active_users",
        "projected_savings",
        "projected_overage",
    ])?;
    writer.write_record([
        plan.software.clone(),
        plan.license_type.clone().unwrap_or_default(),
        plan.seats_purchased.to_string(),
        plan.reduce_seats.to_string(),
        plan.new_seat_count.to_string(),
        plan.active_count.to_string(),
        format!("{:.2}", plan.projected_savings_usd),
        plan.projected_overage.to_string(),
    ])?;
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
