use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::alert::engine::AlertEvent;
use crate::engine::allocation::{DepartmentDetail, DepartmentRow};
use crate::engine::elp::ElpRow;
use crate::engine::filter::PortfolioOverview;
use crate::engine::optimize::{InstallDetail, ProductDrilldown};
use crate::engine::renewal::RenewalRow;
use crate::engine::scenario::ScenarioPlan;
use crate::output::{fmt_date, fmt_days_remaining, fmt_usd};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_elp_table(rows: &[ElpRow]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Software",
        "Vendor",
        "Type",
        "Purchased",
        "Used",
        "ELP",
        "Overage",
        "Unused",
        "Unit Cost",
        "Savings",
        "Contract End",
        "Days Left",
        "Renewal Due",
        "Inactive",
    ]);
    for r in rows {
        let overage_cell = if r.overage > 0 {
            Cell::new(r.overage).fg(Color::Red)
        } else {
            Cell::new(r.overage)
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.software),
            Cell::new(r.vendor.as_deref().unwrap_or("-")),
            Cell::new(r.license_type.as_deref().unwrap_or("-")),
            Cell::new(r.seats_purchased),
            Cell::new(r.seats_used),
            Cell::new(r.elp),
            overage_cell,
            Cell::new(r.seats_unused),
            Cell::new(fmt_usd(r.unit_cost_usd)),
            Cell::new(fmt_usd(r.potential_savings_usd)),
            Cell::new(fmt_date(r.contract_end)),
            Cell::new(fmt_days_remaining(r.contract_days_remaining)),
            Cell::new(r.renewal_due),
            Cell::new(r.inactive_installs),
        ]));
    }
    table.to_string()
}

pub fn render_overview(overview: &PortfolioOverview) -> String {
    format!(
        "Vendors: {} | Products: {} | Total Seats: {} | Potential Savings: {}",
        overview.vendors,
        overview.products,
        overview.total_seats_purchased,
        fmt_usd(overview.total_potential_savings_usd)
    )
}

pub fn render_installs_table(rows: &[InstallDetail]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "User",
        "Software",
        "Device",
        "Last Used",
        "Status",
        "Department",
    ]);
    for r in rows {
        table.add_row(vec![
            r.user_email.clone(),
            r.software.clone(),
            r.device_id.clone(),
            fmt_date(r.last_used_date),
            r.status.to_string(),
            r.department.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn render_renewals_table(rows: &[RenewalRow]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Software",
        "Vendor",
        "Type",
        "Seats",
        "Unit Cost",
        "Contract End",
        "Days Left",
        "Notice Days",
        "In Notice Window",
        "Expiring Soon",
        "Annual Spend",
    ]);
    for r in rows {
        let days_cell = if r.expiring_soon {
            Cell::new(r.days_remaining_display).fg(Color::Red)
        } else if r.in_notice_window {
            Cell::new(r.days_remaining_display).fg(Color::Yellow)
        } else {
            Cell::new(fmt_days_remaining(r.days_remaining))
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.software),
            Cell::new(r.vendor.as_deref().unwrap_or("-")),
            Cell::new(r.license_type.as_deref().unwrap_or("-")),
            Cell::new(r.seats_purchased),
            Cell::new(fmt_usd(r.unit_cost_usd)),
            Cell::new(fmt_date(r.contract_end)),
            days_cell,
            Cell::new(r.renewal_notice_days),
            Cell::new(r.in_notice_window),
            Cell::new(r.expiring_soon),
            Cell::new(fmt_usd(r.annual_spend_proxy)),
        ]));
    }
    table.to_string()
}

pub fn render_departments_table(rows: &[DepartmentRow]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        "Department",
        "Used Seats",
        "Terminated Seats",
        "Installs",
        "Reclaimable",
        "Share of Spend",
        "Share %",
    ]);
    for r in rows {
        table.add_row(vec![
            r.department.clone(),
            r.used_seats.to_string(),
            r.terminated_seats.to_string(),
            r.total_installs.to_string(),
            fmt_usd(r.reclaimable_savings_usd),
            fmt_usd(r.share_of_spend_usd),
            format!("{:.1}%", r.share_percent),
        ]);
    }
    table.to_string()
}

pub fn render_department_detail(detail: &DepartmentDetail) -> String {
    let mut table = base_table();
    table.set_header(vec!["Software", "Active", "Terminated", "Unknown"]);
    for s in &detail.software_breakdown {
        table.add_row(vec![
            s.software.clone(),
            s.active.to_string(),
            s.terminated.to_string(),
            s.unknown.to_string(),
        ]);
    }
    let mut out = format!("Software usage by {}:\n{}", detail.department, table);
    if !detail.reclaim.is_empty() {
        out.push_str("\n\nReclaim opportunities:\n");
        out.push_str(&render_installs_table(&detail.reclaim));
    }
    out
}

pub fn render_scenario(plan: &ScenarioPlan) -> String {
    let mut out = format!(
        "Scenario: reduce {} by {} seat(s)\nSeats: {} -> {} | Active: {} | Remaining after removals: {} | Savings: {}\n",
        plan.software,
        plan.reduce_seats,
        plan.seats_purchased,
        plan.new_seat_count,
        plan.active_count,
        plan.remaining_active_users,
        fmt_usd(plan.projected_savings_usd),
    );
    if plan.projected_overage > 0 {
        out.push_str(&format!(
            "WARNING: this reduction would create an overage of {} seat(s).\n",
            plan.projected_overage
        ));
    }
    out.push('\n');
    out.push_str(&render_installs_table(&plan.removals));
    out
}

pub fn render_alerts_table(events: &[AlertEvent]) -> String {
    if events.is_empty() {
        return "No active alerts.".to_string();
    }
    let mut table = base_table();
    table.set_header(vec!["Priority", "Title", "Detail"]);
    for event in events {
        let priority_cell = match event.priority {
            1 => Cell::new(event.priority).fg(Color::Red),
            2 => Cell::new(event.priority).fg(Color::Yellow),
            _ => Cell::new(event.priority),
        };
        table.add_row(Row::from(vec![
            priority_cell,
            Cell::new(&event.title),
            Cell::new(&event.body),
        ]));
    }
    table.to_string()
}

pub fn render_drilldown(drilldown: &ProductDrilldown) -> String {
    let mut out = format!(
        "{} ({} | {})\nPurchased: {} | Active: {} | Unused: {} | Overage: {} | Unit Cost: {} | Potential Savings: {}\n",
        drilldown.software,
        drilldown.vendor.as_deref().unwrap_or("-"),
        drilldown.license_type.as_deref().unwrap_or("-"),
        drilldown.seats_purchased,
        drilldown.active_installs,
        drilldown.seats_unused,
        drilldown.overage,
        fmt_usd(drilldown.unit_cost_usd),
        fmt_usd(drilldown.potential_savings_usd),
    );

    out.push_str(&format!(
        "\nActive installs ({}):\n{}",
        drilldown.active.len(),
        render_installs_table(&drilldown.active)
    ));
    out.push_str(&format!(
        "\n\nTerminated users - reclaim now ({}, immediate savings {}):\n{}",
        drilldown.reclaim.len(),
        fmt_usd(drilldown.immediate_savings_usd),
        render_installs_table(&drilldown.reclaim)
    ));
    out.push_str(&format!(
        "\n\nLow usage ({}, optimization savings {}):\n{}",
        drilldown.low_usage.len(),
        fmt_usd(drilldown.low_usage_savings_usd),
        render_installs_table(&drilldown.low_usage)
    ));
    out
}
