use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use seatwise::alert::engine::{apply_alert_rules, evaluate_alerts, AlertEvent};
use seatwise::alert::sink::{AlertSink, StdoutSink, WebhookSink};
use seatwise::config::{Config, ConfigOverrides};
use seatwise::engine::allocation::{allocate_departments, department_detail, DepartmentRow};
use seatwise::engine::filter::{portfolio_overview, ElpFilter};
use seatwise::engine::join::join_installs_with_costs;
use seatwise::engine::optimize::{
    low_usage_candidates, product_drilldown, reclaim_candidates, InstallDetail, ProductDrilldown,
};
use seatwise::engine::renewal::{
    build_renewal_schedule, renewal_alert_digest, RenewalFilter, RenewalRow,
};
use seatwise::engine::scenario::{plan_scenario, ScenarioPlan, ScenarioRequest};
use seatwise::engine::{elp_for_snapshot, enrich, CountingMode, ElpRow};
use seatwise::ingest::{cache, demo};
use seatwise::model::RiskCategory;
use seatwise::output::csv::{
    departments_to_csv, elp_to_csv, installs_to_csv, renewals_to_csv, renewals_to_servicenow_csv,
    scenario_summary_csv,
};
use seatwise::output::json::render_json;
use seatwise::output::table::{
    render_alerts_table, render_department_detail, render_departments_table, render_drilldown,
    render_elp_table, render_installs_table, render_overview, render_renewals_table,
    render_scenario,
};
use seatwise::server::run_server;
use seatwise::snapshot::PortfolioSnapshot;
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "seatwise",
    about = "License utilization analytics and seat optimization"
)]
struct Cli {
    /// Directory holding licenses.csv, installations.csv, users.csv and
    /// optionally vendors.csv
    #[arg(short, long)]
    data_dir: Option<String>,
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Count seats by distinct user instead of distinct device
    #[arg(long)]
    count_by_user: Option<bool>,
    /// Evaluation date (YYYY-MM-DD); defaults to the current UTC date
    #[arg(long)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Effective License Position across the portfolio
    Elp {
        /// Comma-separated vendor filter
        #[arg(long)]
        vendor: Option<String>,
        /// Risk filter: all, over-used, expiring-30d, inactive-users
        #[arg(long, default_value = "all")]
        risk: String,
        #[arg(long = "min-savings", default_value_t = 0.0)]
        min_savings: f64,
        #[arg(long = "subs-only")]
        subscriptions_only: bool,
    },
    /// Deep dive into one product
    Drilldown {
        #[arg(short, long)]
        product: String,
    },
    /// Portfolio-wide reclaim and low-usage install lists
    Optimizations,
    /// Contract expirations and vendor notice windows
    Renewals {
        #[arg(long = "max-days")]
        max_days: Option<i64>,
        #[arg(long = "subs-only")]
        subscriptions_only: bool,
        #[arg(long)]
        vendor: Option<String>,
        /// Emit the schedule mapped to ServiceNow import fields (csv output)
        #[arg(long)]
        servicenow: bool,
    },
    /// Cost allocation and reclaim opportunities by department
    Departments {
        /// Show the per-software breakdown for one department
        #[arg(long)]
        detail: Option<String>,
    },
    /// Model a seat reduction for one product
    Scenario {
        #[arg(short, long)]
        product: String,
        #[arg(short, long)]
        reduce: u32,
        /// Include terminated users in the removal candidate pool
        #[arg(long = "include-terminated")]
        include_terminated: bool,
    },
    /// Portfolio alert feed (top 3 by priority)
    Alerts {
        /// Dispatch the feed to configured sinks (stdout/webhook)
        #[arg(long)]
        notify: bool,
    },
    /// Write a deterministic sample portfolio as CSV input files
    Demo {
        #[arg(long, default_value = "data")]
        dir: PathBuf,
    },
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        count_by_user: cli.count_by_user,
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Demo { dir } = &cli.command {
        let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());
        let snapshot = demo::sample_portfolio(today);
        demo::write_demo_csvs(dir, &snapshot)?;
        println!(
            "Wrote sample portfolio ({} licenses, {} installs, {} users) to {}",
            snapshot.licenses.len(),
            snapshot.installs.len(),
            snapshot.users.len(),
            dir.display()
        );
        return Ok(());
    }
    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());
    let mode = config.counting_mode();
    let snapshot = cache::load_cached(&config.resolved_data_dir(), config.data.cache_ttl_secs)?;

    match &cli.command {
        Commands::Elp {
            vendor,
            risk,
            min_savings,
            subscriptions_only,
        } => {
            let filter = ElpFilter {
                vendors: parse_vendor_list(vendor.as_deref()),
                risk: RiskCategory::from_str(risk)?,
                min_savings_usd: *min_savings,
                subscriptions_only: *subscriptions_only,
            };
            let rows = elp_for_snapshot(&snapshot, mode, today, &config.analysis);
            let rows = filter.apply(&rows);
            print_elp(&rows, mode, cli.output)?;
        }
        Commands::Drilldown { product } => {
            let enriched = enrich(&snapshot);
            let drilldown = product_drilldown(
                &snapshot.licenses,
                &enriched,
                product,
                mode.policy(),
                today,
                config.analysis.low_usage_days,
                snapshot.capabilities.has_department,
            )?;
            print_drilldown(&drilldown, cli.output)?;
        }
        Commands::Optimizations => {
            let enriched = enrich(&snapshot);
            let has_department = snapshot.capabilities.has_department;
            let reclaim = reclaim_candidates(&enriched, has_department);
            let low_usage = low_usage_candidates(
                &enriched,
                today,
                config.analysis.low_usage_days,
                has_department,
            );
            print_optimizations(&reclaim, &low_usage, cli.output)?;
        }
        Commands::Renewals {
            max_days,
            subscriptions_only,
            vendor,
            servicenow,
        } => {
            let rows = build_renewal_schedule(
                &snapshot.licenses,
                &snapshot.vendors,
                today,
                config.analysis.default_notice_days,
                config.analysis.renewal_window_days,
            );
            let filter = RenewalFilter {
                vendors: parse_vendor_list(vendor.as_deref()),
                subscriptions_only: *subscriptions_only,
                max_days: *max_days,
            };
            let rows = filter.apply(&rows);
            if *servicenow {
                println!("{}", renewals_to_servicenow_csv(&rows)?);
            } else {
                print_renewals(&rows, cli.output)?;
            }
        }
        Commands::Departments { detail } => {
            if !snapshot.capabilities.has_department {
                warn!("users table has no 'department' column; grouping everything under Unknown");
            }
            let enriched = enrich(&snapshot);
            let costed = join_installs_with_costs(&enriched, &snapshot.licenses);
            let rows = allocate_departments(&costed, &snapshot.licenses, mode.policy());
            print_departments(&rows, cli.output)?;
            if let Some(dept) = detail {
                let detail = department_detail(&costed, dept, mode.policy());
                match cli.output {
                    OutputFormat::Table => println!("{}", render_department_detail(&detail)),
                    OutputFormat::Json => println!("{}", render_json(&detail)?),
                    OutputFormat::Csv => println!("{}", installs_to_csv(&detail.reclaim)?),
                }
            }
        }
        Commands::Scenario {
            product,
            reduce,
            include_terminated,
        } => {
            let enriched = enrich(&snapshot);
            let request = ScenarioRequest {
                software: product.clone(),
                reduce_seats: *reduce,
                exclude_terminated: !*include_terminated,
            };
            let plan = plan_scenario(
                &snapshot.licenses,
                &enriched,
                &request,
                mode.policy(),
                snapshot.capabilities.has_department,
            )?;
            print_scenario(&plan, cli.output)?;
        }
        Commands::Alerts { notify } => {
            let rows = elp_for_snapshot(&snapshot, mode, today, &config.analysis);
            let events = apply_alert_rules(
                evaluate_alerts(&rows, &config.analysis),
                &config.alerts.rules,
            );
            print_alerts(&events, cli.output)?;
            if *notify {
                dispatch_alerts(&events, &config).await;
            }
        }
        Commands::Demo { .. } | Commands::Serve { .. } | Commands::Config { .. } => {
            unreachable!("handled before dispatch")
        }
    }

    report_warnings(&snapshot);
    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn parse_vendor_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn report_warnings(snapshot: &PortfolioSnapshot) {
    for warning in &snapshot.warnings {
        warn!("{warning}");
    }
}

async fn dispatch_alerts(events: &[AlertEvent], config: &Config) {
    let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();
    if config.alerts.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !config.alerts.webhook_url.trim().is_empty() {
        match WebhookSink::new(config.alerts.webhook_url.clone()) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => warn!("failed building webhook sink: {err}"),
        }
    }
    for event in events {
        for sink in &sinks {
            if let Err(err) = sink.send(event).await {
                warn!("failed sending alert: {err}");
            }
        }
    }
}

fn print_elp(rows: &[ElpRow], mode: CountingMode, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_overview(&portfolio_overview(rows)));
            println!("{}", render_elp_table(rows));
            println!("Active seats counted by: {}", mode.label());
        }
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => println!("{}", elp_to_csv(rows)?),
    }
    Ok(())
}

fn print_drilldown(drilldown: &ProductDrilldown, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_drilldown(drilldown)),
        OutputFormat::Json => println!("{}", render_json(drilldown)?),
        OutputFormat::Csv => {
            // the reclaim list is the actionable export
            println!("{}", installs_to_csv(&drilldown.reclaim)?);
        }
    }
    Ok(())
}

fn print_optimizations(
    reclaim: &[InstallDetail],
    low_usage: &[InstallDetail],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!(
                "Inactive users still holding installs ({}):\n{}",
                reclaim.len(),
                render_installs_table(reclaim)
            );
            println!(
                "\nLow-usage installs ({}):\n{}",
                low_usage.len(),
                render_installs_table(low_usage)
            );
        }
        OutputFormat::Json => {
            println!(
                "{}",
                render_json(&serde_json::json!({
                    "reclaim": reclaim,
                    "low_usage": low_usage,
                }))?
            );
        }
        OutputFormat::Csv => {
            println!("{}", installs_to_csv(reclaim)?);
            println!("{}", installs_to_csv(low_usage)?);
        }
    }
    Ok(())
}

fn print_renewals(rows: &[RenewalRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_renewals_table(rows));
            if let Some(digest) = renewal_alert_digest(rows) {
                println!("{digest}");
            }
        }
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => println!("{}", renewals_to_csv(rows)?),
    }
    Ok(())
}

fn print_departments(rows: &[DepartmentRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_departments_table(rows)),
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => println!("{}", departments_to_csv(rows)?),
    }
    Ok(())
}

fn print_scenario(plan: &ScenarioPlan, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_scenario(plan)),
        OutputFormat::Json => println!("{}", render_json(plan)?),
        OutputFormat::Csv => {
            println!("{}", installs_to_csv(&plan.removals)?);
            println!("{}", scenario_summary_csv(plan)?);
        }
    }
    Ok(())
}

fn print_alerts(events: &[AlertEvent], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_alerts_table(events)),
        OutputFormat::Json => println!("{}", render_json(events)?),
        OutputFormat::Csv => {
            warn!("CSV output for alerts not implemented, using JSON");
            println!("{}", render_json(events)?);
        }
    }
    Ok(())
}
