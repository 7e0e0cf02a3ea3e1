pub mod allocation;
pub mod counting;
pub mod elp;
pub mod filter;
pub mod join;
pub mod optimize;
pub mod renewal;
pub mod scenario;
pub mod usage;

use chrono::NaiveDate;

pub use counting::{CountingMode, CountingPolicy};
pub use elp::ElpRow;
pub use join::{CostedInstall, EnrichedInstall};

use crate::config::AnalysisConfig;
use crate::snapshot::PortfolioSnapshot;

/// Installations joined with user status/department for one snapshot.
pub fn enrich(snapshot: &PortfolioSnapshot) -> Vec<EnrichedInstall> {
    join::join_installs_with_users(&snapshot.installs, &snapshot.users)
}

/// The full ELP table for one snapshot under a counting mode and a fixed
/// evaluation date.
pub fn elp_for_snapshot(
    snapshot: &PortfolioSnapshot,
    mode: CountingMode,
    today: NaiveDate,
    analysis: &AnalysisConfig,
) -> Vec<ElpRow> {
    let enriched = enrich(snapshot);
    let usage = usage_for(&enriched, mode);
    elp::compute_elp(
        &snapshot.licenses,
        &usage,
        today,
        analysis.renewal_window_days,
    )
}

fn usage_for(enriched: &[EnrichedInstall], mode: CountingMode) -> Vec<usage::ProductUsage> {
    usage::aggregate_usage(enriched, mode.policy())
}
