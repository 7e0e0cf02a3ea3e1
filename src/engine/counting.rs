use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::engine::join::EnrichedInstall;

/// Strategy for what a "seat" is when counting utilization. Per-device
/// licenses charge every installed machine; per-user licenses must not
/// double-charge a user with several machines. Aggregators take the policy
/// as a parameter so the toggle applies to every derived count at once.
pub trait CountingPolicy: Send + Sync {
    fn seat_key<'a>(&self, row: &'a EnrichedInstall) -> &'a str;
}

pub struct ByDevice;

impl CountingPolicy for ByDevice {
    fn seat_key<'a>(&self, row: &'a EnrichedInstall) -> &'a str {
        &row.device_id
    }
}

pub struct ByUser;

impl CountingPolicy for ByUser {
    fn seat_key<'a>(&self, row: &'a EnrichedInstall) -> &'a str {
        &row.user_email
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    #[default]
    ByDevice,
    ByUser,
}

impl CountingMode {
    pub fn from_flag(count_by_user: bool) -> Self {
        if count_by_user {
            Self::ByUser
        } else {
            Self::ByDevice
        }
    }

    pub fn policy(self) -> &'static dyn CountingPolicy {
        match self {
            Self::ByDevice => &ByDevice,
            Self::ByUser => &ByUser,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ByDevice => "unique devices",
            Self::ByUser => "unique users",
        }
    }
}

/// Count distinct seat keys among `rows` under the given policy.
pub fn distinct_seats<'a, I>(rows: I, policy: &dyn CountingPolicy) -> u32
where
    I: IntoIterator<Item = &'a EnrichedInstall>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    for row in rows {
        seen.insert(policy.seat_key(row));
    }
    seen.len() as u32
}
