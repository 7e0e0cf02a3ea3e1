use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;

use crate::ingest::{csv, IngestError};
use crate::snapshot::PortfolioSnapshot;

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub cached_at: DateTime<Utc>,
    pub snapshot: Arc<PortfolioSnapshot>,
}

static SNAPSHOT_CACHE: Lazy<Mutex<HashMap<PathBuf, CachedSnapshot>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn put(dir: &Path, snapshot: Arc<PortfolioSnapshot>) {
    let value = CachedSnapshot {
        cached_at: Utc::now(),
        snapshot,
    };
    let mut guard = SNAPSHOT_CACHE.lock().expect("snapshot cache mutex poisoned");
    guard.insert(dir.to_path_buf(), value);
}

pub fn get(dir: &Path, ttl_secs: u64) -> Option<Arc<PortfolioSnapshot>> {
    let guard = SNAPSHOT_CACHE.lock().expect("snapshot cache mutex poisoned");
    let cached = guard.get(dir)?;
    let age = Utc::now() - cached.cached_at;
    if age > Duration::seconds(ttl_secs as i64) {
        return None;
    }
    Some(cached.snapshot.clone())
}

/// Fetch the snapshot for a data directory, reloading from disk once the
/// cached copy ages out. The cached snapshot is shared read-only; a reload
/// builds a fresh snapshot rather than patching the old one.
pub fn load_cached(dir: &Path, ttl_secs: u64) -> Result<Arc<PortfolioSnapshot>, IngestError> {
    if let Some(snapshot) = get(dir, ttl_secs) {
        return Ok(snapshot);
    }
    let snapshot = Arc::new(csv::load_portfolio(dir)?);
    put(dir, snapshot.clone());
    Ok(snapshot)
}
