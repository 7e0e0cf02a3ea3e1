use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::counting::CountingMode;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CountingConfig {
    /// When true, seats count distinct users (per-user licensing); when
    /// false, distinct devices. One global toggle for every derived count.
    #[serde(default)]
    pub by_user: bool,
}

/// Analysis thresholds. Deployments can tune the windows without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_renewal_window_days")]
    pub renewal_window_days: i64,
    #[serde(default = "default_urgent_window_days")]
    pub urgent_window_days: i64,
    #[serde(default = "default_low_usage_days")]
    pub low_usage_days: u64,
    #[serde(default = "default_high_savings_alert_usd")]
    pub high_savings_alert_usd: f64,
    #[serde(default = "default_notice_days")]
    pub default_notice_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub urgent_expiry: bool,
    #[serde(default = "default_true")]
    pub compliance_overage: bool,
    #[serde(default = "default_true")]
    pub reclaim_opportunity: bool,
    #[serde(default = "default_true")]
    pub high_value_optimization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub count_by_user: Option<bool>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/seatwise/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.data.dir = data_dir;
        }
        if let Some(by_user) = overrides.count_by_user {
            self.counting.by_user = by_user;
        }
    }

    pub fn counting_mode(&self) -> CountingMode {
        CountingMode::from_flag(self.counting.by_user)
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.data.dir)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[data]
dir = "data"
cache_ttl_secs = 60

[counting]
by_user = false

[analysis]
renewal_window_days = 30
urgent_window_days = 10
low_usage_days = 60
high_savings_alert_usd = 5000.0
default_notice_days = 30

[alerts]
webhook_url = ""
enable_stdout = true

[alerts.rules]
urgent_expiry = true
compliance_overage = true
reclaim_opportunity = true
high_value_optimization = true

[server]
host = "127.0.0.1"
port = 3001
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            renewal_window_days: default_renewal_window_days(),
            urgent_window_days: default_urgent_window_days(),
            low_usage_days: default_low_usage_days(),
            high_savings_alert_usd: default_high_savings_alert_usd(),
            default_notice_days: default_notice_days(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            enable_stdout: default_enable_stdout(),
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            urgent_expiry: true,
            compliance_overage: true,
            reclaim_opportunity: true,
            high_value_optimization: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_renewal_window_days() -> i64 {
    30
}

fn default_urgent_window_days() -> i64 {
    10
}

fn default_low_usage_days() -> u64 {
    60
}

fn default_high_savings_alert_usd() -> f64 {
    5000.0
}

fn default_notice_days() -> i64 {
    30
}

fn default_enable_stdout() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_true() -> bool {
    true
}
