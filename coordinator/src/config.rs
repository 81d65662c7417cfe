//! Coordinator configuration: loaded from a JSON file with environment
//! variables able to override individual keys, mirroring
//! `AppConfig::from_env`'s env-first construction but fronted by a file
//! since a fleet run needs a full `fleet` roster, not just one value.

use bidder::BiddingRule;
use monitor::RecoveryMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StpMethod {
    Stn,
    Stnu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bidding_rule: BiddingRule,
    #[serde(default)]
    pub alternative_timeslots: bool,
    #[serde(default = "default_closure_window_s")]
    pub closure_window_s: f64,
    #[serde(default = "default_freeze_window_minutes")]
    pub freeze_window_minutes: f64,
    #[serde(default = "default_n_queued_tasks")]
    pub n_queued_tasks: usize,
    #[serde(default = "default_recovery_method")]
    pub recovery_method: RecoveryMethodConfig,
    #[serde(default = "default_stp_method")]
    pub stp_method: StpMethod,
    pub fleet: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMethodConfig {
    Preempt,
    ReAllocate,
}

impl From<RecoveryMethodConfig> for RecoveryMethod {
    fn from(value: RecoveryMethodConfig) -> Self {
        match value {
            RecoveryMethodConfig::Preempt => RecoveryMethod::Preempt,
            RecoveryMethodConfig::ReAllocate => RecoveryMethod::Reallocate,
        }
    }
}

fn default_closure_window_s() -> f64 {
    15.0
}

fn default_freeze_window_minutes() -> f64 {
    2.0
}

fn default_n_queued_tasks() -> usize {
    3
}

fn default_recovery_method() -> RecoveryMethodConfig {
    RecoveryMethodConfig::ReAllocate
}

fn default_stp_method() -> StpMethod {
    StpMethod::Stn
}

impl Config {
    /// Loads the JSON file at `path`, then lets a handful of environment
    /// variables override individual scalar fields — useful for swapping
    /// `recovery_method`/`alternative_timeslots` between experiment runs
    /// without editing the checked-in config file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&raw)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MRTA_ALTERNATIVE_TIMESLOTS") {
            self.alternative_timeslots = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("MRTA_CLOSURE_WINDOW_S") {
            if let Ok(v) = v.parse() {
                self.closure_window_s = v;
            }
        }
        if let Ok(v) = std::env::var("MRTA_FREEZE_WINDOW_MINUTES") {
            if let Ok(v) = v.parse() {
                self.freeze_window_minutes = v;
            }
        }
    }
}
