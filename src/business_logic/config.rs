use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// How an optional guard filter acts on a failing bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Off,
    /// Record a warning, keep the bar
    Advisory,
    /// Reject the bar
    Enforce,
}

/// Bar-close guard parameters. Both optional filters are off by default.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct GuardConfig {
    /// What to do with bars whose high-low range is below `min_movement`
    pub min_movement_mode: FilterMode,
    /// Minimum high-low range in price units
    #[validate(range(min = 0.0))]
    pub min_movement: f64,
    /// Warn (never reject) when signals come closer than `min_bars_between_signals`
    pub signal_spacing_enabled: bool,
    pub min_bars_between_signals: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_movement_mode: FilterMode::Off,
            min_movement: 0.0,
            signal_spacing_enabled: false,
            min_bars_between_signals: 5,
        }
    }
}

/// Entry gate parameters
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct EntryConfig {
    /// Minimum pattern quality score
    #[validate(range(min = 0.0, max = 10.0))]
    pub min_quality: f64,
    /// Require the breakout bar's range to be a multiple of ATR
    pub momentum_filter_enabled: bool,
    #[validate(range(min = 0.0))]
    pub momentum_atr_multiple: f64,
    /// Minimum time between the last trade close and a new entry (ms)
    pub cooldown_ms: u64,
    /// Stop distance beyond the protective swing, in ATR units
    #[validate(range(min = 0.0))]
    pub stop_buffer_atr: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.0,
            momentum_filter_enabled: false,
            momentum_atr_multiple: 1.0,
            cooldown_ms: 3_600_000,
            stop_buffer_atr: 0.25,
        }
    }
}

/// Target multipliers, expressed in units of risk
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct TargetConfig {
    pub multipliers: [f64; 3],
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            multipliers: [1.4, 1.9, 2.5],
        }
    }
}

/// Retracement thresholds for one post-target exit engine, in ATR units
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct ExitConfig {
    /// Giveback at or above this fraction of ATR exits
    #[validate(range(min = 0.0))]
    pub deep_retrace_atr: f64,
    /// Giveback below this fraction of ATR holds
    #[validate(range(min = 0.0))]
    pub shallow_retrace_atr: f64,
}

impl ExitConfig {
    pub fn first_target() -> Self {
        Self {
            deep_retrace_atr: 1.0,
            shallow_retrace_atr: 0.5,
        }
    }

    pub fn second_target() -> Self {
        Self {
            deep_retrace_atr: 0.6,
            shallow_retrace_atr: 0.3,
        }
    }
}

/// Trailing stop parameters
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct TrailingConfig {
    /// Lock-in above entry after the first target, in units of risk
    #[validate(range(min = 0.0))]
    pub first_lock_in_r: f64,
    /// Guaranteed lock-in after the second target, in units of risk
    #[validate(range(min = 0.0))]
    pub second_lock_in_r: f64,
    /// Distance behind the current price, in ATR units
    #[validate(range(min = 0.0))]
    pub price_offset_atr: f64,
    /// Distance behind the swing reference, in ATR units
    #[validate(range(min = 0.0))]
    pub swing_offset_atr: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            first_lock_in_r: 0.05,
            second_lock_in_r: 1.0,
            price_offset_atr: 1.5,
            swing_offset_atr: 0.5,
        }
    }
}

/// Full decision-core configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_exit_tiers"))]
pub struct TradingConfig {
    /// Closed bars kept per symbol for the guard
    #[validate(range(min = 1, max = 10_000))]
    pub history_window: usize,
    #[validate(nested)]
    pub guard: GuardConfig,
    #[validate(nested)]
    pub entry: EntryConfig,
    #[validate(nested)]
    pub targets: TargetConfig,
    #[validate(nested)]
    pub first_exit: ExitConfig,
    #[validate(nested)]
    pub second_exit: ExitConfig,
    #[validate(nested)]
    pub trailing: TrailingConfig,
    /// Audit entries retained in memory for the API
    pub audit_capacity: usize,
    /// Closed trades retained in the published snapshot
    pub recent_trades: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            history_window: 300,
            guard: GuardConfig::default(),
            entry: EntryConfig::default(),
            targets: TargetConfig::default(),
            first_exit: ExitConfig::first_target(),
            second_exit: ExitConfig::second_target(),
            trailing: TrailingConfig::default(),
            audit_capacity: 500,
            recent_trades: 50,
        }
    }
}

impl TradingConfig {
    /// Load from a JSON file; absent keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: TradingConfig =
            serde_json::from_str(&raw).context("failed to parse trading config")?;
        config
            .validate()
            .context("trading config failed validation")?;
        Ok(config)
    }
}

fn validate_exit_tiers(config: &TradingConfig) -> Result<(), ValidationError> {
    let tiers = [config.first_exit, config.second_exit];
    if tiers
        .iter()
        .any(|tier| tier.shallow_retrace_atr > tier.deep_retrace_atr)
    {
        return Err(ValidationError::new("shallow_exceeds_deep"));
    }
    if config.second_exit.deep_retrace_atr > config.first_exit.deep_retrace_atr
        || config.second_exit.shallow_retrace_atr > config.first_exit.shallow_retrace_atr
    {
        let mut error = ValidationError::new("second_exit_looser_than_first");
        error.message = Some("second-target thresholds must not exceed first-target ones".into());
        return Err(error);
    }
    Ok(())
}
