use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Entry, stop and staged targets derived once at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop: f64,
    /// Risk per unit, `|entry - stop|`
    pub risk: f64,
    /// First, second and final target, strictly monotonic in trade direction
    pub targets: [f64; 3],
}

/// Closed set of entry rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryFailure {
    InvalidPattern,
    NoBreakout,
    TrendMisaligned,
    InsufficientMomentum,
    CooldownActive,
    InvalidLevels,
}

impl EntryFailure {
    pub fn code(self) -> &'static str {
        match self {
            EntryFailure::InvalidPattern => "INVALID_PATTERN",
            EntryFailure::NoBreakout => "NO_BREAKOUT",
            EntryFailure::TrendMisaligned => "TREND_MISALIGNED",
            EntryFailure::InsufficientMomentum => "INSUFFICIENT_MOMENTUM",
            EntryFailure::CooldownActive => "COOLDOWN_ACTIVE",
            EntryFailure::InvalidLevels => "INVALID_LEVELS",
        }
    }
}

impl std::fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntryDecision {
    pub allowed: bool,
    pub failure_code: Option<EntryFailure>,
    /// Numeric context for the failing stage
    pub detail: String,
    pub levels: Option<TradeLevels>,
}

impl EntryDecision {
    pub fn admit(levels: TradeLevels) -> Self {
        Self {
            allowed: true,
            failure_code: None,
            detail: String::new(),
            levels: Some(levels),
        }
    }

    pub fn reject(code: EntryFailure, detail: String) -> Self {
        Self {
            allowed: false,
            failure_code: Some(code),
            detail,
            levels: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitAction {
    Hold,
    WaitOneBar,
    Exit,
}

/// The rule that produced an exit-engine decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitRule {
    SameBarGuard,
    StructuralBreak,
    MomentumBroken,
    RegimeHostile,
    TwoClosesAgainstTarget,
    DeepRetracement,
    TrendIntact,
    ShallowRetracement,
    HigherLowsIntact,
    MomentumSoftening,
    FirstCloseAgainstTarget,
    NoTrigger,
}

impl ExitRule {
    pub fn code(self) -> &'static str {
        match self {
            ExitRule::SameBarGuard => "SAME_BAR_GUARD",
            ExitRule::StructuralBreak => "STRUCTURAL_BREAK",
            ExitRule::MomentumBroken => "MOMENTUM_BROKEN",
            ExitRule::RegimeHostile => "REGIME_HOSTILE",
            ExitRule::TwoClosesAgainstTarget => "TWO_CLOSES_AGAINST_TARGET",
            ExitRule::DeepRetracement => "DEEP_RETRACEMENT",
            ExitRule::TrendIntact => "TREND_INTACT",
            ExitRule::ShallowRetracement => "SHALLOW_RETRACEMENT",
            ExitRule::HigherLowsIntact => "HIGHER_LOWS_INTACT",
            ExitRule::MomentumSoftening => "MOMENTUM_SOFTENING",
            ExitRule::FirstCloseAgainstTarget => "FIRST_CLOSE_AGAINST_TARGET",
            ExitRule::NoTrigger => "NO_TRIGGER",
        }
    }
}

impl std::fmt::Display for ExitRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExitDecision {
    pub action: ExitAction,
    pub reason: ExitRule,
    pub suggested_stop: Option<f64>,
}

impl ExitDecision {
    pub fn hold(reason: ExitRule) -> Self {
        Self {
            action: ExitAction::Hold,
            reason,
            suggested_stop: None,
        }
    }

    pub fn exit(reason: ExitRule) -> Self {
        Self {
            action: ExitAction::Exit,
            reason,
            suggested_stop: None,
        }
    }

    pub fn wait(reason: ExitRule, suggested_stop: Option<f64>) -> Self {
        Self {
            action: ExitAction::WaitOneBar,
            reason,
            suggested_stop,
        }
    }
}
