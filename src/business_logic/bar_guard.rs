use std::collections::VecDeque;

use serde::Serialize;
use utoipa::ToSchema;

use crate::business_logic::config::{FilterMode, GuardConfig};
use crate::models::bar::Bar;

/// Closed set of guard rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardReason {
    NonFinitePrice,
    InconsistentRange,
    InvalidTimestamps,
    BarStillForming,
    StaleBar,
    InsufficientMovement,
}

impl GuardReason {
    pub fn code(self) -> &'static str {
        match self {
            GuardReason::NonFinitePrice => "NON_FINITE_PRICE",
            GuardReason::InconsistentRange => "INCONSISTENT_RANGE",
            GuardReason::InvalidTimestamps => "INVALID_TIMESTAMPS",
            GuardReason::BarStillForming => "BAR_STILL_FORMING",
            GuardReason::StaleBar => "STALE_BAR",
            GuardReason::InsufficientMovement => "INSUFFICIENT_MOVEMENT",
        }
    }

    /// Structural failures, as opposed to freshness or filter failures.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            GuardReason::NonFinitePrice
                | GuardReason::InconsistentRange
                | GuardReason::InvalidTimestamps
        )
    }
}

/// Closed set of advisory warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardWarning {
    LowMovement,
    SignalSpacing,
}

impl GuardWarning {
    pub fn code(self) -> &'static str {
        match self {
            GuardWarning::LowMovement => "LOW_MOVEMENT",
            GuardWarning::SignalSpacing => "SIGNAL_SPACING",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: GuardReason,
    pub detail: String,
}

impl Rejection {
    fn new(reason: GuardReason, detail: String) -> Self {
        Self { reason, detail }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub warning: GuardWarning,
    pub detail: String,
}

/// Outcome of an advisory check. It can carry a warning but has no way to
/// express a rejection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Advisory {
    pub warning: Option<Warning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub approved: bool,
    pub rejection: Option<Rejection>,
    pub warnings: Vec<Warning>,
}

impl GuardVerdict {
    fn rejected(rejection: Rejection) -> Self {
        Self {
            approved: false,
            rejection: Some(rejection),
            warnings: Vec::new(),
        }
    }
}

/// Rolling window of accepted closed bars plus signal spacing bookkeeping.
#[derive(Debug, Clone)]
pub struct BarHistory {
    bars: VecDeque<Bar>,
    capacity: usize,
    bars_since_signal: Option<u32>,
}

impl BarHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            bars_since_signal: None,
        }
    }

    /// Record an approved closed bar
    pub fn push(&mut self, bar: Bar) {
        self.bars.push_back(bar);
        if self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
        if let Some(count) = self.bars_since_signal.as_mut() {
            *count = count.saturating_add(1);
        }
    }

    /// Mark the most recent bar as carrying an acted-on signal.
    pub fn note_signal(&mut self) {
        self.bars_since_signal = Some(0);
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn bars_since_signal(&self) -> Option<u32> {
        self.bars_since_signal
    }
}

/// The gate every bar passes before any decision logic sees it.
#[derive(Debug, Clone)]
pub struct BarCloseGuard {
    config: GuardConfig,
}

impl BarCloseGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Validate `bar` against the closed-bar history at time `now_ms`.
    ///
    /// `candidate_signal` tells the spacing advisory whether this bar carries
    /// a pattern the entry gate will look at.
    pub fn validate(
        &self,
        bar: &Bar,
        history: &BarHistory,
        now_ms: u64,
        candidate_signal: bool,
    ) -> GuardVerdict {
        let mandatory = check_structure(bar).and_then(|_| check_freshness(bar, history, now_ms));
        if let Err(rejection) = mandatory {
            return GuardVerdict::rejected(rejection);
        }

        if self.config.min_movement_mode == FilterMode::Enforce {
            if let Some(detail) = self.movement_shortfall(bar) {
                return GuardVerdict::rejected(Rejection::new(
                    GuardReason::InsufficientMovement,
                    detail,
                ));
            }
        }

        let warnings = [
            self.advise_movement(bar),
            self.advise_signal_spacing(history, candidate_signal),
        ]
        .into_iter()
        .filter_map(|advisory| advisory.warning)
        .collect();

        GuardVerdict {
            approved: true,
            rejection: None,
            warnings,
        }
    }

    fn movement_shortfall(&self, bar: &Bar) -> Option<String> {
        let range = bar.range();
        (range < self.config.min_movement).then(|| {
            format!(
                "range={} below min_movement={}",
                range, self.config.min_movement
            )
        })
    }

    fn advise_movement(&self, bar: &Bar) -> Advisory {
        if self.config.min_movement_mode != FilterMode::Advisory {
            return Advisory::default();
        }
        Advisory {
            warning: self.movement_shortfall(bar).map(|detail| Warning {
                warning: GuardWarning::LowMovement,
                detail,
            }),
        }
    }

    fn advise_signal_spacing(&self, history: &BarHistory, candidate_signal: bool) -> Advisory {
        if !self.config.signal_spacing_enabled || !candidate_signal {
            return Advisory::default();
        }
        match history.bars_since_signal() {
            Some(bars) if bars < self.config.min_bars_between_signals => Advisory {
                warning: Some(Warning {
                    warning: GuardWarning::SignalSpacing,
                    detail: format!(
                        "{} bars since last signal (min: {})",
                        bars, self.config.min_bars_between_signals
                    ),
                }),
            },
            _ => Advisory::default(),
        }
    }
}

fn check_structure(bar: &Bar) -> Result<(), Rejection> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|p| !p.is_finite()) {
        return Err(Rejection::new(
            GuardReason::NonFinitePrice,
            format!(
                "open={}, high={}, low={}, close={}",
                bar.open, bar.high, bar.low, bar.close
            ),
        ));
    }

    if bar.high < bar.low
        || bar.high < bar.open.max(bar.close)
        || bar.low > bar.open.min(bar.close)
    {
        return Err(Rejection::new(
            GuardReason::InconsistentRange,
            format!(
                "low={}, high={}, open={}, close={}",
                bar.low, bar.high, bar.open, bar.close
            ),
        ));
    }

    if bar.close_time < bar.open_time {
        return Err(Rejection::new(
            GuardReason::InvalidTimestamps,
            format!("close_time={} < open_time={}", bar.close_time, bar.open_time),
        ));
    }

    Ok(())
}

fn check_freshness(bar: &Bar, history: &BarHistory, now_ms: u64) -> Result<(), Rejection> {
    if !bar.is_closed_at(now_ms) {
        return Err(Rejection::new(
            GuardReason::BarStillForming,
            format!("close_time={} not elapsed at now={}", bar.close_time, now_ms),
        ));
    }

    if let Some(last) = history.last() {
        if bar.open_time <= last.open_time {
            return Err(Rejection::new(
                GuardReason::StaleBar,
                format!(
                    "open_time={} not after last closed bar open_time={}",
                    bar.open_time, last.open_time
                ),
            ));
        }
    }

    // A newer bar has also closed; this one is no longer the latest
    let next_close = bar.close_time.saturating_add(bar.interval_ms());
    if now_ms > next_close {
        return Err(Rejection::new(
            GuardReason::StaleBar,
            format!(
                "superseded: next bar closed at {} before now={}",
                next_close, now_ms
            ),
        ));
    }

    Ok(())
}
