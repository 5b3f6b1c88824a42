use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::decision::TradeLevels;
use crate::models::direction::Direction;

/// Lifecycle state of an open position. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    InTrade,
    FirstTargetReached,
    SecondTargetReached,
    Exited,
}

impl LifecycleState {
    /// The single state that may follow this one.
    pub fn next(self) -> Option<LifecycleState> {
        match self {
            LifecycleState::InTrade => Some(LifecycleState::FirstTargetReached),
            LifecycleState::FirstTargetReached => Some(LifecycleState::SecondTargetReached),
            LifecycleState::SecondTargetReached => Some(LifecycleState::Exited),
            LifecycleState::Exited => None,
        }
    }

    /// Index into `Position::targets` of the next untouched target.
    pub fn pending_target(self) -> Option<usize> {
        match self {
            LifecycleState::InTrade => Some(0),
            LifecycleState::FirstTargetReached => Some(1),
            LifecycleState::SecondTargetReached => Some(2),
            LifecycleState::Exited => None,
        }
    }
}

impl From<LifecycleState> for String {
    fn from(state: LifecycleState) -> Self {
        match state {
            LifecycleState::InTrade => "IN_TRADE".to_string(),
            LifecycleState::FirstTargetReached => "FIRST_TARGET_REACHED".to_string(),
            LifecycleState::SecondTargetReached => "SECOND_TARGET_REACHED".to_string(),
            LifecycleState::Exited => "EXITED".to_string(),
        }
    }
}

/// Managed position. Also the durable record: every field round-trips
/// through the position store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// Stop at entry; the risk reference for lock-ins and R multiples
    pub initial_stop: f64,
    pub stop_loss: f64,
    targets: [f64; 3],
    state: LifecycleState,
    pub opened_at_ms: u64,
    pub last_transition_ms: u64,
    /// Closed bars since the first target was reached
    pub bars_since_first: u32,
    /// Closed bars since the second target was reached
    pub bars_since_second: u32,
    /// Best price seen since the last transition
    pub favorable_extreme: f64,
    /// Consecutive closes on the wrong side of the last reached target
    pub closes_against_target: u32,
}

impl Position {
    pub fn open(symbol: &str, direction: Direction, levels: &TradeLevels, opened_at_ms: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            direction,
            entry_price: levels.entry,
            initial_stop: levels.stop,
            stop_loss: levels.stop,
            targets: levels.targets,
            state: LifecycleState::InTrade,
            opened_at_ms,
            last_transition_ms: opened_at_ms,
            bars_since_first: 0,
            bars_since_second: 0,
            favorable_extreme: levels.entry,
            closes_against_target: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn targets(&self) -> [f64; 3] {
        self.targets
    }

    pub fn risk_per_unit(&self) -> f64 {
        (self.entry_price - self.initial_stop).abs()
    }

    /// Target reached by the current state, if any.
    pub fn reached_target(&self) -> Option<f64> {
        match self.state {
            LifecycleState::FirstTargetReached => Some(self.targets[0]),
            LifecycleState::SecondTargetReached => Some(self.targets[1]),
            _ => None,
        }
    }

    /// Move one step forward. Returns the new state, or `None` when already
    /// terminal.
    pub(crate) fn promote(&mut self, at_ms: u64) -> Option<LifecycleState> {
        let next = self.state.next()?;
        self.state = next;
        self.last_transition_ms = at_ms;
        match next {
            LifecycleState::FirstTargetReached => self.bars_since_first = 0,
            LifecycleState::SecondTargetReached => self.bars_since_second = 0,
            _ => {}
        }
        Some(next)
    }

    /// Jump straight to the terminal state.
    pub(crate) fn close(&mut self, at_ms: u64) {
        self.state = LifecycleState::Exited;
        self.last_transition_ms = at_ms;
    }

    /// Realized R multiple for an exit at `price`.
    pub fn r_multiple(&self, price: f64) -> f64 {
        let risk = self.risk_per_unit();
        if risk <= 0.0 {
            return 0.0;
        }
        let gained = match self.direction {
            Direction::Long => price - self.entry_price,
            Direction::Short => self.entry_price - price,
        };
        gained / risk
    }
}

/// Why a position ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    FinalTarget,
    FirstTargetExit,
    SecondTargetExit,
    /// Protective exit, target not reached
    ProtectiveExit,
}

impl ExitReason {
    pub fn code(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::FinalTarget => "FINAL_TARGET",
            ExitReason::FirstTargetExit => "FIRST_TARGET_EXIT",
            ExitReason::SecondTargetExit => "SECOND_TARGET_EXIT",
            ExitReason::ProtectiveExit => "PROTECTIVE_EXIT",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Record of a finished position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClosedTrade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub targets: [f64; 3],
    /// Risk per unit at entry
    pub risk: f64,
    pub exit_reason: ExitReason,
    /// Rule or trigger code that produced the exit
    pub trigger: String,
    pub opened_at_ms: u64,
    pub closed_at_ms: u64,
    pub r_multiple: f64,
}

impl ClosedTrade {
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        exit_reason: ExitReason,
        trigger: &str,
        closed_at_ms: u64,
    ) -> Self {
        Self {
            symbol: position.symbol.clone(),
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            targets: position.targets,
            risk: position.risk_per_unit(),
            exit_reason,
            trigger: trigger.to_string(),
            opened_at_ms: position.opened_at_ms,
            closed_at_ms,
            r_multiple: position.r_multiple(exit_price),
        }
    }

    /// True when the recorded exit price is consistent with the final target
    /// having been touched.
    pub fn exit_reaches_final_target(&self) -> bool {
        self.direction.reaches(self.exit_price, self.targets[2])
    }

    pub fn recompute_r_multiple(&mut self) {
        self.r_multiple = if self.risk > 0.0 {
            match self.direction {
                Direction::Long => (self.exit_price - self.entry_price) / self.risk,
                Direction::Short => (self.entry_price - self.exit_price) / self.risk,
            }
        } else {
            0.0
        };
    }
}
