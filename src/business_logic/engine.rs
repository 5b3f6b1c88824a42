use crate::business_logic::bar_guard::{BarCloseGuard, BarHistory, GuardVerdict};
use crate::business_logic::config::TradingConfig;
use crate::business_logic::entry_gate::EntryGate;
use crate::business_logic::exit_engine::{ExitContext, ExitEngine};
use crate::business_logic::lifecycle::{self, TransitionEvent};
use crate::business_logic::trailing_stop::{ratchet, TrailingStop};
use crate::models::audit::{AuditCategory, AuditEntry};
use crate::models::bar::Bar;
use crate::models::context::MarketContext;
use crate::models::decision::{EntryDecision, ExitAction, ExitDecision};
use crate::models::pattern::Pattern;
use crate::models::position::{ClosedTrade, ExitReason, LifecycleState, Position};

/// Everything the engine consumes for one closed bar.
#[derive(Debug, Clone)]
pub struct ClosedBar {
    pub bar: Bar,
    pub pattern: Option<Pattern>,
    pub market: MarketContext,
}

/// What one closed bar produced.
#[derive(Debug, Clone, Default)]
pub struct BarOutcome {
    pub approved: bool,
    pub entry: Option<EntryDecision>,
    pub opened: Option<Position>,
    pub transition: Option<TransitionEvent>,
    pub exit: Option<ExitDecision>,
    pub closed: Option<ClosedTrade>,
    pub audit: Vec<AuditEntry>,
}

/// Per-symbol decision core. Runs the guard, then the entry gate while flat
/// or the lifecycle and exit engines while a position is open, then the
/// trailing stop on any state advance.
#[derive(Debug, Clone)]
pub struct TradeEngine {
    symbol: String,
    guard: BarCloseGuard,
    history: BarHistory,
    entry_gate: EntryGate,
    first_exit: ExitEngine,
    second_exit: ExitEngine,
    trailing: TrailingStop,
    position: Option<Position>,
    last_trade_close_ms: Option<u64>,
}

impl TradeEngine {
    pub fn new(symbol: &str, config: &TradingConfig) -> Self {
        Self {
            symbol: symbol.to_string(),
            guard: BarCloseGuard::new(config.guard.clone()),
            history: BarHistory::new(config.history_window),
            entry_gate: EntryGate::new(config.entry.clone(), config.targets.multipliers),
            first_exit: ExitEngine::first(config.first_exit),
            second_exit: ExitEngine::second(config.second_exit),
            trailing: TrailingStop::new(config.trailing.clone()),
            position: None,
            last_trade_close_ms: None,
        }
    }

    /// Resume from persisted state.
    pub fn restore(&mut self, position: Option<Position>, last_trade_close_ms: Option<u64>) {
        if let Some(position) = &position {
            tracing::info!(
                "[{}] restored {} position: entry={}, stop={}, state={}",
                self.symbol,
                position.direction,
                position.entry_price,
                position.stop_loss,
                String::from(position.state())
            );
        }
        self.position = position.filter(|p| p.state() != LifecycleState::Exited);
        self.last_trade_close_ms = last_trade_close_ms;
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    #[cfg(test)]
    pub fn last_trade_close_ms(&self) -> Option<u64> {
        self.last_trade_close_ms
    }

    /// Process one closed bar at wall-clock `now_ms`.
    pub fn on_bar(&mut self, input: &ClosedBar, now_ms: u64) -> BarOutcome {
        let bar = &input.bar;
        let candidate_signal = self.position.is_none() && input.pattern.is_some();
        let verdict = self
            .guard
            .validate(bar, &self.history, now_ms, candidate_signal);

        let mut outcome = BarOutcome {
            approved: verdict.approved,
            audit: self.guard_audit(bar, &verdict),
            ..BarOutcome::default()
        };
        if !verdict.approved {
            return outcome;
        }
        self.history.push(bar.clone());

        match self.position.take() {
            None => self.try_entry(input, &mut outcome),
            Some(position) => self.manage(position, input, &mut outcome),
        }
        outcome
    }

    fn guard_audit(&self, bar: &Bar, verdict: &GuardVerdict) -> Vec<AuditEntry> {
        let mut entries = Vec::new();
        if let Some(rejection) = &verdict.rejection {
            if rejection.reason.is_structural() {
                tracing::warn!(
                    "[{}] malformed bar {} rejected: {} ({})",
                    self.symbol,
                    bar.open_time,
                    rejection.reason.code(),
                    rejection.detail
                );
            } else {
                tracing::info!(
                    "[{}] bar {} rejected: {} ({})",
                    self.symbol,
                    bar.open_time,
                    rejection.reason.code(),
                    rejection.detail
                );
            }
            entries.push(AuditEntry::new(
                bar.close_time,
                &self.symbol,
                AuditCategory::GuardRejection,
                rejection.reason.code(),
                rejection.detail.clone(),
            ));
        }
        for warning in &verdict.warnings {
            tracing::warn!(
                "[{}] bar {} warning: {} ({})",
                self.symbol,
                bar.open_time,
                warning.warning.code(),
                warning.detail
            );
            entries.push(AuditEntry::new(
                bar.close_time,
                &self.symbol,
                AuditCategory::GuardWarning,
                warning.warning.code(),
                warning.detail.clone(),
            ));
        }
        entries
    }

    fn try_entry(&mut self, input: &ClosedBar, outcome: &mut BarOutcome) {
        let bar = &input.bar;
        let decision =
            self.entry_gate
                .evaluate(bar, input.pattern.as_ref(), self.last_trade_close_ms);

        match (&input.pattern, decision.levels) {
            (Some(pattern), Some(levels)) if decision.allowed => {
                let position = Position::open(&self.symbol, pattern.direction, &levels, bar.close_time);
                tracing::info!(
                    "[{}] {} entry at {} stop={} targets={:?}",
                    self.symbol,
                    pattern.direction,
                    levels.entry,
                    levels.stop,
                    levels.targets
                );
                self.history.note_signal();
                outcome.opened = Some(position.clone());
                self.position = Some(position);
            }
            (Some(_), _) => {
                if let Some(code) = decision.failure_code {
                    outcome.audit.push(AuditEntry::new(
                        bar.close_time,
                        &self.symbol,
                        AuditCategory::EntryRejection,
                        code.code(),
                        decision.detail.clone(),
                    ));
                }
            }
            // No pattern on this bar; nothing worth recording
            (None, _) => {}
        }
        outcome.entry = Some(decision);
    }

    fn manage(&mut self, position: Position, input: &ClosedBar, outcome: &mut BarOutcome) {
        let bar = &input.bar;
        let transition = lifecycle::advance(&position, bar);
        let mut position = transition.position;
        outcome.transition = Some(transition.event);

        match transition.event {
            TransitionEvent::StopLossHit { stop } => {
                let direction = position.direction;
                // Gapped through the stop: the open is the first available fill
                let fill = if direction.is_beyond(bar.open, stop) {
                    stop
                } else {
                    bar.open
                };
                self.finish(
                    &position,
                    fill,
                    ExitReason::StopLoss,
                    ExitReason::StopLoss.code(),
                    bar,
                    outcome,
                );
                return;
            }
            TransitionEvent::FinalTargetHit { target } => {
                self.finish(
                    &position,
                    target,
                    ExitReason::FinalTarget,
                    ExitReason::FinalTarget.code(),
                    bar,
                    outcome,
                );
                return;
            }
            TransitionEvent::TargetReached { state, target } => {
                let stop = self.trailing.on_advance(&position, bar, &input.market);
                tracing::info!(
                    "[{}] {} at target {}, stop {} -> {}",
                    self.symbol,
                    String::from(state),
                    target,
                    position.stop_loss,
                    stop
                );
                position.stop_loss = stop;
            }
            TransitionEvent::Unchanged => {}
        }

        let Some(ctx) = ExitContext::for_position(&position, bar, input.market) else {
            self.position = Some(position);
            return;
        };
        let engine = match position.state() {
            LifecycleState::SecondTargetReached => &self.second_exit,
            _ => &self.first_exit,
        };
        let decision = engine.evaluate(&ctx);
        tracing::debug!(
            "[{}] {:?} tier exit engine: {:?} ({})",
            self.symbol,
            engine.tier(),
            decision.action,
            decision.reason
        );

        match decision.action {
            ExitAction::Exit => {
                let reason = match position.state() {
                    LifecycleState::SecondTargetReached => ExitReason::SecondTargetExit,
                    _ => ExitReason::FirstTargetExit,
                };
                self.finish(&position, bar.close, reason, decision.reason.code(), bar, outcome);
            }
            ExitAction::WaitOneBar => {
                if let Some(suggested) = decision.suggested_stop {
                    let stop = ratchet(position.direction, position.stop_loss, suggested);
                    tracing::debug!(
                        "[{}] {}: waiting one bar, stop {} -> {}",
                        self.symbol,
                        decision.reason,
                        position.stop_loss,
                        stop
                    );
                    position.stop_loss = stop;
                }
                self.position = Some(position);
            }
            ExitAction::Hold => {
                self.position = Some(position);
            }
        }
        outcome.exit = Some(decision);
    }

    fn finish(
        &mut self,
        position: &Position,
        exit_price: f64,
        reason: ExitReason,
        trigger: &str,
        bar: &Bar,
        outcome: &mut BarOutcome,
    ) {
        let mut closed = position.clone();
        closed.close(bar.close_time);
        let trade = ClosedTrade::from_position(&closed, exit_price, reason, trigger, bar.close_time);
        tracing::info!(
            "[{}] {} exit: {} ({}) at {}, R={:.2}",
            self.symbol,
            trade.direction,
            reason,
            trigger,
            exit_price,
            trade.r_multiple
        );
        self.position = None;
        self.last_trade_close_ms = Some(bar.close_time);
        outcome.closed = Some(trade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_logic::config::FilterMode;
    use crate::models::bar::test_support::bar_at;
    use crate::models::decision::{EntryFailure, ExitRule, TradeLevels};
    use crate::models::direction::Direction;

    fn engine() -> TradeEngine {
        TradeEngine::new("ETH", &TradingConfig::default())
    }

    fn closed(bar: Bar) -> ClosedBar {
        ClosedBar {
            bar,
            pattern: None,
            market: MarketContext::default(),
        }
    }

    fn now_after(input: &ClosedBar) -> u64 {
        input.bar.close_time + 1
    }

    fn managed_long() -> TradeEngine {
        let levels = TradeLevels {
            entry: 2000.0,
            stop: 1950.0,
            risk: 50.0,
            targets: [2070.0, 2095.0, 2125.0],
        };
        let mut engine = engine();
        engine.restore(
            Some(Position::open("ETH", Direction::Long, &levels, 59_999)),
            None,
        );
        engine
    }

    fn long_pattern() -> Pattern {
        Pattern {
            direction: Direction::Long,
            first_swing: 1950.0,
            second_swing: 1952.0,
            neckline: 2000.50,
            is_valid: true,
            quality: 7.0,
        }
    }

    fn breakout(minute: u64) -> ClosedBar {
        let mut bar = bar_at(minute, 1995.0, 2011.0, 1990.0, 2010.0);
        bar.slow_ma = 1980.0;
        ClosedBar {
            bar,
            pattern: Some(long_pattern()),
            market: MarketContext::default(),
        }
    }

    #[test]
    fn first_target_holds_on_same_bar_then_exits_on_retracement() {
        let mut engine = managed_long();

        let touch = closed(bar_at(1, 2060.0, 2072.0, 2055.0, 2071.0));
        let outcome = engine.on_bar(&touch, now_after(&touch));
        assert!(matches!(
            outcome.transition,
            Some(TransitionEvent::TargetReached { .. })
        ));
        let exit = outcome.exit.unwrap();
        assert_eq!(exit.action, ExitAction::Hold);
        assert_eq!(exit.reason, ExitRule::SameBarGuard);
        let position = engine.position().unwrap();
        assert_eq!(position.state(), LifecycleState::FirstTargetReached);
        assert!((position.stop_loss - 2002.5).abs() < 1e-9);

        // 1.2 ATR given back from 2072
        let retrace = closed(bar_at(2, 2071.0, 2071.0, 2058.0, 2060.0));
        let outcome = engine.on_bar(&retrace, now_after(&retrace));
        assert_eq!(outcome.exit.unwrap().reason, ExitRule::DeepRetracement);
        let trade = outcome.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::FirstTargetExit);
        assert_eq!(trade.trigger, "DEEP_RETRACEMENT");
        assert_eq!(trade.exit_price, 2060.0);
        assert!((trade.r_multiple - 1.2).abs() < 1e-9);
        assert!(engine.position().is_none());
        assert_eq!(engine.last_trade_close_ms(), Some(retrace.bar.close_time));
    }

    #[test]
    fn breakout_opens_position_and_cooldown_blocks_next() {
        let mut engine = engine();
        let input = breakout(10);
        let outcome = engine.on_bar(&input, now_after(&input));
        assert!(outcome.entry.as_ref().unwrap().allowed);
        let position = outcome.opened.unwrap();
        assert_eq!(position.state(), LifecycleState::InTrade);
        // Stop sits 0.25 ATR below the lower trough
        assert_eq!(position.stop_loss, 1947.5);

        // Stopped out on the next bar
        let crash = closed(bar_at(11, 1960.0, 1965.0, 1940.0, 1945.0));
        let outcome = engine.on_bar(&crash, now_after(&crash));
        assert_eq!(outcome.closed.unwrap().exit_reason, ExitReason::StopLoss);

        let retry = breakout(12);
        let outcome = engine.on_bar(&retry, now_after(&retry));
        assert_eq!(
            outcome.entry.unwrap().failure_code,
            Some(EntryFailure::CooldownActive)
        );
        assert_eq!(outcome.audit.len(), 1);
        assert_eq!(outcome.audit[0].category, AuditCategory::EntryRejection);
        assert!(engine.position().is_none());
    }

    #[test]
    fn bars_without_pattern_leave_no_audit() {
        let mut engine = engine();
        let input = closed(bar_at(1, 2000.0, 2005.0, 1995.0, 2001.0));
        let outcome = engine.on_bar(&input, now_after(&input));
        assert!(outcome.approved);
        assert_eq!(
            outcome.entry.unwrap().failure_code,
            Some(EntryFailure::InvalidPattern)
        );
        assert!(outcome.audit.is_empty());
    }

    #[test]
    fn stop_fills_at_level_or_gap_open() {
        let mut engine = managed_long();
        let touch = closed(bar_at(1, 1990.0, 1995.0, 1945.0, 1960.0));
        let trade = engine.on_bar(&touch, now_after(&touch)).closed.unwrap();
        assert_eq!(trade.exit_price, 1950.0);
        assert!((trade.r_multiple + 1.0).abs() < 1e-9);

        let mut engine = managed_long();
        let gap = closed(bar_at(1, 1940.0, 1948.0, 1930.0, 1935.0));
        let trade = engine.on_bar(&gap, now_after(&gap)).closed.unwrap();
        assert_eq!(trade.exit_price, 1940.0);
        assert_eq!(trade.trigger, "STOP_LOSS");
    }

    #[test]
    fn final_target_closes_trade() {
        let mut engine = managed_long();
        let bars = [
            bar_at(1, 2060.0, 2072.0, 2055.0, 2071.0),
            bar_at(2, 2071.0, 2096.0, 2070.0, 2095.0),
            bar_at(3, 2095.0, 2126.0, 2094.0, 2124.0),
        ];
        let market = MarketContext {
            momentum: crate::models::context::Momentum::Strong,
            regime: crate::models::context::Regime::Up,
            ..MarketContext::default()
        };
        let mut last = BarOutcome::default();
        for bar in bars {
            let input = ClosedBar {
                bar,
                pattern: None,
                market,
            };
            last = engine.on_bar(&input, now_after(&input));
        }
        let trade = last.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::FinalTarget);
        assert_eq!(trade.exit_price, 2125.0);
        assert!(engine.position().is_none());
    }

    #[test]
    fn second_target_uses_tighter_engine() {
        let mut engine = managed_long();
        let steps = [
            bar_at(1, 2060.0, 2072.0, 2055.0, 2071.0),
            bar_at(2, 2071.0, 2096.0, 2070.0, 2095.0),
        ];
        for bar in steps {
            let input = closed(bar);
            engine.on_bar(&input, now_after(&input));
        }
        let position = engine.position().unwrap();
        assert_eq!(position.state(), LifecycleState::SecondTargetReached);
        // Locked in at least entry + 1R
        assert!(position.stop_loss >= 2050.0);

        // 0.7 ATR from 2096: within the first tier's tolerance, not the second's
        let retrace = closed(bar_at(3, 2095.0, 2095.0, 2088.0, 2089.0));
        let outcome = engine.on_bar(&retrace, now_after(&retrace));
        assert_eq!(outcome.exit.unwrap().reason, ExitRule::DeepRetracement);
        assert_eq!(
            outcome.closed.unwrap().exit_reason,
            ExitReason::SecondTargetExit
        );
    }

    #[test]
    fn wait_tightens_stop() {
        let mut engine = managed_long();
        let touch = closed(bar_at(1, 2060.0, 2072.0, 2055.0, 2071.0));
        engine.on_bar(&touch, now_after(&touch));

        let mut soft = closed(bar_at(2, 2071.0, 2073.0, 2066.0, 2067.0));
        soft.market.momentum = crate::models::context::Momentum::Moderate;
        let outcome = engine.on_bar(&soft, now_after(&soft));
        let exit = outcome.exit.unwrap();
        assert_eq!(exit.action, ExitAction::WaitOneBar);
        // 2070 - 0.5 ATR
        assert!((engine.position().unwrap().stop_loss - 2065.0).abs() < 1e-9);
    }

    #[test]
    fn replayed_bar_is_rejected_and_changes_nothing() {
        let mut engine = managed_long();
        let touch = closed(bar_at(1, 2060.0, 2072.0, 2055.0, 2071.0));
        engine.on_bar(&touch, now_after(&touch));
        let before = engine.position().cloned();

        let outcome = engine.on_bar(&touch, now_after(&touch));
        assert!(!outcome.approved);
        assert_eq!(outcome.audit[0].category, AuditCategory::GuardRejection);
        assert_eq!(outcome.audit[0].code, "STALE_BAR");
        assert_eq!(engine.position().cloned(), before);
    }

    #[test]
    fn forming_bar_is_rejected() {
        let mut engine = managed_long();
        let forming = closed(bar_at(1, 2060.0, 2200.0, 2055.0, 2150.0));
        let outcome = engine.on_bar(&forming, forming.bar.close_time);
        assert!(!outcome.approved);
        assert_eq!(outcome.audit[0].code, "BAR_STILL_FORMING");
        assert_eq!(
            engine.position().unwrap().state(),
            LifecycleState::InTrade
        );
    }

    #[test]
    fn advisory_movement_warns_but_approves() {
        let mut config = TradingConfig::default();
        config.guard.min_movement_mode = FilterMode::Advisory;
        config.guard.min_movement = 50.0;
        let mut engine = TradeEngine::new("ETH", &config);
        let input = breakout(10);
        let outcome = engine.on_bar(&input, now_after(&input));
        assert!(outcome.approved);
        assert_eq!(outcome.audit[0].category, AuditCategory::GuardWarning);
        assert_eq!(outcome.audit[0].code, "LOW_MOVEMENT");
        assert!(outcome.opened.is_some());
    }

    #[test]
    fn restore_drops_exited_position() {
        let levels = TradeLevels {
            entry: 2000.0,
            stop: 1950.0,
            risk: 50.0,
            targets: [2070.0, 2095.0, 2125.0],
        };
        let mut position = Position::open("ETH", Direction::Long, &levels, 0);
        position.close(10);
        let mut engine = engine();
        engine.restore(Some(position), Some(10));
        assert!(engine.position().is_none());
        assert_eq!(engine.last_trade_close_ms(), Some(10));
    }
}
