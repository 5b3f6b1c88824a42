use crate::business_logic::config::ExitConfig;
use crate::models::bar::Bar;
use crate::models::context::{MarketContext, Momentum, Structure};
use crate::models::decision::{ExitDecision, ExitRule};
use crate::models::direction::Direction;
use crate::models::position::{LifecycleState, Position};

/// Which intermediate target an engine instance governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTier {
    First,
    Second,
}

/// Inputs for one post-target evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitContext {
    pub direction: Direction,
    /// Closed bars since this tier's target was first touched
    pub bars_held: u32,
    pub close: f64,
    /// The target this tier guards
    pub target: f64,
    pub atr: f64,
    /// Best price since the target was touched
    pub favorable_extreme: f64,
    pub closes_against_target: u32,
    pub market: MarketContext,
}

impl ExitContext {
    /// Context for the engine governing `position`'s current state, or
    /// `None` when the position is not between targets.
    pub fn for_position(position: &Position, bar: &Bar, market: MarketContext) -> Option<Self> {
        let target = position.reached_target()?;
        let bars_held = match position.state() {
            LifecycleState::FirstTargetReached => position.bars_since_first,
            LifecycleState::SecondTargetReached => position.bars_since_second,
            _ => return None,
        };
        Some(Self {
            direction: position.direction,
            bars_held,
            close: bar.close,
            target,
            atr: bar.atr,
            favorable_extreme: position.favorable_extreme,
            closes_against_target: position.closes_against_target,
            market,
        })
    }

    fn giveback(&self) -> f64 {
        self.direction.giveback(self.favorable_extreme, self.close)
    }
}

/// Post-target exit decision engine.
///
/// Rules are evaluated in priority order and the first match wins:
/// same-bar guard, immediate exits, holds, wait, default hold. The second
/// tier adds swing-structure rules and is configured with tighter
/// retracement thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ExitEngine {
    tier: ExitTier,
    config: ExitConfig,
}

impl ExitEngine {
    pub fn first(config: ExitConfig) -> Self {
        Self {
            tier: ExitTier::First,
            config,
        }
    }

    pub fn second(config: ExitConfig) -> Self {
        Self {
            tier: ExitTier::Second,
            config,
        }
    }

    pub fn tier(&self) -> ExitTier {
        self.tier
    }

    pub fn evaluate(&self, ctx: &ExitContext) -> ExitDecision {
        if ctx.bars_held == 0 {
            return ExitDecision::hold(ExitRule::SameBarGuard);
        }

        if let Some(rule) = self.immediate_exit(ctx) {
            tracing::debug!(
                "{:?} exit engine: {} (close={}, target={}, extreme={}, atr={})",
                self.tier,
                rule,
                ctx.close,
                ctx.target,
                ctx.favorable_extreme,
                ctx.atr
            );
            return ExitDecision::exit(rule);
        }

        if let Some(rule) = self.hold_rule(ctx) {
            return ExitDecision::hold(rule);
        }

        if let Some(rule) = wait_rule(ctx) {
            let protective = ctx
                .direction
                .offset(ctx.target, -self.config.shallow_retrace_atr * ctx.atr.max(0.0));
            // A stop at or past the close would fill on the next open
            let suggested = ctx
                .direction
                .is_beyond(ctx.close, protective)
                .then_some(protective);
            return ExitDecision::wait(rule, suggested);
        }

        ExitDecision::hold(ExitRule::NoTrigger)
    }

    fn immediate_exit(&self, ctx: &ExitContext) -> Option<ExitRule> {
        let market = &ctx.market;

        if self.tier == ExitTier::Second && market.structure == Structure::LowerLow {
            return Some(ExitRule::StructuralBreak);
        }
        if market.momentum == Momentum::Broken {
            return Some(ExitRule::MomentumBroken);
        }
        if market.regime.is_hostile(ctx.direction) {
            return Some(ExitRule::RegimeHostile);
        }
        if ctx.closes_against_target >= 2 {
            return Some(ExitRule::TwoClosesAgainstTarget);
        }
        if let Some(giveback_atr) = giveback_in_atr(ctx) {
            if giveback_atr >= self.config.deep_retrace_atr {
                return Some(ExitRule::DeepRetracement);
            }
        }
        None
    }

    fn hold_rule(&self, ctx: &ExitContext) -> Option<ExitRule> {
        let market = &ctx.market;

        if market.momentum == Momentum::Strong && market.regime.is_favorable(ctx.direction) {
            return Some(ExitRule::TrendIntact);
        }
        if let Some(giveback_atr) = giveback_in_atr(ctx) {
            if giveback_atr < self.config.shallow_retrace_atr {
                return Some(ExitRule::ShallowRetracement);
            }
        }
        if self.tier == ExitTier::Second && market.structure == Structure::HigherLows {
            return Some(ExitRule::HigherLowsIntact);
        }
        None
    }
}

fn wait_rule(ctx: &ExitContext) -> Option<ExitRule> {
    if ctx.market.momentum == Momentum::Moderate {
        return Some(ExitRule::MomentumSoftening);
    }
    if ctx.closes_against_target == 1 {
        return Some(ExitRule::FirstCloseAgainstTarget);
    }
    None
}

/// Giveback from the favorable extreme in ATR units. `None` when the
/// volatility measure cannot normalize it.
fn giveback_in_atr(ctx: &ExitContext) -> Option<f64> {
    if !ctx.atr.is_finite() || ctx.atr <= 0.0 {
        return None;
    }
    Some(ctx.giveback() / ctx.atr)
}
