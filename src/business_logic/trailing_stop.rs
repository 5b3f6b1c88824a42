use crate::business_logic::config::TrailingConfig;
use crate::models::bar::Bar;
use crate::models::context::MarketContext;
use crate::models::direction::Direction;
use crate::models::position::{LifecycleState, Position};

/// Tightens the protective stop whenever the lifecycle advances.
#[derive(Debug, Clone)]
pub struct TrailingStop {
    config: TrailingConfig,
}

impl TrailingStop {
    pub fn new(config: TrailingConfig) -> Self {
        Self { config }
    }

    /// Stop for `position` after it advanced on `bar`. Never looser than the
    /// position's current stop.
    pub fn on_advance(&self, position: &Position, bar: &Bar, market: &MarketContext) -> f64 {
        let direction = position.direction;
        let risk = position.risk_per_unit();

        let proposed = match position.state() {
            LifecycleState::FirstTargetReached => {
                direction.offset(position.entry_price, self.config.first_lock_in_r * risk)
            }
            LifecycleState::SecondTargetReached => {
                let floor =
                    direction.offset(position.entry_price, self.config.second_lock_in_r * risk);
                let behind_price =
                    direction.offset(bar.close, -self.config.price_offset_atr * bar.atr);
                let behind_swing = market
                    .swing_reference
                    .map(|swing| direction.offset(swing, -self.config.swing_offset_atr * bar.atr));

                let wider = [Some(behind_price), behind_swing]
                    .into_iter()
                    .flatten()
                    .filter(|price| price.is_finite())
                    .reduce(|a, b| direction.worse(a, b));

                match wider {
                    Some(trail) => direction.better(trail, floor),
                    None => floor,
                }
            }
            _ => return position.stop_loss,
        };

        let stop = ratchet(direction, position.stop_loss, proposed);
        tracing::debug!(
            "[{}] trailing stop {} -> {} (proposed {})",
            position.symbol,
            position.stop_loss,
            stop,
            proposed
        );
        stop
    }
}

/// Apply `proposed` only if it tightens `current`.
pub fn ratchet(direction: Direction, current: f64, proposed: f64) -> f64 {
    if !proposed.is_finite() {
        return current;
    }
    direction.better(current, proposed)
}
