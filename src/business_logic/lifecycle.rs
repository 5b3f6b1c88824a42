use crate::models::bar::Bar;
use crate::models::position::{LifecycleState, Position};

/// What happened to a position on one closed bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionEvent {
    Unchanged,
    StopLossHit { stop: f64 },
    TargetReached { state: LifecycleState, target: f64 },
    FinalTargetHit { target: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub position: Position,
    pub event: TransitionEvent,
}

/// Step `position` through one closed bar.
///
/// The stop is checked first and wins over any target touched by the same
/// bar. At most one target is consumed per bar even if the bar spans several.
pub fn advance(position: &Position, bar: &Bar) -> Transition {
    let mut next = position.clone();

    let Some(target_idx) = next.state().pending_target() else {
        return Transition {
            position: next,
            event: TransitionEvent::Unchanged,
        };
    };

    let direction = next.direction;
    if !direction.is_beyond(direction.adverse_extreme(bar), next.stop_loss) {
        let stop = next.stop_loss;
        next.close(bar.close_time);
        tracing::debug!(
            "[{}] stop {} touched (bar low={}, high={})",
            next.symbol,
            stop,
            bar.low,
            bar.high
        );
        return Transition {
            position: next,
            event: TransitionEvent::StopLossHit { stop },
        };
    }

    age(&mut next, bar);

    let target = next.targets()[target_idx];
    if !direction.reaches(direction.favorable_extreme(bar), target) {
        return Transition {
            position: next,
            event: TransitionEvent::Unchanged,
        };
    }

    let event = match next.promote(bar.close_time) {
        Some(LifecycleState::Exited) => TransitionEvent::FinalTargetHit { target },
        Some(state) => {
            next.favorable_extreme = direction.favorable_extreme(bar);
            next.closes_against_target = u32::from(!direction.reaches(bar.close, target));
            TransitionEvent::TargetReached { state, target }
        }
        None => TransitionEvent::Unchanged,
    };

    tracing::debug!(
        "[{}] target {} reached -> {}",
        next.symbol,
        target,
        String::from(next.state())
    );

    Transition {
        position: next,
        event,
    }
}

/// Account for one more closed bar in the current state.
fn age(position: &mut Position, bar: &Bar) {
    match position.state() {
        LifecycleState::FirstTargetReached => {
            position.bars_since_first = position.bars_since_first.saturating_add(1);
        }
        LifecycleState::SecondTargetReached => {
            position.bars_since_first = position.bars_since_first.saturating_add(1);
            position.bars_since_second = position.bars_since_second.saturating_add(1);
        }
        _ => {}
    }

    let direction = position.direction;
    position.favorable_extreme =
        direction.better(position.favorable_extreme, direction.favorable_extreme(bar));

    if let Some(reached) = position.reached_target() {
        if direction.reaches(bar.close, reached) {
            position.closes_against_target = 0;
        } else {
            position.closes_against_target = position.closes_against_target.saturating_add(1);
        }
    }
}
