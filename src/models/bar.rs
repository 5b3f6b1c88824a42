use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::candle::Candle;

/// A closed price bar together with the trend and volatility fields the
/// indicator collaborator computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bar {
    pub open_time: u64,
    /// Last millisecond covered by the bar (inclusive)
    pub close_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Fast trend average
    pub fast_ma: f64,
    /// Slow trend average
    pub slow_ma: f64,
    /// Volatility measure (ATR)
    pub atr: f64,
}

impl Bar {
    pub fn from_candle(candle: &Candle, fast_ma: f64, slow_ma: f64, atr: f64) -> Self {
        Self {
            open_time: candle.open_time,
            close_time: candle.close_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            fast_ma,
            slow_ma,
            atr,
        }
    }

    /// High-low range of the bar
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Length of the bar interval in milliseconds
    pub fn interval_ms(&self) -> u64 {
        self.close_time.saturating_sub(self.open_time) + 1
    }

    /// True once the bar's interval has fully elapsed at `now_ms`.
    pub fn is_closed_at(&self, now_ms: u64) -> bool {
        now_ms > self.close_time
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Bar;

    /// One-minute bar starting at `minute` with neutral indicator fields.
    pub fn bar_at(minute: u64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            open_time: minute * 60_000,
            close_time: minute * 60_000 + 59_999,
            open,
            high,
            low,
            close,
            fast_ma: close,
            slow_ma: close,
            atr: 10.0,
        }
    }
}
