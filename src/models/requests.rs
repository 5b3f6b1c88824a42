use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::bar::Bar;
use crate::models::candle::Candle;
use crate::models::context::MarketContext;
use crate::models::interval::check_interval_span;
use crate::models::pattern::Pattern;

/// A closed candle plus everything the decision core needs alongside it.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_candle_interval"))]
pub struct ClosedBarRequest {
    #[validate(length(min = 1, max = 24))]
    #[schema(example = "ETH")]
    pub symbol: String,
    pub candle: Candle,
    /// Fast trend average at the candle close
    pub fast_ma: f64,
    /// Slow trend average at the candle close
    pub slow_ma: f64,
    /// Volatility measure (ATR) at the candle close
    pub atr: f64,
    /// Pattern detected on this candle, if any
    #[serde(default)]
    #[validate(nested)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub context: MarketContext,
}

impl ClosedBarRequest {
    pub fn bar(&self) -> Bar {
        Bar::from_candle(&self.candle, self.fast_ma, self.slow_ma, self.atr)
    }
}

fn validate_candle_interval(request: &ClosedBarRequest) -> Result<(), ValidationError> {
    match request.candle.interval.as_deref() {
        Some(interval) => check_interval_span(
            interval,
            request.candle.open_time,
            request.candle.close_time,
        ),
        None => Ok(()),
    }
}

/// Fill reported by the execution side once a position has been closed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExecutionReport {
    #[validate(length(min = 1, max = 24))]
    #[schema(example = "ETH")]
    pub symbol: String,
    pub close_price: f64,
    pub closed_at_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000))]
    #[param(example = 100, default = 100)]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Body returned when an event has been queued for the engine.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcceptedResponse {
    pub status: String,
}

impl AcceptedResponse {
    pub fn queued() -> Self {
        Self {
            status: "queued".to_string(),
        }
    }
}
