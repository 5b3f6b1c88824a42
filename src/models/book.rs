use serde::Serialize;
use utoipa::ToSchema;

use crate::models::audit::AuditEntry;
use crate::models::direction::Direction;
use crate::models::position::{ClosedTrade, Position};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PositionStatus {
    pub symbol: String,
    pub state: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub targets: [f64; 3],
    pub bars_since_first: u32,
    pub bars_since_second: u32,
    pub last_transition_ms: u64,
    pub summary: String,
}

impl From<&Position> for PositionStatus {
    fn from(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            state: position.state().into(),
            direction: position.direction,
            entry_price: position.entry_price,
            stop_loss: position.stop_loss,
            targets: position.targets(),
            bars_since_first: position.bars_since_first,
            bars_since_second: position.bars_since_second,
            last_transition_ms: position.last_transition_ms,
            summary: String::new(),
        }
    }
}

/// Everything a reader needs about the book at one instant.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BookSnapshot {
    pub as_of_ms: u64,
    pub positions: Vec<PositionStatus>,
    /// Closed by the engine, awaiting an execution report
    pub pending_exits: Vec<ClosedTrade>,
    /// Most recent reconciled trades, newest first
    pub recent_trades: Vec<ClosedTrade>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditResponse {
    pub entries: Vec<AuditEntry>,
}
