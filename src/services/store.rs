use std::collections::HashMap;

use thiserror::Error;

use crate::models::position::{ClosedTrade, Position};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt record for {symbol}: {reason}")]
    Corrupt { symbol: String, reason: String },
}

/// Durable home of open positions and the closed-trade log.
///
/// Only the engine worker writes through this trait, so implementations need
/// no internal locking beyond what `Send + Sync` requires.
pub trait PositionStore: Send + Sync {
    /// Every open position, one per symbol.
    fn load_positions(&self) -> Result<Vec<Position>, StoreError>;

    /// Insert or replace the open position for `position.symbol`.
    fn save_position(&mut self, position: &Position) -> Result<(), StoreError>;

    fn remove_position(&mut self, symbol: &str) -> Result<(), StoreError>;

    fn append_trade(&mut self, trade: &ClosedTrade) -> Result<(), StoreError>;

    /// Hold an engine-estimated exit until its execution report arrives.
    /// Replaces any earlier pending exit for the same symbol.
    fn save_pending_exit(&mut self, trade: &ClosedTrade) -> Result<(), StoreError>;

    fn take_pending_exit(&mut self, symbol: &str) -> Result<Option<ClosedTrade>, StoreError>;

    fn load_pending_exits(&self) -> Result<Vec<ClosedTrade>, StoreError>;

    /// Close time of the most recent trade on `symbol`, pending exits included.
    fn last_trade_close(&self, symbol: &str) -> Result<Option<u64>, StoreError>;

    /// Up to `limit` closed trades, newest first.
    fn recent_trades(&self, limit: usize) -> Result<Vec<ClosedTrade>, StoreError>;
}

/// In-process store. Records go through serde so a restored position is
/// exactly what a disk-backed store would hand back.
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: HashMap<String, String>,
    pending_exits: HashMap<String, ClosedTrade>,
    trades: Vec<ClosedTrade>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryStore {
    fn load_positions(&self) -> Result<Vec<Position>, StoreError> {
        let mut positions = self
            .positions
            .iter()
            .map(|(symbol, record)| {
                serde_json::from_str::<Position>(record).map_err(|e| StoreError::Corrupt {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    fn save_position(&mut self, position: &Position) -> Result<(), StoreError> {
        let record = serde_json::to_string(position).map_err(|e| StoreError::Corrupt {
            symbol: position.symbol.clone(),
            reason: e.to_string(),
        })?;
        self.positions.insert(position.symbol.clone(), record);
        Ok(())
    }

    fn remove_position(&mut self, symbol: &str) -> Result<(), StoreError> {
        self.positions.remove(symbol);
        Ok(())
    }

    fn append_trade(&mut self, trade: &ClosedTrade) -> Result<(), StoreError> {
        self.trades.push(trade.clone());
        Ok(())
    }

    fn save_pending_exit(&mut self, trade: &ClosedTrade) -> Result<(), StoreError> {
        self.pending_exits.insert(trade.symbol.clone(), trade.clone());
        Ok(())
    }

    fn take_pending_exit(&mut self, symbol: &str) -> Result<Option<ClosedTrade>, StoreError> {
        Ok(self.pending_exits.remove(symbol))
    }

    fn load_pending_exits(&self) -> Result<Vec<ClosedTrade>, StoreError> {
        let mut pending: Vec<ClosedTrade> = self.pending_exits.values().cloned().collect();
        pending.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(pending)
    }

    fn last_trade_close(&self, symbol: &str) -> Result<Option<u64>, StoreError> {
        Ok(self
            .trades
            .iter()
            .chain(self.pending_exits.get(symbol))
            .filter(|trade| trade.symbol == symbol)
            .map(|trade| trade.closed_at_ms)
            .max())
    }

    fn recent_trades(&self, limit: usize) -> Result<Vec<ClosedTrade>, StoreError> {
        Ok(self.trades.iter().rev().take(limit).cloned().collect())
    }
}
