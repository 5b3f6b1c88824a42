use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::business_logic::config::TradingConfig;
use crate::business_logic::engine::{ClosedBar, TradeEngine};
use crate::business_logic::reconcile::reconcile;
use crate::models::book::{BookSnapshot, PositionStatus};
use crate::models::position::{ClosedTrade, LifecycleState, Position};
use crate::models::requests::{ClosedBarRequest, ExecutionReport};
use crate::services::book_state::SharedBookState;
use crate::services::store::{PositionStore, StoreError};

/// Work items for the engine worker, applied strictly in arrival order.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    BarClosed {
        request: ClosedBarRequest,
        received_at_ms: u64,
    },
    Execution(ExecutionReport),
}

/// The single writer of positions and the store. Owns one engine per symbol.
pub struct EngineWorker<S: PositionStore> {
    config: TradingConfig,
    engines: HashMap<String, TradeEngine>,
    pending_exits: HashMap<String, ClosedTrade>,
    store: S,
    shared_state: SharedBookState,
}

impl<S: PositionStore> EngineWorker<S> {
    pub fn new(config: TradingConfig, store: S, shared_state: SharedBookState) -> Self {
        Self {
            config,
            engines: HashMap::new(),
            pending_exits: HashMap::new(),
            store,
            shared_state,
        }
    }

    /// Resume open positions and unreconciled exits from the store
    pub async fn warmup(&mut self) -> Result<(), StoreError> {
        let positions = self.store.load_positions()?;
        let pending = self.store.load_pending_exits()?;
        tracing::info!(
            "Restoring {} open positions, {} exits awaiting execution",
            positions.len(),
            pending.len()
        );
        self.pending_exits = pending
            .into_iter()
            .map(|trade| (trade.symbol.clone(), trade))
            .collect();

        for position in positions {
            let symbol = position.symbol.clone();
            let last_close = self.store.last_trade_close(&symbol)?;
            let mut engine = TradeEngine::new(&symbol, &self.config);
            engine.restore(Some(position), last_close);
            self.engines.insert(symbol, engine);
        }

        self.update_shared_state().await;
        Ok(())
    }

    /// Apply events until every sender is gone
    pub async fn run(&mut self, mut events: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                tracing::error!("Failed to apply engine event: {}", e);
            }
            self.update_shared_state().await;
        }
        tracing::info!("Event queue closed, engine worker stopping");
    }

    pub async fn handle(&mut self, event: EngineEvent) -> Result<(), StoreError> {
        match event {
            EngineEvent::BarClosed {
                request,
                received_at_ms,
            } => self.process_bar(request, received_at_ms).await,
            EngineEvent::Execution(report) => self.process_execution(report).await,
        }
    }

    async fn process_bar(
        &mut self,
        request: ClosedBarRequest,
        received_at_ms: u64,
    ) -> Result<(), StoreError> {
        let symbol = request.symbol.clone();
        let input = ClosedBar {
            bar: request.bar(),
            pattern: request.pattern,
            market: request.context,
        };

        if !self.engines.contains_key(&symbol) {
            let last_close = self.store.last_trade_close(&symbol)?;
            let mut engine = TradeEngine::new(&symbol, &self.config);
            engine.restore(None, last_close);
            self.engines.insert(symbol.clone(), engine);
        }
        let Some(engine) = self.engines.get_mut(&symbol) else {
            return Ok(());
        };

        let outcome = engine.on_bar(&input, received_at_ms);
        let open = engine.position().cloned();

        // Handle the outcome outside the engine borrow
        self.shared_state.record_audit(outcome.audit).await;
        if !outcome.approved {
            return Ok(());
        }

        if let Some(trade) = outcome.closed {
            self.store.remove_position(&symbol)?;
            if let Some(previous) = self.pending_exits.remove(&symbol) {
                tracing::warn!(
                    "[{}] no execution report for exit at {}; recording engine estimate",
                    symbol,
                    previous.closed_at_ms
                );
                self.store.append_trade(&previous)?;
            }
            // Durable before the report arrives so the cooldown survives a restart
            self.store.save_pending_exit(&trade)?;
            self.pending_exits.insert(symbol.clone(), trade);
        }

        if let Some(position) = open {
            self.store.save_position(&position)?;
        }
        Ok(())
    }

    async fn process_execution(&mut self, report: ExecutionReport) -> Result<(), StoreError> {
        self.pending_exits.remove(&report.symbol);
        let Some(trade) = self.store.take_pending_exit(&report.symbol)? else {
            tracing::warn!(
                "[{}] execution report at {} with no pending exit",
                report.symbol,
                report.close_price
            );
            return Ok(());
        };

        let (trade, correction) = reconcile(trade, report.close_price, report.closed_at_ms);
        if let Some(entry) = correction {
            self.shared_state.record_audit([entry]).await;
        }
        self.store.append_trade(&trade)?;

        tracing::info!(
            "[{}] trade recorded: {} at {}, R={:.2}",
            trade.symbol,
            trade.exit_reason,
            trade.exit_price,
            trade.r_multiple
        );
        Ok(())
    }

    async fn update_shared_state(&self) {
        let mut positions: Vec<PositionStatus> = self
            .engines
            .values()
            .filter_map(|engine| engine.position())
            .map(|position| PositionStatus {
                summary: build_summary(position),
                ..PositionStatus::from(position)
            })
            .collect();

        // Sort by symbol for consistent ordering
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut pending_exits: Vec<ClosedTrade> = self.pending_exits.values().cloned().collect();
        pending_exits.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let recent_trades = match self.store.recent_trades(self.config.recent_trades) {
            Ok(trades) => trades,
            Err(e) => {
                tracing::warn!("Failed to read recent trades: {}", e);
                Vec::new()
            }
        };

        let snapshot = BookSnapshot {
            as_of_ms: chrono::Utc::now().timestamp_millis() as u64,
            positions,
            pending_exits,
            recent_trades,
        };
        self.shared_state.publish(snapshot).await;
    }
}

fn build_summary(position: &Position) -> String {
    let symbol = &position.symbol;
    let direction = position.direction;
    let targets = position.targets();

    match position.state() {
        LifecycleState::InTrade => format!(
            "{symbol}: {direction} from ${}, stop ${}; watching first target ${}.",
            format_price(position.entry_price),
            format_price(position.stop_loss),
            format_price(targets[0])
        ),
        LifecycleState::FirstTargetReached => format!(
            "{symbol}: first target ${} reached {} bars ago; stop ${}, next target ${}.",
            format_price(targets[0]),
            position.bars_since_first,
            format_price(position.stop_loss),
            format_price(targets[1])
        ),
        LifecycleState::SecondTargetReached => format!(
            "{symbol}: second target ${} reached {} bars ago; trailing stop ${}, final target ${}.",
            format_price(targets[1]),
            position.bars_since_second,
            format_price(position.stop_loss),
            format_price(targets[2])
        ),
        LifecycleState::Exited => format!("{symbol}: position closed."),
    }
}

fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditCategory;
    use crate::models::candle::Candle;
    use crate::models::context::MarketContext;
    use crate::models::direction::Direction;
    use crate::models::pattern::Pattern;
    use crate::models::position::ExitReason;
    use crate::services::book_state::BookStateInner;
    use crate::services::store::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    fn shared_state() -> SharedBookState {
        let (tx, _rx) = broadcast::channel(16);
        Arc::new(BookStateInner::new(100, tx))
    }

    fn worker() -> EngineWorker<MemoryStore> {
        EngineWorker::new(TradingConfig::default(), MemoryStore::new(), shared_state())
    }

    fn bar_event(minute: u64, ohlc: [f64; 4], pattern: Option<Pattern>) -> EngineEvent {
        let open_time = minute * 60_000;
        let close_time = open_time + 59_999;
        EngineEvent::BarClosed {
            request: ClosedBarRequest {
                symbol: "ETH".to_string(),
                candle: Candle {
                    open_time,
                    close_time,
                    open: ohlc[0],
                    high: ohlc[1],
                    low: ohlc[2],
                    close: ohlc[3],
                    interval: Some("1m".to_string()),
                },
                fast_ma: ohlc[3],
                slow_ma: 1980.0,
                atr: 10.0,
                pattern,
                context: MarketContext::default(),
            },
            received_at_ms: close_time + 1,
        }
    }

    fn long_pattern() -> Pattern {
        Pattern {
            direction: Direction::Long,
            first_swing: 1950.0,
            second_swing: 1952.0,
            neckline: 2000.5,
            is_valid: true,
            quality: 7.0,
        }
    }

    /// Entry at 2010 with stop 1947.5: targets 2097.5, 2128.75, 2166.25.
    async fn run_to_final_target(worker: &mut EngineWorker<MemoryStore>) {
        let events = [
            bar_event(10, [1995.0, 2011.0, 1990.0, 2010.0], Some(long_pattern())),
            bar_event(11, [2010.0, 2100.0, 2005.0, 2099.0], None),
            bar_event(12, [2099.0, 2130.0, 2095.0, 2129.0], None),
            bar_event(13, [2129.0, 2170.0, 2125.0, 2168.0], None),
        ];
        for event in events {
            worker.handle(event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn entry_is_persisted_and_published() {
        let mut worker = worker();
        worker
            .handle(bar_event(
                10,
                [1995.0, 2011.0, 1990.0, 2010.0],
                Some(long_pattern()),
            ))
            .await
            .unwrap();
        worker.update_shared_state().await;

        let stored = worker.store.load_positions().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].stop_loss, 1947.5);

        let snapshot = worker.shared_state.snapshot.read().await.clone();
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions[0].state, "IN_TRADE");
        assert!(snapshot.positions[0].summary.contains("first target"));
    }

    #[tokio::test]
    async fn final_target_waits_for_execution_then_corrects() {
        let mut worker = worker();
        run_to_final_target(&mut worker).await;

        assert!(worker.store.load_positions().unwrap().is_empty());
        let pending = worker.pending_exits.get("ETH").unwrap();
        assert_eq!(pending.exit_reason, ExitReason::FinalTarget);
        assert!(worker.store.recent_trades(10).unwrap().is_empty());

        worker
            .handle(EngineEvent::Execution(ExecutionReport {
                symbol: "ETH".to_string(),
                close_price: 2160.0,
                closed_at_ms: 900_000,
            }))
            .await
            .unwrap();

        let trades = worker.store.recent_trades(10).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::ProtectiveExit);
        assert_eq!(trades[0].exit_price, 2160.0);
        assert!(worker.pending_exits.is_empty());

        let audit = worker.shared_state.recent_audit(10).await;
        assert_eq!(audit[0].category, AuditCategory::ExitCorrection);
    }

    #[tokio::test]
    async fn intermediate_state_survives_restart() {
        let store = {
            let mut worker = worker();
            worker
                .handle(bar_event(
                    10,
                    [1995.0, 2011.0, 1990.0, 2010.0],
                    Some(long_pattern()),
                ))
                .await
                .unwrap();
            worker
                .handle(bar_event(11, [2010.0, 2100.0, 2005.0, 2099.0], None))
                .await
                .unwrap();
            worker.store
        };

        let mut restarted = EngineWorker::new(TradingConfig::default(), store, shared_state());
        restarted.warmup().await.unwrap();
        let position = restarted.engines["ETH"].position().unwrap();
        assert_eq!(position.state(), LifecycleState::FirstTargetReached);
        assert_eq!(position.bars_since_first, 0);
        assert!((position.stop_loss - 2013.125).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cooldown_and_pending_exit_survive_restart() {
        let store = {
            let mut worker = worker();
            worker
                .handle(bar_event(
                    10,
                    [1995.0, 2011.0, 1990.0, 2010.0],
                    Some(long_pattern()),
                ))
                .await
                .unwrap();
            // Stopped out; no execution report before the restart
            worker
                .handle(bar_event(11, [2005.0, 2006.0, 1940.0, 1945.0], None))
                .await
                .unwrap();
            assert_eq!(worker.engines["ETH"].last_trade_close_ms(), Some(719_999));
            worker.store
        };

        let mut restarted = EngineWorker::new(TradingConfig::default(), store, shared_state());
        restarted.warmup().await.unwrap();
        assert_eq!(restarted.store.last_trade_close("ETH").unwrap(), Some(719_999));
        assert_eq!(
            restarted.pending_exits.get("ETH").map(|t| t.exit_reason),
            Some(ExitReason::StopLoss)
        );

        restarted
            .handle(bar_event(
                12,
                [1995.0, 2011.0, 1990.0, 2010.0],
                Some(long_pattern()),
            ))
            .await
            .unwrap();
        assert!(restarted.store.load_positions().unwrap().is_empty());
        let audit = restarted.shared_state.recent_audit(10).await;
        assert!(audit.iter().any(|entry| entry.code == "COOLDOWN_ACTIVE"));

        restarted
            .handle(EngineEvent::Execution(ExecutionReport {
                symbol: "ETH".to_string(),
                close_price: 1947.0,
                closed_at_ms: 720_000,
            }))
            .await
            .unwrap();
        let trades = restarted.store.recent_trades(10).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_price, 1947.0);
        assert!(restarted.store.load_pending_exits().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_bar_is_audited_and_changes_nothing() {
        let mut worker = worker();
        let mut event = bar_event(10, [1995.0, 2011.0, 1990.0, 2010.0], Some(long_pattern()));
        if let EngineEvent::BarClosed { received_at_ms, .. } = &mut event {
            // Still forming
            *received_at_ms -= 1;
        }
        worker.handle(event).await.unwrap();

        assert!(worker.store.load_positions().unwrap().is_empty());
        let audit = worker.shared_state.recent_audit(10).await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].code, "BAR_STILL_FORMING");
    }

    #[tokio::test]
    async fn stray_execution_report_is_ignored() {
        let mut worker = worker();
        worker
            .handle(EngineEvent::Execution(ExecutionReport {
                symbol: "BTC".to_string(),
                close_price: 1.0,
                closed_at_ms: 1,
            }))
            .await
            .unwrap();
        assert!(worker.store.recent_trades(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_drains_queue_in_order() {
        let state = shared_state();
        let mut worker = EngineWorker::new(TradingConfig::default(), MemoryStore::new(), state.clone());
        let mut updates = state.broadcaster.subscribe();
        let (tx, rx) = mpsc::channel(8);

        tx.send(bar_event(
            10,
            [1995.0, 2011.0, 1990.0, 2010.0],
            Some(long_pattern()),
        ))
        .await
        .unwrap();
        tx.send(bar_event(11, [2010.0, 2100.0, 2005.0, 2099.0], None))
            .await
            .unwrap();
        drop(tx);

        worker.run(rx).await;

        let first = updates.recv().await.unwrap();
        assert_eq!(first.positions[0].state, "IN_TRADE");
        let second = updates.recv().await.unwrap();
        assert_eq!(second.positions[0].state, "FIRST_TARGET_REACHED");
    }
}
