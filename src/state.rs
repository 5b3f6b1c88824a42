use tokio::sync::mpsc;

use crate::services::book_state::SharedBookState;
use crate::services::engine_worker::EngineEvent;

#[derive(Clone)]
pub struct AppState {
    pub book: SharedBookState,
    /// Producer side of the engine worker's queue
    pub events: mpsc::Sender<EngineEvent>,
}
