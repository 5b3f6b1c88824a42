use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::models::audit::AuditEntry;
use crate::models::book::BookSnapshot;

/// Read side of the engine: the latest book snapshot, a bounded audit trail,
/// and a broadcaster for stream subscribers. Only the engine worker writes.
#[derive(Debug)]
pub struct BookStateInner {
    pub snapshot: RwLock<BookSnapshot>,
    pub audit: RwLock<VecDeque<AuditEntry>>,
    pub audit_capacity: usize,
    pub broadcaster: broadcast::Sender<BookSnapshot>,
}

pub type SharedBookState = Arc<BookStateInner>;

impl BookStateInner {
    pub fn new(audit_capacity: usize, broadcaster: broadcast::Sender<BookSnapshot>) -> Self {
        Self {
            snapshot: RwLock::new(BookSnapshot::default()),
            audit: RwLock::new(VecDeque::with_capacity(audit_capacity)),
            audit_capacity,
            broadcaster,
        }
    }

    /// Replace the snapshot and notify subscribers.
    pub async fn publish(&self, snapshot: BookSnapshot) {
        let mut current = self.snapshot.write().await;
        *current = snapshot.clone();
        // No subscribers is fine
        let _ = self.broadcaster.send(snapshot);
    }

    pub async fn record_audit(&self, entries: impl IntoIterator<Item = AuditEntry>) {
        let mut audit = self.audit.write().await;
        for entry in entries {
            audit.push_back(entry);
            while audit.len() > self.audit_capacity {
                audit.pop_front();
            }
        }
    }

    /// Up to `limit` audit entries, newest first.
    pub async fn recent_audit(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}
