use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use crate::core::types::AcceptedEntry;

/// What happened to the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Cleared,
}

/// Notification fired after every result-set mutation, carrying the full ordered view
#[derive(Debug, Clone)]
pub struct ResultChanged {
    pub kind: ChangeKind,
    pub snapshot: Arc<Vec<AcceptedEntry>>,
}

#[derive(Debug, Clone)]
pub struct ResultBus {
    tx: broadcast::Sender<ResultChanged>,
}

impl ResultBus {
    #[instrument]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        debug!("ResultBus initialized with capacity: {}", capacity);
        Self { tx }
    }

    /// Lagging or absent subscribers never block the publisher
    pub fn publish(&self, kind: ChangeKind, snapshot: Vec<AcceptedEntry>) {
        let size = snapshot.len();
        let event = ResultChanged {
            kind,
            snapshot: Arc::new(snapshot),
        };
        match self.tx.send(event) {
            Ok(subscriber_count) => trace!(
                kind = ?kind,
                size = size,
                subscriber_count = subscriber_count,
                "Published result change"
            ),
            Err(_) => trace!(kind = ?kind, size = size, "No result subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResultChanged> {
        debug!("New subscriber added to result bus");
        self.tx.subscribe()
    }
}
