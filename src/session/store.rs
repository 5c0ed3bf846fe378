use tokio::sync::watch;

use crate::models::QueryTuple;

/// What the store currently holds. `revision` increases on every write,
/// including writes that repeat the previous tuple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub tuple: Option<QueryTuple>,
    pub revision: u64,
}

/// Result of a `set_query` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryChange {
    pub tuple: QueryTuple,
    pub revision: u64,
    /// The text differs from the previous tuple's text.
    pub identity_changed: bool,
}

/// Single source of truth for the active query tuple.
pub struct QueryStore {
    tx: watch::Sender<QuerySnapshot>,
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(QuerySnapshot::default());
        Self { tx }
    }

    pub fn current(&self) -> Option<QueryTuple> {
        self.tx.borrow().tuple.clone()
    }

    pub fn text(&self) -> Option<String> {
        self.tx.borrow().tuple.as_ref().map(|t| t.text.clone())
    }

    pub fn revision(&self) -> u64 {
        self.tx.borrow().revision
    }

    /// Whether `revision` is still the latest write.
    pub fn is_current(&self, revision: u64) -> bool {
        self.tx.borrow().revision == revision
    }

    /// Replace the tuple. Every call is a distinct write; nothing is coalesced.
    pub fn set_query(&self, tuple: QueryTuple) -> QueryChange {
        let mut identity_changed = false;
        let mut revision = 0;
        self.tx.send_modify(|snap| {
            identity_changed = snap
                .tuple
                .as_ref()
                .map_or(true, |prev| !prev.same_identity(&tuple));
            snap.revision += 1;
            snap.tuple = Some(tuple.clone());
            revision = snap.revision;
        });

        if identity_changed {
            tracing::info!("New search identity: {:?}", tuple.text);
        }

        QueryChange {
            tuple,
            revision,
            identity_changed,
        }
    }
}
