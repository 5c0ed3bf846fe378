use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::AuthContext;
use crate::backend::AccountBackend;
use crate::models::HistoryEntry;
use crate::session::QueryRecorder;

/// The logged-in user's saved queries, cached locally.
///
/// Every operation is a silent no-op without a token; failures are logged
/// and leave the cache untouched.
pub struct SearchHistory {
    backend: Arc<dyn AccountBackend>,
    auth: Arc<AuthContext>,
    entries: RwLock<Vec<HistoryEntry>>,
}

impl SearchHistory {
    pub fn new(backend: Arc<dyn AccountBackend>, auth: Arc<AuthContext>) -> Self {
        Self {
            backend,
            auth,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().clone()
    }

    pub async fn refresh(&self) {
        let Some(token) = self.auth.token() else {
            return;
        };
        match self.backend.list_history(&token).await {
            Ok(entries) => *self.entries.write() = entries,
            Err(e) => tracing::warn!("Failed to fetch history: {e:#}"),
        }
    }

    pub async fn add(&self, query: &str) {
        if query.is_empty() {
            return;
        }
        let Some(token) = self.auth.token() else {
            return;
        };
        match self.backend.add_history(&token, query).await {
            Ok(()) => self.refresh().await,
            Err(e) => tracing::warn!("Failed to add to history: {e:#}"),
        }
    }

    pub async fn remove(&self, id: u64) {
        let Some(token) = self.auth.token() else {
            return;
        };
        match self.backend.remove_history(&token, id).await {
            Ok(()) => self.entries.write().retain(|entry| entry.id != id),
            Err(e) => tracing::warn!("Failed to remove history entry {id}: {e:#}"),
        }
    }

    pub async fn clear(&self) {
        let Some(token) = self.auth.token() else {
            return;
        };
        match self.backend.clear_history(&token).await {
            Ok(()) => self.entries.write().clear(),
            Err(e) => tracing::warn!("Failed to clear history: {e:#}"),
        }
    }

    /// Drop the cache, e.g. after logout.
    pub fn forget(&self) {
        self.entries.write().clear();
    }
}

#[async_trait]
impl QueryRecorder for SearchHistory {
    async fn record(&self, query: &str) {
        self.add(query).await;
    }
}
