use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;

use super::store::{QueryChange, QueryStore};
use crate::backend::SearchBackend;
use crate::models::ResultSet;

/// Receives the "record this query" side effect of a successful first-page fetch.
#[async_trait]
pub trait QueryRecorder: Send + Sync {
    async fn record(&self, query: &str);
}

/// What the view renders: the current result set and whether a fetch is pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub loading: bool,
    pub results: Arc<ResultSet>,
    /// Store revision the results belong to.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded(Arc<ResultSet>),
    /// The backend failed; an empty result set was installed.
    Failed,
    /// A newer query was set while this fetch was outstanding.
    Stale,
}

pub struct ResultFetcher {
    backend: Arc<dyn SearchBackend>,
    store: Arc<QueryStore>,
    recorder: Option<Arc<dyn QueryRecorder>>,
    tasks: TaskTracker,
    state: watch::Sender<FetchState>,
}

impl ResultFetcher {
    pub fn new(backend: Arc<dyn SearchBackend>, store: Arc<QueryStore>, tasks: TaskTracker) -> Self {
        let (state, _rx) = watch::channel(FetchState::default());
        Self {
            backend,
            store,
            recorder: None,
            tasks,
            state,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn QueryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn results(&self) -> Arc<ResultSet> {
        self.state.borrow().results.clone()
    }

    /// Run one fetch cycle for `change`. Only the response for the store's
    /// latest revision is installed.
    pub async fn fetch(&self, change: &QueryChange) -> FetchOutcome {
        let tuple = &change.tuple;

        if !tuple.is_text_query() {
            let empty = Arc::new(ResultSet::empty());
            return if self.install(change.revision, empty.clone()) {
                FetchOutcome::Loaded(empty)
            } else {
                FetchOutcome::Stale
            };
        }

        self.state.send_modify(|s| s.loading = true);
        tracing::debug!(
            "Fetching {:?} page {} (rev {})",
            tuple.text,
            tuple.page,
            change.revision
        );

        let result = self.backend.search(tuple).await;

        if !self.store.is_current(change.revision) {
            tracing::debug!(
                "Discarding stale results for {:?} (rev {})",
                tuple.text,
                change.revision
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(set) => {
                let set = Arc::new(set);
                tracing::info!(
                    "Loaded {} results for {:?} (total {}, {} pages)",
                    set.items.len(),
                    tuple.text,
                    set.total,
                    set.total_pages
                );
                self.publish(change.revision, set.clone());
                if tuple.page == 1 {
                    self.record(&tuple.text);
                }
                FetchOutcome::Loaded(set)
            }
            Err(e) => {
                tracing::warn!("Search failed for {:?}: {e:#}", tuple.text);
                self.publish(change.revision, Arc::new(ResultSet::empty()));
                FetchOutcome::Failed
            }
        }
    }

    /// Install a result set obtained elsewhere (image search, a history
    /// frame) if `revision` is still current.
    pub fn install(&self, revision: u64, results: Arc<ResultSet>) -> bool {
        if !self.store.is_current(revision) {
            return false;
        }
        self.publish(revision, results);
        true
    }

    fn publish(&self, revision: u64, results: Arc<ResultSet>) {
        self.state.send_replace(FetchState {
            loading: false,
            results,
            revision,
        });
    }

    fn record(&self, query: &str) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let query = query.to_string();
        self.tasks.spawn(async move {
            recorder.record(&query).await;
        });
    }
}
