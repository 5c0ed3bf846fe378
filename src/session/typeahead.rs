use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use super::SessionEvent;
use crate::backend::SearchBackend;

#[derive(Default)]
struct Inner {
    /// Latest text typed into the query box.
    latest: String,
    suggestions: Vec<String>,
    timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Debounced query-box suggestions. Each keystroke reschedules a single
/// fetch; a response only lands if its input is still the latest.
pub struct Typeahead {
    backend: Arc<dyn SearchBackend>,
    events: broadcast::Sender<SessionEvent>,
    tasks: TaskTracker,
    debounce: Duration,
    inner: Mutex<Inner>,
}

impl Typeahead {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        events: broadcast::Sender<SessionEvent>,
        tasks: TaskTracker,
        debounce: Duration,
    ) -> Self {
        Self {
            backend,
            events,
            tasks,
            debounce,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.inner.lock().suggestions.clone()
    }

    pub fn input(self: &Arc<Self>, text: &str) {
        let prefix = text.trim().to_string();
        {
            let mut inner = self.inner.lock();
            inner.cancel_timer();
            inner.latest = prefix.clone();
            if prefix.is_empty() {
                let had_any = !inner.suggestions.is_empty();
                inner.suggestions.clear();
                drop(inner);
                if had_any {
                    self.notify();
                }
                return;
            }
        }

        let this = Arc::clone(self);
        let debounce = self.debounce;
        let handle = self.tasks.spawn(async move {
            tokio::time::sleep(debounce).await;
            this.load(prefix).await;
        });
        self.inner.lock().timer = Some(handle);
    }

    async fn load(&self, prefix: String) {
        let result = self.backend.suggestions(&prefix).await;

        let mut inner = self.inner.lock();
        if inner.latest != prefix {
            tracing::debug!("Dropping suggestions for outdated input {prefix:?}");
            return;
        }
        match result {
            Ok(suggestions) => inner.suggestions = suggestions,
            Err(e) => {
                tracing::warn!("Suggestions failed for {prefix:?}: {e:#}");
                inner.suggestions.clear();
            }
        }
        drop(inner);
        self.notify();
    }

    /// Hide the dropdown and cancel any scheduled fetch.
    pub fn dismiss(&self) {
        let had_any = {
            let mut inner = self.inner.lock();
            inner.cancel_timer();
            inner.latest.clear();
            !std::mem::take(&mut inner.suggestions).is_empty()
        };
        if had_any {
            self.notify();
        }
    }

    pub fn cancel_pending(&self) {
        self.inner.lock().cancel_timer();
    }

    fn notify(&self) {
        let _ = self.events.send(SessionEvent::SuggestionsUpdated);
    }
}
