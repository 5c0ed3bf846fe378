//! The search session: one active query and everything derived from it.
//!
//! ```text
//! submit / branch / refine / go back
//!         │
//!   QueryStore::set_query ──(identity changed)──► reset summary, questions,
//!         │                                        assistant, question signal
//!   ResultFetcher::fetch
//!         │ (still current)
//!   ├─► SummaryController::generate   ─┐  spawned, at most once per query
//!   ├─► QuestionsController::generate ─┘
//!   └─► Assistant::on_results (greet if open)
//! ```

pub mod assistant;
pub mod fetcher;
pub mod generation;
pub mod navigation;
pub mod questions;
pub mod signal;
pub mod store;
pub mod summary;
pub mod typeahead;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use base64::prelude::*;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::backend::{LlmBackend, SearchBackend};
use crate::config::Config;
use crate::models::{HistoryFrame, QueryTuple, ResultSet, IMAGE_SEARCH_SENTINEL};

pub use assistant::{Assistant, AssistantView, ChatContext, Panel, RefineOutcome, SendOutcome};
pub use fetcher::{FetchOutcome, FetchState, QueryRecorder, ResultFetcher};
pub use generation::{DerivedInput, GenerationOutcome, GenerationStatus, SkipReason, Ticket};
pub use navigation::HistoryStack;
pub use questions::{QuestionsController, QuestionsState};
pub use signal::QuestionSignal;
pub use store::{QueryChange, QueryStore};
pub use summary::{SummaryController, SummaryState};
pub use typeahead::Typeahead;

const EVENT_CAPACITY: usize = 64;

/// State transitions a view layer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    QueryChanged {
        tuple: QueryTuple,
        identity_changed: bool,
    },
    ResultsLoaded {
        revision: u64,
        total: u64,
        failed: bool,
    },
    SummaryUpdated,
    QuestionsUpdated,
    /// Transcript, staged input or panel state changed.
    AssistantUpdated,
    SuggestionsUpdated,
    HistoryChanged {
        depth: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub page_size: u32,
    pub image_top_k: u32,
    pub typeahead_debounce: Duration,
    pub external_question_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            image_top_k: config.image_top_k,
            typeahead_debounce: config.typeahead_debounce(),
            external_question_delay: config.external_question_delay(),
        }
    }
}

pub struct SessionBackends {
    pub search: Arc<dyn SearchBackend>,
    pub llm: Arc<dyn LlmBackend>,
    /// Where successful first-page queries get recorded, if anywhere.
    pub recorder: Option<Arc<dyn QueryRecorder>>,
}

pub struct SearchSession {
    settings: SessionSettings,
    search: Arc<dyn SearchBackend>,
    store: Arc<QueryStore>,
    fetcher: ResultFetcher,
    summary: Arc<SummaryController>,
    questions: Arc<QuestionsController>,
    assistant: Arc<Assistant>,
    typeahead: Arc<Typeahead>,
    signal: Arc<QuestionSignal>,
    history: Mutex<HistoryStack>,
    events: broadcast::Sender<SessionEvent>,
    tasks: TaskTracker,
}

impl SearchSession {
    pub fn new(backends: SessionBackends, settings: SessionSettings) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        let tasks = TaskTracker::new();
        let store = Arc::new(QueryStore::new());

        let mut fetcher = ResultFetcher::new(backends.search.clone(), store.clone(), tasks.clone());
        if let Some(recorder) = backends.recorder {
            fetcher = fetcher.with_recorder(recorder);
        }

        Self {
            summary: Arc::new(SummaryController::new(backends.llm.clone(), events.clone())),
            questions: Arc::new(QuestionsController::new(backends.llm.clone(), events.clone())),
            assistant: Arc::new(Assistant::new(
                backends.llm,
                events.clone(),
                tasks.clone(),
                settings.external_question_delay,
            )),
            typeahead: Arc::new(Typeahead::new(
                backends.search.clone(),
                events.clone(),
                tasks.clone(),
                settings.typeahead_debounce,
            )),
            search: backends.search,
            signal: Arc::new(QuestionSignal::new()),
            history: Mutex::new(HistoryStack::new()),
            settings,
            store,
            fetcher,
            events,
            tasks,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ─── Queries ─────────────────────────────────────────

    pub fn query(&self) -> Option<QueryTuple> {
        self.store.current()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.fetcher.state()
    }

    pub fn results(&self) -> Arc<ResultSet> {
        self.fetcher.results()
    }

    /// Submit typed text as a new first-page search. Blank text is ignored.
    pub async fn submit(&self, text: &str) -> Option<FetchOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.typeahead.dismiss();
        Some(
            self.set_query(QueryTuple::first_page(text, self.settings.page_size))
                .await,
        )
    }

    /// Replace the active tuple and run one fetch cycle for it.
    pub async fn set_query(&self, tuple: QueryTuple) -> FetchOutcome {
        let change = self.apply_query(tuple);
        let outcome = self.fetcher.fetch(&change).await;
        self.on_fetched(change.revision, &outcome);
        outcome
    }

    /// Move to page `page` of the active text query.
    pub async fn change_page(&self, page: u32) -> Option<FetchOutcome> {
        let current = self.store.current().filter(QueryTuple::is_text_query)?;
        if page == current.page {
            return None;
        }
        Some(self.set_query(current.with_page(page)).await)
    }

    /// Search by image. On success the sentinel becomes the active query
    /// and the returned results are installed as-is.
    pub async fn search_by_image(&self, bytes: &[u8], mime: &str) -> Result<Arc<ResultSet>> {
        let data_url = format!("data:{mime};base64,{}", BASE64_STANDARD.encode(bytes));
        let set = Arc::new(
            self.search
                .image_search(&data_url, self.settings.image_top_k)
                .await?,
        );
        tracing::info!("Image search returned {} results", set.items.len());

        let change = self.apply_query(QueryTuple::first_page(
            IMAGE_SEARCH_SENTINEL,
            self.settings.page_size,
        ));
        self.install(change.revision, set.clone());
        Ok(set)
    }

    fn apply_query(&self, tuple: QueryTuple) -> QueryChange {
        let change = self.store.set_query(tuple);
        self.emit(SessionEvent::QueryChanged {
            tuple: change.tuple.clone(),
            identity_changed: change.identity_changed,
        });
        if change.identity_changed {
            tracing::debug!("Resetting derived state for {:?}", change.tuple.text);
            self.summary.reset();
            self.questions.reset();
            self.assistant.reset();
            self.signal.clear();
        }
        change
    }

    fn install(&self, revision: u64, set: Arc<ResultSet>) {
        let outcome = if self.fetcher.install(revision, set.clone()) {
            FetchOutcome::Loaded(set)
        } else {
            FetchOutcome::Stale
        };
        self.on_fetched(revision, &outcome);
    }

    fn on_fetched(&self, revision: u64, outcome: &FetchOutcome) {
        let (total, failed) = match outcome {
            FetchOutcome::Loaded(set) => (set.total, false),
            FetchOutcome::Failed => (0, true),
            FetchOutcome::Stale => return,
        };
        self.emit(SessionEvent::ResultsLoaded {
            revision,
            total,
            failed,
        });
        self.evaluate_derived();
        self.assistant.on_results(&self.chat_context());
    }

    // ─── Derived content ─────────────────────────────────

    fn derived_input(&self) -> DerivedInput {
        let state = self.fetcher.state();
        DerivedInput {
            query: self.store.text(),
            loading: state.loading || state.revision != self.store.revision(),
            results: state.results,
        }
    }

    /// Claim summary and question generation for the settled results, then
    /// run the granted calls in the background. Tickets are claimed here,
    /// before anything is spawned, so a later identity change always
    /// invalidates them.
    fn evaluate_derived(&self) {
        let input = self.derived_input();

        if let Ok(ticket) = self.summary.begin(&input, false) {
            let summary = self.summary.clone();
            self.tasks.spawn(async move {
                summary.run(ticket).await;
            });
        }

        if let Ok(ticket) = self.questions.begin(&input, false) {
            let questions = self.questions.clone();
            self.tasks.spawn(async move {
                questions.run(ticket).await;
            });
        }
    }

    pub fn summary(&self) -> SummaryState {
        self.summary.state()
    }

    pub fn questions(&self) -> QuestionsState {
        self.questions.state()
    }

    pub async fn regenerate_summary(&self) -> GenerationOutcome {
        self.summary.generate(&self.derived_input(), true).await
    }

    pub async fn regenerate_questions(&self) -> GenerationOutcome {
        self.questions.generate(&self.derived_input(), true).await
    }

    // ─── Branching and navigation ────────────────────────

    /// Branch into a suggested question: remember where we were, then
    /// search for `question`.
    pub async fn select_question(&self, question: &str) -> Option<FetchOutcome> {
        self.branch(question).await
    }

    /// Branch into a related keyword search from the summary panel.
    pub async fn select_related_search(&self, keywords: &str) -> Option<FetchOutcome> {
        self.branch(keywords).await
    }

    async fn branch(&self, text: &str) -> Option<FetchOutcome> {
        if text.trim().is_empty() {
            return None;
        }
        if let Some(current) = self.store.current() {
            let frame = HistoryFrame {
                query: current.text,
                result_set: self.fetcher.results(),
                page: current.page,
            };
            let depth = {
                let mut history = self.history.lock();
                history.push(frame);
                history.len()
            };
            self.emit(SessionEvent::HistoryChanged { depth });
        }
        self.submit(text).await
    }

    pub fn can_go_back(&self) -> bool {
        self.history.lock().can_go_back()
    }

    /// Return to the query saved by the most recent branch. `None` when
    /// there is nothing to go back to.
    pub async fn go_back(&self) -> Option<FetchOutcome> {
        let (frame, depth) = {
            let mut history = self.history.lock();
            let frame = history.pop()?;
            (frame, history.len())
        };
        self.emit(SessionEvent::HistoryChanged { depth });

        let tuple = QueryTuple::new(frame.query, frame.page, self.settings.page_size);
        if tuple.is_sentinel() {
            let change = self.apply_query(tuple);
            self.install(change.revision, frame.result_set.clone());
            return Some(FetchOutcome::Loaded(frame.result_set));
        }
        Some(self.set_query(tuple).await)
    }

    // ─── Assistant ───────────────────────────────────────

    /// What the assistant sees right now: the active query and results.
    pub fn chat_context(&self) -> ChatContext {
        ChatContext {
            query: self.store.text(),
            results: self.fetcher.results(),
        }
    }

    pub fn assistant(&self) -> AssistantView {
        self.assistant.view()
    }

    pub fn open_assistant(&self) {
        self.assistant.open(&self.chat_context());
    }

    pub fn close_assistant(&self) {
        self.assistant.close();
    }

    pub fn minimize_assistant(&self) {
        self.assistant.minimize();
    }

    pub fn restore_assistant(&self) {
        self.assistant.restore();
    }

    pub fn toggle_assistant_expanded(&self) {
        self.assistant.toggle_expanded();
    }

    pub fn stage_chat_input(&self, text: &str) {
        self.assistant.set_input(text);
    }

    pub async fn send_chat(&self, text: &str) -> SendOutcome {
        self.assistant.send_message(text, &self.chat_context()).await
    }

    /// Hand a suggested question to the assistant, which opens and sends it
    /// after a short delay.
    pub fn ask_assistant(&self, question: &str) {
        if question.trim().is_empty() {
            return;
        }
        self.signal.raise(question);
        self.deliver_external_question();
    }

    fn deliver_external_question(&self) {
        let Some(text) = self.signal.claim() else {
            return;
        };
        let signal = self.signal.clone();
        let consumed = text.clone();
        self.assistant
            .receive_external_question(text, self.chat_context(), move || {
                signal.acknowledge(&consumed);
            });
    }

    pub fn pending_question(&self) -> Option<String> {
        self.signal.pending()
    }

    /// Rewrite the active query from the conversation and search for it.
    pub async fn refine_query(&self) -> RefineOutcome {
        let outcome = self.assistant.refine_query(&self.chat_context()).await;
        if let RefineOutcome::Refined(refined) = &outcome {
            tracing::info!("Refined query: {refined:?}");
            self.set_query(QueryTuple::first_page(
                refined.as_str(),
                self.settings.page_size,
            ))
            .await;
        }
        outcome
    }

    // ─── Typeahead ───────────────────────────────────────

    pub fn type_query(&self, text: &str) {
        self.typeahead.input(text);
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.typeahead.suggestions()
    }

    pub async fn choose_suggestion(&self, suggestion: &str) -> Option<FetchOutcome> {
        self.submit(suggestion).await
    }

    // ─── Lifecycle ───────────────────────────────────────

    /// Wait for every spawned task (generation, recording, timers) to finish.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Cancel pending timers and wait for in-flight work.
    pub async fn shutdown(&self) {
        self.assistant.cancel_pending();
        self.typeahead.cancel_pending();
        self.tasks.close();
        self.tasks.wait().await;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            page_size: 25,
            image_top_k: 5,
            typeahead_debounce_ms: 150,
            external_question_delay_ms: 50,
            ..Config::default()
        };
        let settings = SessionSettings::from(&config);
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.image_top_k, 5);
        assert_eq!(settings.typeahead_debounce, Duration::from_millis(150));
        assert_eq!(settings.external_question_delay, Duration::from_millis(50));
    }
}
