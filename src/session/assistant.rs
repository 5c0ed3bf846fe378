use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use super::SessionEvent;
use crate::backend::LlmBackend;
use crate::models::{ChatMessage, ChatRequest, ChatRole, RefineRequest, ResultSet};

/// Every seeded greeting starts with this; such messages never count as history.
pub const GREETING_PREFIX: &str = "Hi!";
const NO_QUERY_PLACEHOLDER: &str = "general";
const CHAT_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Panel {
    #[default]
    Closed,
    Open,
    Minimized,
}

/// What the assistant is told about the page at call time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pub query: Option<String>,
    pub results: Arc<ResultSet>,
}

impl ChatContext {
    fn active_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    fn refinable_query(&self) -> Option<&str> {
        self.active_query()
            .filter(|q| *q != crate::models::IMAGE_SEARCH_SENTINEL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantView {
    pub panel: Panel,
    pub expanded: bool,
    pub transcript: Vec<ChatMessage>,
    /// Text staged in the input box.
    pub staged_input: String,
    pub sending: bool,
    pub refining: bool,
}

impl AssistantView {
    /// The user has said something since the last reset.
    pub fn has_history(&self) -> bool {
        self.transcript.iter().any(|m| m.role == ChatRole::User)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied,
    /// The backend failed and an apology was appended.
    Apologized,
    /// Blank message or a send already in flight.
    Ignored,
    /// The transcript was replaced while waiting for the reply.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    Refined(String),
    /// An error message was appended to the transcript.
    Failed,
    /// No active query, or a refinement is already running.
    Disabled,
    Discarded,
}

#[derive(Default)]
struct Inner {
    panel: Panel,
    expanded: bool,
    transcript: Vec<ChatMessage>,
    seeded: bool,
    /// Bumped whenever the transcript is replaced.
    epoch: u64,
    input: String,
    sending: bool,
    refining: bool,
    /// Scheduled external-question send. Only abortable until it starts
    /// sending; the id tells a woken task whether it was superseded.
    auto_send: Option<(u64, JoinHandle<()>)>,
    next_auto_send: u64,
}

impl Inner {
    fn seed(&mut self, ctx: &ChatContext) {
        if self.seeded {
            return;
        }
        self.transcript.push(ChatMessage::assistant(greeting(ctx)));
        self.seeded = true;
    }

    fn cancel_auto_send(&mut self) {
        if let Some((_, handle)) = self.auto_send.take() {
            handle.abort();
        }
    }

    /// Append `message` as a user turn and mark a send in flight. Returns
    /// the history to send and the transcript epoch, or `None` when the
    /// message is blank or another send is outstanding.
    fn start_send(&mut self, message: &str) -> Option<(Vec<ChatMessage>, u64)> {
        if message.is_empty() || self.sending {
            return None;
        }
        self.sending = true;
        self.input.clear();
        let history = conversation_history(&self.transcript);
        self.transcript.push(ChatMessage::user(message));
        Some((history, self.epoch))
    }
}

/// Chat assistant bound to the active query.
pub struct Assistant {
    llm: Arc<dyn LlmBackend>,
    events: broadcast::Sender<SessionEvent>,
    tasks: TaskTracker,
    external_delay: Duration,
    inner: Mutex<Inner>,
    /// Signalled whenever a send settles.
    idle: Notify,
}

impl Assistant {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        events: broadcast::Sender<SessionEvent>,
        tasks: TaskTracker,
        external_delay: Duration,
    ) -> Self {
        Self {
            llm,
            events,
            tasks,
            external_delay,
            inner: Mutex::new(Inner::default()),
            idle: Notify::new(),
        }
    }

    pub fn view(&self) -> AssistantView {
        let inner = self.inner.lock();
        AssistantView {
            panel: inner.panel,
            expanded: inner.expanded,
            transcript: inner.transcript.clone(),
            staged_input: inner.input.clone(),
            sending: inner.sending,
            refining: inner.refining,
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.inner.lock().transcript.clone()
    }

    pub fn panel(&self) -> Panel {
        self.inner.lock().panel
    }

    /// Open (or un-minimize) the panel, greeting first if needed.
    pub fn open(&self, ctx: &ChatContext) {
        {
            let mut inner = self.inner.lock();
            inner.panel = Panel::Open;
            inner.seed(ctx);
        }
        self.notify();
    }

    pub fn close(&self) {
        self.inner.lock().panel = Panel::Closed;
        self.notify();
    }

    pub fn minimize(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.panel == Panel::Open {
                inner.panel = Panel::Minimized;
            }
        }
        self.notify();
    }

    pub fn restore(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.panel == Panel::Minimized {
                inner.panel = Panel::Open;
            }
        }
        self.notify();
    }

    pub fn toggle_expanded(&self) {
        {
            let mut inner = self.inner.lock();
            inner.expanded = !inner.expanded;
        }
        self.notify();
    }

    pub fn set_input(&self, text: &str) {
        self.inner.lock().input = text.to_string();
    }

    /// Results for the active query arrived; greet now if the panel is
    /// already showing an unseeded transcript.
    pub fn on_results(&self, ctx: &ChatContext) {
        {
            let mut inner = self.inner.lock();
            if inner.panel == Panel::Closed || inner.seeded {
                return;
            }
            inner.seed(ctx);
        }
        self.notify();
    }

    /// The query identity changed: start a fresh transcript.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.cancel_auto_send();
            inner.transcript.clear();
            inner.seeded = false;
            inner.epoch += 1;
            inner.input.clear();
            inner.sending = false;
            inner.refining = false;
        }
        self.notify();
    }

    /// Abort a scheduled auto-send.
    pub fn cancel_pending(&self) {
        self.inner.lock().cancel_auto_send();
    }

    pub async fn send_message(&self, text: &str, ctx: &ChatContext) -> SendOutcome {
        let message = text.trim();
        let started = self.inner.lock().start_send(message);
        let Some((history, epoch)) = started else {
            return SendOutcome::Ignored;
        };
        self.notify();
        self.complete_send(message, ctx, history, epoch).await
    }

    async fn complete_send(
        &self,
        message: &str,
        ctx: &ChatContext,
        history: Vec<ChatMessage>,
        epoch: u64,
    ) -> SendOutcome {
        let req = ChatRequest {
            message: message.to_string(),
            query: ctx
                .active_query()
                .unwrap_or(NO_QUERY_PLACEHOLDER)
                .to_string(),
            document_ids: ctx.results.document_ids(),
            results: ctx.results.context(usize::MAX),
            history,
        };
        tracing::debug!(
            "Sending chat message ({} results, {} history turns)",
            req.results.len(),
            req.history.len()
        );
        let reply = self.llm.chat(&req).await;

        let outcome = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                tracing::debug!("Dropping chat reply for a replaced transcript");
                return SendOutcome::Discarded;
            }
            inner.sending = false;
            match reply {
                Ok(response) => {
                    inner.transcript.push(ChatMessage::assistant(response));
                    SendOutcome::Replied
                }
                Err(e) => {
                    tracing::warn!("Chat request failed: {e:#}");
                    inner.transcript.push(ChatMessage::assistant(CHAT_APOLOGY));
                    SendOutcome::Apologized
                }
            }
        };
        self.idle.notify_waiters();
        self.notify();
        outcome
    }

    /// Open the panel, stage `text`, and send it after the configured
    /// delay, queued behind any send already in flight. `on_consumed` runs
    /// once the send has been attempted. A newer external question or a
    /// reset cancels the send while it is still waiting; once it has
    /// started it always runs to completion.
    pub fn receive_external_question(
        self: &Arc<Self>,
        text: String,
        ctx: ChatContext,
        on_consumed: impl FnOnce() + Send + 'static,
    ) {
        {
            let mut inner = self.inner.lock();
            inner.cancel_auto_send();
            inner.panel = Panel::Open;
            inner.seed(&ctx);
            inner.input = text.clone();
            inner.next_auto_send += 1;
            let id = inner.next_auto_send;

            let this = Arc::clone(self);
            let delay = self.external_delay;
            let handle = self.tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                let Some((history, epoch)) = this.claim_auto_send(id, &text).await else {
                    return;
                };
                this.notify();
                this.complete_send(text.trim(), &ctx, history, epoch).await;
                on_consumed();
            });
            inner.auto_send = Some((id, handle));
        }
        self.notify();
    }

    /// Wait out any in-flight send, then release the auto-send slot and
    /// start sending `text`. `None` when auto-send `id` was superseded.
    async fn claim_auto_send(&self, id: u64, text: &str) -> Option<(Vec<ChatMessage>, u64)> {
        loop {
            let idle = self.idle.notified();
            {
                let mut inner = self.inner.lock();
                if inner.auto_send.as_ref().map(|(current, _)| *current) != Some(id) {
                    return None;
                }
                if !inner.sending {
                    inner.auto_send = None;
                    return inner.start_send(text.trim());
                }
            }
            idle.await;
        }
    }

    /// Ask the backend to rewrite the active query from the conversation.
    pub async fn refine_query(&self, ctx: &ChatContext) -> RefineOutcome {
        let Some(query) = ctx.refinable_query() else {
            return RefineOutcome::Disabled;
        };

        let (history, epoch) = {
            let mut inner = self.inner.lock();
            if inner.refining {
                return RefineOutcome::Disabled;
            }
            inner.refining = true;
            (conversation_history(&inner.transcript), inner.epoch)
        };
        self.notify();

        tracing::info!(
            "Refining {:?} from {} history turns",
            query,
            history.len()
        );
        let req = RefineRequest {
            original_query: query.to_string(),
            chat_history: history,
        };
        let result = self.llm.refine_query(&req).await;

        let outcome = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return RefineOutcome::Discarded;
            }
            inner.refining = false;
            match result {
                Ok(refined) => RefineOutcome::Refined(refined),
                Err(e) => {
                    tracing::warn!("Query refinement failed: {e:#}");
                    inner.transcript.push(ChatMessage::assistant(format!(
                        "Error refining search: {e}. Please try again."
                    )));
                    RefineOutcome::Failed
                }
            }
        };
        self.notify();
        outcome
    }

    fn notify(&self) {
        let _ = self.events.send(SessionEvent::AssistantUpdated);
    }
}

// ─── Helper functions ────────────────────────────────────

fn greeting(ctx: &ChatContext) -> String {
    match ctx.active_query() {
        Some(query) if !ctx.results.is_empty() => format!(
            "{GREETING_PREFIX} I can help you understand the search results for \"{query}\". \
             What would you like to know?"
        ),
        _ => format!("{GREETING_PREFIX} I'm here to help. You can ask me anything!"),
    }
}

fn is_greeting(message: &ChatMessage) -> bool {
    message.role == ChatRole::Assistant && message.content.starts_with(GREETING_PREFIX)
}

/// Transcript as request history: everything except seeded greetings.
pub fn conversation_history(transcript: &[ChatMessage]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .filter(|m| !is_greeting(m))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultItem;

    fn ctx(query: Option<&str>, n: usize) -> ChatContext {
        ChatContext {
            query: query.map(str::to_string),
            results: Arc::new(ResultSet {
                items: vec![ResultItem::default(); n],
                total: n as u64,
                total_pages: 1,
            }),
        }
    }

    // ─── Greeting ────────────────────────────────────────

    #[test]
    fn test_greeting_with_results_mentions_query() {
        let text = greeting(&ctx(Some("rust"), 3));
        assert!(text.starts_with(GREETING_PREFIX));
        assert!(text.contains("\"rust\""));
    }

    #[test]
    fn test_greeting_without_results_is_generic() {
        assert_eq!(
            greeting(&ctx(Some("rust"), 0)),
            "Hi! I'm here to help. You can ask me anything!"
        );
        assert_eq!(
            greeting(&ctx(None, 3)),
            "Hi! I'm here to help. You can ask me anything!"
        );
    }

    // ─── History filtering ───────────────────────────────

    #[test]
    fn test_history_drops_seeded_greeting() {
        let transcript = vec![
            ChatMessage::assistant(greeting(&ctx(Some("rust"), 3))),
            ChatMessage::user("only beginner books"),
            ChatMessage::assistant("Sure."),
        ];
        let history = conversation_history(&transcript);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("only beginner books"));
        assert_eq!(history[1], ChatMessage::assistant("Sure."));
    }

    #[test]
    fn test_history_keeps_user_messages_starting_with_hi() {
        let transcript = vec![ChatMessage::user("Hi! what is this?")];
        assert_eq!(conversation_history(&transcript).len(), 1);
    }

    #[test]
    fn test_history_empty() {
        assert!(conversation_history(&[]).is_empty());
    }

    // ─── Context ─────────────────────────────────────────

    #[test]
    fn test_refinable_query_excludes_sentinel_and_blank() {
        assert!(ctx(Some(crate::models::IMAGE_SEARCH_SENTINEL), 1)
            .refinable_query()
            .is_none());
        assert!(ctx(Some("  "), 1).refinable_query().is_none());
        assert_eq!(ctx(Some("python"), 1).refinable_query(), Some("python"));
    }

    #[test]
    fn test_has_history_counts_only_user_turns() {
        let mut view = AssistantView::default();
        view.transcript.push(ChatMessage::assistant("Hi! hello"));
        assert!(!view.has_history());
        view.transcript.push(ChatMessage::user("question"));
        assert!(view.has_history());
    }
}
