use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::generation::{
    DerivedInput, GenerationOutcome, GenerationRecord, GenerationStatus, SkipReason, Ticket,
};
use super::SessionEvent;
use crate::backend::LlmBackend;
use crate::models::{QuestionsRequest, SummaryRequest};

const SUMMARY_ERROR: &str = "Unable to generate AI summary. Please try again.";
const RELATED_CONTEXT: usize = 3;
const MAX_RELATED: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryState {
    pub status: GenerationStatus,
    pub summary: Option<String>,
    /// Follow-up keyword searches derived from suggested questions.
    pub related: Vec<String>,
}

#[derive(Default)]
struct Inner {
    record: GenerationRecord,
    state: SummaryState,
}

/// AI overview for the active query.
pub struct SummaryController {
    llm: Arc<dyn LlmBackend>,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<Inner>,
}

impl SummaryController {
    pub fn new(llm: Arc<dyn LlmBackend>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            llm,
            events,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> SummaryState {
        self.inner.lock().state.clone()
    }

    pub fn last_generated_for(&self) -> Option<String> {
        self.inner.lock().record.last_generated_for().map(str::to_string)
    }

    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.record.reset();
            inner.state = SummaryState::default();
        }
        self.notify();
    }

    /// Generate the summary for `input`. `force` bypasses both the
    /// once-per-query rule and the backend cache.
    pub async fn generate(&self, input: &DerivedInput, force: bool) -> GenerationOutcome {
        match self.begin(input, force) {
            Ok(ticket) => self.run(ticket).await,
            Err(reason) => GenerationOutcome::Skipped(reason),
        }
    }

    /// Claim a ticket against `input` as it stands right now.
    pub fn begin(&self, input: &DerivedInput, force: bool) -> Result<Ticket, SkipReason> {
        let claimed = {
            let mut inner = self.inner.lock();
            let claimed = inner.record.begin(input, force);
            if claimed.is_ok() {
                inner.state.status = GenerationStatus::Loading;
            }
            claimed
        };
        match &claimed {
            Ok(_) => self.notify(),
            Err(reason) => tracing::debug!("Summary skipped: {reason:?}"),
        }
        claimed
    }

    /// Make the call `ticket` was issued for. The result is dropped if the
    /// query identity changed in the meantime.
    pub async fn run(&self, ticket: Ticket) -> GenerationOutcome {
        tracing::info!("Generating AI summary for {:?}", ticket.query);
        let req = SummaryRequest {
            query: ticket.query.clone(),
            results: ticket.results.context(usize::MAX),
            skip_cache: ticket.force,
        };
        let result = self.llm.summarize(&req).await;

        {
            let mut inner = self.inner.lock();
            if !inner.record.finish(&ticket) {
                tracing::debug!("Dropping summary for superseded query {:?}", ticket.query);
                return GenerationOutcome::Discarded;
            }
            match result {
                Ok(summary) => {
                    inner.state.summary = Some(summary);
                    inner.state.status = GenerationStatus::Ready;
                }
                Err(e) => {
                    tracing::warn!("Summary generation failed: {e:#}");
                    inner.state.status = GenerationStatus::Failed(SUMMARY_ERROR.to_string());
                    drop(inner);
                    self.notify();
                    return GenerationOutcome::Failed;
                }
            }
        }
        self.notify();

        if !ticket.force {
            self.load_related(&ticket).await;
        }
        GenerationOutcome::Generated
    }

    async fn load_related(&self, ticket: &Ticket) {
        let req = QuestionsRequest {
            query: ticket.query.clone(),
            results: ticket.results.context(RELATED_CONTEXT),
        };

        let questions = match self.llm.suggest_questions(&req).await {
            Ok(questions) => questions,
            Err(e) => {
                tracing::warn!("Related searches failed: {e:#}");
                return;
            }
        };

        let mut inner = self.inner.lock();
        if !inner.record.is_current(ticket) {
            return;
        }
        inner.state.related = related_keywords(&questions);
        drop(inner);
        self.notify();
    }

    fn notify(&self) {
        let _ = self.events.send(SessionEvent::SummaryUpdated);
    }
}

/// Turn suggested questions into keyword searches: first three, question
/// marks stripped.
pub fn related_keywords(questions: &[String]) -> Vec<String> {
    questions
        .iter()
        .take(MAX_RELATED)
        .map(|q| q.replace(['?', '？'], "").trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_related_strips_question_marks() {
        let result = related_keywords(&strings(&["What is Rust?", "为什么用 Rust？"]));
        assert_eq!(result, strings(&["What is Rust", "为什么用 Rust"]));
    }

    #[test]
    fn test_related_truncates_to_three() {
        let result = related_keywords(&strings(&["a?", "b?", "c?", "d?"]));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_related_drops_blank_entries() {
        let result = related_keywords(&strings(&["?", "  ", "ok"]));
        assert_eq!(result, strings(&["ok"]));
    }

    #[test]
    fn test_related_empty() {
        assert!(related_keywords(&[]).is_empty());
    }
}
