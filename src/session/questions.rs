use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::generation::{
    DerivedInput, GenerationOutcome, GenerationRecord, GenerationStatus, SkipReason, Ticket,
};
use super::SessionEvent;
use crate::backend::LlmBackend;
use crate::models::QuestionsRequest;

const QUESTIONS_CONTEXT: usize = 3;
const QUESTIONS_ERROR: &str = "No related questions available.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionsState {
    pub status: GenerationStatus,
    pub questions: Vec<String>,
}

#[derive(Default)]
struct Inner {
    record: GenerationRecord,
    state: QuestionsState,
}

/// "People also ask" suggestions for the active query.
pub struct QuestionsController {
    llm: Arc<dyn LlmBackend>,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<Inner>,
}

impl QuestionsController {
    pub fn new(llm: Arc<dyn LlmBackend>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            llm,
            events,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> QuestionsState {
        self.inner.lock().state.clone()
    }

    pub fn last_generated_for(&self) -> Option<String> {
        self.inner.lock().record.last_generated_for().map(str::to_string)
    }

    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.record.reset();
            inner.state = QuestionsState::default();
        }
        self.notify();
    }

    pub async fn generate(&self, input: &DerivedInput, force: bool) -> GenerationOutcome {
        match self.begin(input, force) {
            Ok(ticket) => self.run(ticket).await,
            Err(reason) => GenerationOutcome::Skipped(reason),
        }
    }

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
            Err(reason) => tracing::debug!("Suggested questions skipped: {reason:?}"),
        }
        claimed
    }

    pub async fn run(&self, ticket: Ticket) -> GenerationOutcome {
        tracing::info!("Generating suggested questions for {:?}", ticket.query);
        let req = QuestionsRequest {
            query: ticket.query.clone(),
            results: ticket.results.context(QUESTIONS_CONTEXT),
        };
        let result = self.llm.suggest_questions(&req).await;

        let outcome = {
            let mut inner = self.inner.lock();
            if !inner.record.finish(&ticket) {
                tracing::debug!("Dropping questions for superseded query {:?}", ticket.query);
                return GenerationOutcome::Discarded;
            }
            match result {
                Ok(questions) => {
                    inner.state.questions = questions;
                    inner.state.status = GenerationStatus::Ready;
                    GenerationOutcome::Generated
                }
                Err(e) => {
                    tracing::warn!("Question generation failed: {e:#}");
                    inner.state.questions.clear();
                    inner.state.status = GenerationStatus::Failed(QUESTIONS_ERROR.to_string());
                    GenerationOutcome::Failed
                }
            }
        };
        self.notify();
        outcome
    }

    fn notify(&self) {
        let _ = self.events.send(SessionEvent::QuestionsUpdated);
    }
}
