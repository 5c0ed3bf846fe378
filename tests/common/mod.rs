//! In-process fake backends shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use verdant_session::backend::{LlmBackend, SearchBackend};
use verdant_session::models::{
    ChatRequest, QuestionsRequest, QueryTuple, RefineRequest, ResultItem, ResultSet,
    SummaryRequest,
};
use verdant_session::session::{
    QueryRecorder, SearchSession, SessionBackends, SessionSettings,
};

#[derive(Default)]
pub struct FakeSearch {
    pub delays: Mutex<HashMap<String, Duration>>,
    pub totals: Mutex<HashMap<String, (u64, u64)>>,
    pub failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<QueryTuple>>,
    pub images: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn delay(&self, query: &str, ms: u64) {
        self.delays
            .lock()
            .insert(query.to_string(), Duration::from_millis(ms));
    }

    pub fn totals(&self, query: &str, total: u64, total_pages: u64) {
        self.totals
            .lock()
            .insert(query.to_string(), (total, total_pages));
    }

    pub fn fail(&self, query: &str) {
        self.failing.lock().insert(query.to_string());
    }
}

pub fn items_for(text: &str) -> Vec<ResultItem> {
    (1..=3)
        .map(|i| ResultItem {
            id: Some(i),
            title: format!("{text} result {i}"),
            url: Some(format!("https://example.com/{i}")),
            snippet: format!("about {text}"),
            ..Default::default()
        })
        .collect()
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn search(&self, tuple: &QueryTuple) -> Result<ResultSet> {
        self.calls.lock().push(tuple.clone());
        let delay = self.delays.lock().get(&tuple.text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&tuple.text) {
            bail!("Search API returned 500 Internal Server Error: down");
        }
        let (total, total_pages) = self
            .totals
            .lock()
            .get(&tuple.text)
            .copied()
            .unwrap_or((30, 3));
        Ok(ResultSet {
            items: items_for(&tuple.text),
            total,
            total_pages,
        })
    }

    async fn image_search(&self, image: &str, _top_k: u32) -> Result<ResultSet> {
        self.images.lock().push(image.to_string());
        Ok(ResultSet {
            items: items_for("image"),
            total: 3,
            total_pages: 1,
        })
    }

    async fn suggestions(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(vec![format!("{prefix} tutorial")])
    }
}

#[derive(Default)]
pub struct FakeLlm {
    pub summary_delay: Mutex<Option<Duration>>,
    pub chat_delay: Mutex<Option<Duration>>,
    pub summaries: Mutex<Vec<SummaryRequest>>,
    pub questions: Mutex<Vec<QuestionsRequest>>,
    pub chats: Mutex<Vec<ChatRequest>>,
    pub refines: Mutex<Vec<RefineRequest>>,
    pub refined: Mutex<Option<String>>,
    pub fail_chat: Mutex<bool>,
}

impl FakeLlm {
    pub fn summary_queries(&self) -> Vec<String> {
        self.summaries.lock().iter().map(|r| r.query.clone()).collect()
    }
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn summarize(&self, req: &SummaryRequest) -> Result<String> {
        self.summaries.lock().push(req.clone());
        let delay = *self.summary_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("Summary of {}", req.query))
    }

    async fn suggest_questions(&self, req: &QuestionsRequest) -> Result<Vec<String>> {
        self.questions.lock().push(req.clone());
        Ok(vec![
            format!("What is {}?", req.query),
            format!("Why use {}?", req.query),
            format!("How to learn {}?", req.query),
        ])
    }

    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        self.chats.lock().push(req.clone());
        let delay = *self.chat_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_chat.lock() {
            bail!("LLM API returned 502 Bad Gateway: upstream");
        }
        Ok(format!("Answer to {}", req.message))
    }

    async fn refine_query(&self, req: &RefineRequest) -> Result<String> {
        self.refines.lock().push(req.clone());
        match self.refined.lock().clone() {
            Some(refined) => Ok(refined),
            None => bail!("refinement unavailable"),
        }
    }
}

#[derive(Default)]
pub struct Recorded(pub Mutex<Vec<String>>);

#[async_trait]
impl QueryRecorder for Recorded {
    async fn record(&self, query: &str) {
        self.0.lock().push(query.to_string());
    }
}

pub struct Harness {
    pub session: Arc<SearchSession>,
    pub search: Arc<FakeSearch>,
    pub llm: Arc<FakeLlm>,
    pub recorded: Arc<Recorded>,
}

pub fn harness() -> Harness {
    let search = Arc::new(FakeSearch::default());
    let llm = Arc::new(FakeLlm::default());
    let recorded = Arc::new(Recorded::default());
    let session = Arc::new(SearchSession::new(
        SessionBackends {
            search: search.clone(),
            llm: llm.clone(),
            recorder: Some(recorded.clone()),
        },
        SessionSettings {
            page_size: 10,
            image_top_k: 10,
            typeahead_debounce: Duration::from_millis(300),
            external_question_delay: Duration::from_millis(300),
        },
    ));
    Harness {
        session,
        search,
        llm,
        recorded,
    }
}
