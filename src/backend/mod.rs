//! Request/response adapters for the two backends the session talks to.
//!
//! The coordinator only sees the traits below; the `Http*` types are the
//! reqwest implementations used by the binary.

pub mod account;
pub mod llm;
pub mod search;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::account::AuthError;
use crate::models::{
    AuthResponse, ChatRequest, HistoryEntry, LoginRequest, QuestionsRequest, QueryTuple,
    RefineRequest, RegisterRequest, ResultSet, SummaryRequest,
};

pub use account::HttpAccountBackend;
pub use llm::HttpLlmBackend;
pub use search::HttpSearchBackend;

/// Retrieval endpoints of the search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, tuple: &QueryTuple) -> Result<ResultSet>;

    /// `image` is a `data:` URL.
    async fn image_search(&self, image: &str, top_k: u32) -> Result<ResultSet>;

    async fn suggestions(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Generation endpoints of the search backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn summarize(&self, req: &SummaryRequest) -> Result<String>;

    async fn suggest_questions(&self, req: &QuestionsRequest) -> Result<Vec<String>>;

    async fn chat(&self, req: &ChatRequest) -> Result<String>;

    async fn refine_query(&self, req: &RefineRequest) -> Result<String>;
}

/// Auth and saved-query endpoints of the account backend.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, AuthError>;

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AuthError>;

    async fn list_history(&self, token: &str) -> Result<Vec<HistoryEntry>>;

    async fn add_history(&self, token: &str, query: &str) -> Result<()>;

    async fn remove_history(&self, token: &str, id: u64) -> Result<()>;

    async fn clear_history(&self, token: &str) -> Result<()>;
}

/// POST a JSON body and decode a JSON reply, failing on non-success status.
pub(crate) async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
    what: &str,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Failed to call {what} API"))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{what} API returned {status}: {body}");
    }

    resp.json::<Resp>()
        .await
        .with_context(|| format!("Malformed {what} response"))
}
