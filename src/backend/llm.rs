use anyhow::Result;
use async_trait::async_trait;

use super::{post_json, LlmBackend};
use crate::models::{
    ChatRequest, ChatResponse, QuestionsRequest, QuestionsResponse, RefineRequest, RefineResponse,
    SummaryRequest, SummaryResponse,
};

/// reqwest client for the `/api/llm/*` endpoints.
#[derive(Clone)]
pub struct HttpLlmBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLlmBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/llm/{name}", self.base_url)
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn summarize(&self, req: &SummaryRequest) -> Result<String> {
        let resp: SummaryResponse =
            post_json(&self.client, &self.endpoint("summary"), req, "Summary").await?;
        Ok(resp.summary)
    }

    async fn suggest_questions(&self, req: &QuestionsRequest) -> Result<Vec<String>> {
        let resp: QuestionsResponse = post_json(
            &self.client,
            &self.endpoint("suggest-questions"),
            req,
            "Suggest questions",
        )
        .await?;
        Ok(resp.questions)
    }

    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        let resp: ChatResponse =
            post_json(&self.client, &self.endpoint("chat"), req, "Chat").await?;
        Ok(resp.response)
    }

    async fn refine_query(&self, req: &RefineRequest) -> Result<String> {
        let resp: RefineResponse =
            post_json(&self.client, &self.endpoint("refine-query"), req, "Refine query").await?;
        let refined = resp.refined_query.trim().to_string();
        if refined.is_empty() {
            anyhow::bail!("Refine query API returned an empty query");
        }
        Ok(refined)
    }
}
