use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{post_json, SearchBackend};
use crate::models::{
    ImageSearchRequest, QueryTuple, ResultSet, SearchRequest, SearchResponse, SuggestionsResponse,
};

/// reqwest client for `/api/search`, `/api/search/image` and `/api/suggestions`.
#[derive(Clone)]
pub struct HttpSearchBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, tuple: &QueryTuple) -> Result<ResultSet> {
        let url = format!("{}/api/search", self.base_url);
        let resp: SearchResponse =
            post_json(&self.client, &url, &SearchRequest::from(tuple), "Search").await?;
        Ok(resp.into())
    }

    async fn image_search(&self, image: &str, top_k: u32) -> Result<ResultSet> {
        let url = format!("{}/api/search/image", self.base_url);
        let req = ImageSearchRequest {
            image: image.to_string(),
            top_k,
        };
        let resp: SearchResponse = post_json(&self.client, &url, &req, "Image search").await?;
        Ok(resp.into())
    }

    async fn suggestions(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/api/suggestions", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("q", prefix)])
            .send()
            .await
            .context("Failed to call suggestions API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Suggestions API returned {status}: {body}");
        }

        let body: SuggestionsResponse = resp.json().await?;
        Ok(body.suggestions)
    }
}
