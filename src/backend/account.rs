use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::AccountBackend;
use crate::account::AuthError;
use crate::models::{
    AddHistoryRequest, ApiErrorBody, AuthResponse, HistoryEntry, LoginRequest, RegisterRequest,
};

/// reqwest client for `/api/auth/*` and the bearer-authenticated `/api/history`.
#[derive(Clone)]
pub struct HttpAccountBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccountBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn authenticate<Req: Serialize + Sync>(
        &self,
        path: &str,
        req: &Req,
        fallback: &str,
    ) -> Result<AuthResponse, AuthError> {
        let url = format!("{}/api/auth/{path}", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to reach the account service")?;

        if !resp.status().is_success() {
            // The server explains rejections as {"error": "..."}.
            let body: ApiErrorBody = resp.json().await.unwrap_or_default();
            return Err(AuthError::Rejected(
                body.error.unwrap_or_else(|| fallback.to_string()),
            ));
        }

        let auth = resp
            .json::<AuthResponse>()
            .await
            .context("Malformed auth response")?;
        Ok(auth)
    }

    fn history_url(&self) -> String {
        format!("{}/api/history", self.base_url)
    }
}

fn ensure_success(status: reqwest::StatusCode, what: &str) -> Result<()> {
    if !status.is_success() {
        anyhow::bail!("History {what} returned {status}");
    }
    Ok(())
}

#[async_trait]
impl AccountBackend for HttpAccountBackend {
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, AuthError> {
        self.authenticate("login", req, "Login failed").await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        self.authenticate("register", req, "Registration failed").await
    }

    async fn list_history(&self, token: &str) -> Result<Vec<HistoryEntry>> {
        let resp = self
            .client
            .get(self.history_url())
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch search history")?;
        ensure_success(resp.status(), "list")?;

        // The backend answers `null` for an empty history.
        let entries: Option<Vec<HistoryEntry>> = resp.json().await?;
        Ok(entries.unwrap_or_default())
    }

    async fn add_history(&self, token: &str, query: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.history_url())
            .bearer_auth(token)
            .json(&AddHistoryRequest {
                query: query.to_string(),
            })
            .send()
            .await
            .context("Failed to record search history")?;
        ensure_success(resp.status(), "add")
    }

    async fn remove_history(&self, token: &str, id: u64) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}/{id}", self.history_url()))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to remove search history entry")?;
        ensure_success(resp.status(), "remove")
    }

    async fn clear_history(&self, token: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.history_url())
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to clear search history")?;
        ensure_success(resp.status(), "clear")
    }
}
