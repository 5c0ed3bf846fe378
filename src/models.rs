use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query text that marks a result set produced by image search.
pub const IMAGE_SEARCH_SENTINEL: &str = "[Image Search]";

/// The committed `(text, page, page_size)` of the active search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryTuple {
    pub text: String,
    pub page: u32,
    pub page_size: u32,
}

impl QueryTuple {
    /// Page and page size are clamped to at least 1.
    pub fn new(text: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            text: text.into(),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn first_page(text: impl Into<String>, page_size: u32) -> Self {
        Self::new(text, 1, page_size)
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self::new(self.text.clone(), page, self.page_size)
    }

    /// Query identity ignores pagination.
    pub fn same_identity(&self, other: &QueryTuple) -> bool {
        self.text == other.text
    }

    pub fn is_sentinel(&self) -> bool {
        self.text == IMAGE_SEARCH_SENTINEL
    }

    /// Non-empty text query, i.e. one that can drive generation and history.
    pub fn is_text_query(&self) -> bool {
        !self.text.trim().is_empty() && !self.is_sentinel()
    }
}

/// An image attached to a result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub base64_data: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A single ranked search result.
///
/// Deserialization accepts both the lowercase field names the search backend
/// emits and the capitalized variants (`Title`, `URL`, `Snippet`, `Id`) some
/// result sources carry, so every consumer sees one normalized shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(default, alias = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, alias = "Title")]
    pub title: String,
    #[serde(default, alias = "URL")]
    pub url: Option<String>,
    #[serde(default, alias = "Snippet")]
    pub snippet: String,
    #[serde(
        default,
        rename = "displayUrl",
        alias = "display_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
}

/// The `{title, url, snippet}` projection sent to the LLM endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultContext {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl From<&ResultItem> for ResultContext {
    fn from(item: &ResultItem) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone().unwrap_or_default(),
            snippet: item.snippet.clone(),
        }
    }
}

/// One page of results, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
    pub total: u64,
    pub total_pages: u64,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Context projection of the first `limit` items, in rank order.
    pub fn context(&self, limit: usize) -> Vec<ResultContext> {
        self.items.iter().take(limit).map(ResultContext::from).collect()
    }

    pub fn document_ids(&self) -> Vec<i64> {
        self.items.iter().filter_map(|item| item.id).collect()
    }
}

impl From<SearchResponse> for ResultSet {
    fn from(resp: SearchResponse) -> Self {
        Self {
            items: resp.results,
            total: resp.total,
            total_pages: resp.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single chat turn (user or assistant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Snapshot pushed before a query-branch so the user can go back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFrame {
    pub query: String,
    pub result_set: Arc<ResultSet>,
    pub page: u32,
}

/// A saved query from the account history backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ─── Wire types ──────────────────────────────────────────

/// Search request
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub page: u32,
    pub page_size: u32,
}

impl From<&QueryTuple> for SearchRequest {
    fn from(tuple: &QueryTuple) -> Self {
        Self {
            query: tuple.text.clone(),
            page: tuple.page,
            page_size: tuple.page_size,
        }
    }
}

/// Search response (text and image search share it)
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<ResultItem>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSearchRequest {
    /// `data:<mime>;base64,<payload>`
    pub image: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub query: String,
    pub results: Vec<ResultContext>,
    pub skip_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionsRequest {
    pub query: String,
    pub results: Vec<ResultContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionsResponse {
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Chat request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub query: String,
    pub document_ids: Vec<i64>,
    pub results: Vec<ResultContext>,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineRequest {
    pub original_query: String,
    pub chat_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefineResponse {
    pub refined_query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddHistoryRequest {
    pub query: String,
}

/// `{"error": "..."}` body returned by the account backend on failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_tuple_clamps_pagination() {
        let tuple = QueryTuple::new("cats", 0, 0);
        assert_eq!(tuple.page, 1);
        assert_eq!(tuple.page_size, 1);
    }

    #[test]
    fn test_identity_ignores_page() {
        let a = QueryTuple::new("cats", 1, 10);
        let b = a.with_page(3);
        assert!(a.same_identity(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sentinel_is_not_a_text_query() {
        assert!(!QueryTuple::first_page(IMAGE_SEARCH_SENTINEL, 10).is_text_query());
        assert!(!QueryTuple::first_page("   ", 10).is_text_query());
        assert!(QueryTuple::first_page("rust", 10).is_text_query());
    }

    #[test]
    fn test_result_item_accepts_capitalized_fields() {
        let item: ResultItem = serde_json::from_value(serde_json::json!({
            "Id": 7,
            "Title": "Verdant",
            "URL": "https://example.com",
            "Snippet": "green things"
        }))
        .unwrap();
        assert_eq!(item.id, Some(7));
        assert_eq!(item.title, "Verdant");
        assert_eq!(item.url.as_deref(), Some("https://example.com"));
        assert_eq!(item.snippet, "green things");
    }

    #[test]
    fn test_result_item_tolerates_null_url_and_images() {
        let item: ResultItem = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "t",
            "url": null,
            "snippet": "s",
            "score": 0.5,
            "source_type": "text",
            "images": null
        }))
        .unwrap();
        assert!(item.url.is_none());
        assert!(item.images.is_none());
        assert_eq!(ResultContext::from(&item).url, "");
    }

    #[test]
    fn test_search_response_missing_fields_default() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        let set = ResultSet::from(resp);
        assert_eq!(set, ResultSet::empty());
    }

    #[test]
    fn test_result_set_context_keeps_rank_order() {
        let set = ResultSet {
            items: (0..5)
                .map(|i| ResultItem {
                    id: if i % 2 == 0 { Some(i) } else { None },
                    title: format!("t{i}"),
                    ..Default::default()
                })
                .collect(),
            total: 5,
            total_pages: 1,
        };
        let ctx = set.context(3);
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx[0].title, "t0");
        assert_eq!(ctx[2].title, "t2");
        assert_eq!(set.document_ids(), vec![0, 2, 4]);
    }

    #[test]
    fn test_chat_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_search_request_wire_shape() {
        let req = SearchRequest::from(&QueryTuple::new("cats", 2, 10));
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"query": "cats", "page": 2, "page_size": 10})
        );
    }
}
