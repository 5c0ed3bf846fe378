//! # verdant-session
//!
//! Client-side session layer for a search engine with AI features: one
//! active query, its results, and the content derived from them.
//!
//! ## Data flow
//!
//! ```text
//!            submit / page / branch / refine / go back / image
//!                                │
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │      QueryStore       │  (text, page, page_size)
//!                     └──────────┬───────────┘
//!                                │ revision + identity change
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │    ResultFetcher      │  stale responses dropped
//!                     └──────────┬───────────┘
//!                                │ ResultSet
//!            ┌───────────────────┼────────────────────┐
//!            ▼                   ▼                    ▼
//!   ┌────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//!   │   AI summary    │  │ suggested Qs    │  │    assistant     │
//!   │ + related terms │  │ (people ask)    │  │ chat / refine    │
//!   └────────────────┘  └───────┬─────────┘  └─────────────────┘
//!                               │ ask ──► QuestionSignal ──► assistant
//!                               │ pick ─► HistoryStack push ─► new query
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration (backend URLs, page size, delays)
//! - [`models`] - Query tuples, result sets, chat turns and backend wire types
//! - [`backend`] - Backend traits and their reqwest implementations
//! - [`account`] - Auth context with persisted login, and saved search history
//! - [`session`] - The `SearchSession` coordinator and its controllers
//! - [`state`] - Process-wide client state wiring config, backends and account

pub mod account;
pub mod backend;
pub mod config;
pub mod models;
pub mod session;
pub mod state;
