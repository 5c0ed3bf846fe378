//! Exactly-once bookkeeping shared by the derived-content controllers.
//!
//! A controller asks its [`GenerationRecord`] for a [`Ticket`] before
//! calling the backend and hands the ticket back when the call resolves.
//! The record refuses a ticket while the fetch is loading, without a text
//! query or results, while another ticket is outstanding, or when the query
//! was already generated for (unless forced). A ticket issued before the
//! last `reset` is stale on return.

use std::sync::Arc;

use crate::models::ResultSet;

/// Inputs a controller evaluates when deciding whether to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedInput {
    /// Active query text, if any.
    pub query: Option<String>,
    pub results: Arc<ResultSet>,
    /// The result fetcher has not settled for the active query yet.
    pub loading: bool,
}

impl DerivedInput {
    fn text_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .filter(|q| !q.trim().is_empty() && *q != crate::models::IMAGE_SEARCH_SENTINEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Loading,
    NoQuery,
    NoResults,
    AlreadyGenerated,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated,
    Skipped(SkipReason),
    /// The backend failed; the controller shows an inline error.
    Failed,
    /// The query identity changed while the call was outstanding.
    Discarded,
}

/// Inline status a view shows next to derived content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Permission to run one backend call. Carries the results it was
/// issued against so the call never reads a later result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub query: String,
    pub results: Arc<ResultSet>,
    pub force: bool,
    epoch: u64,
    id: u64,
}

#[derive(Debug, Default)]
pub struct GenerationRecord {
    last_generated_for: Option<String>,
    in_flight: Option<u64>,
    epoch: u64,
    next_id: u64,
}

impl GenerationRecord {
    pub fn last_generated_for(&self) -> Option<&str> {
        self.last_generated_for.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Claim the right to generate for `input`.
    ///
    /// The query is recorded as generated when the ticket is issued, so a
    /// failed call is retried only through a forced regenerate.
    pub fn begin(&mut self, input: &DerivedInput, force: bool) -> Result<Ticket, SkipReason> {
        if input.loading {
            return Err(SkipReason::Loading);
        }
        let Some(query) = input.text_query() else {
            return Err(SkipReason::NoQuery);
        };
        if input.results.is_empty() {
            return Err(SkipReason::NoResults);
        }
        if self.in_flight.is_some() {
            return Err(SkipReason::InFlight);
        }
        if !force && self.last_generated_for.as_deref() == Some(query) {
            return Err(SkipReason::AlreadyGenerated);
        }

        if !force {
            self.last_generated_for = Some(query.to_string());
        }
        self.next_id += 1;
        self.in_flight = Some(self.next_id);

        Ok(Ticket {
            query: query.to_string(),
            results: input.results.clone(),
            force,
            epoch: self.epoch,
            id: self.next_id,
        })
    }

    /// Whether a result for `ticket` still belongs to the active identity.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Release `ticket`. Returns `false` when its result must be dropped.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if self.in_flight == Some(ticket.id) {
            self.in_flight = None;
        }
        true
    }

    /// Forget everything; called when the query identity changes.
    pub fn reset(&mut self) {
        self.last_generated_for = None;
        self.in_flight = None;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultItem, IMAGE_SEARCH_SENTINEL};

    fn input(query: &str, n: usize, loading: bool) -> DerivedInput {
        DerivedInput {
            query: Some(query.to_string()),
            results: Arc::new(ResultSet {
                items: vec![ResultItem::default(); n],
                total: n as u64,
                total_pages: 1,
            }),
            loading,
        }
    }

    #[test]
    fn test_generates_once_per_query() {
        let mut record = GenerationRecord::default();
        let ticket = record.begin(&input("cats", 3, false), false).unwrap();
        assert!(record.finish(&ticket));
        assert_eq!(
            record.begin(&input("cats", 3, false), false),
            Err(SkipReason::AlreadyGenerated)
        );
        assert_eq!(record.last_generated_for(), Some("cats"));
    }

    #[test]
    fn test_preconditions() {
        let mut record = GenerationRecord::default();
        assert_eq!(
            record.begin(&input("cats", 3, true), false),
            Err(SkipReason::Loading)
        );
        assert_eq!(
            record.begin(&input("", 3, false), false),
            Err(SkipReason::NoQuery)
        );
        assert_eq!(
            record.begin(&input(IMAGE_SEARCH_SENTINEL, 3, false), false),
            Err(SkipReason::NoQuery)
        );
        assert_eq!(
            record.begin(&input("cats", 0, false), false),
            Err(SkipReason::NoResults)
        );
        assert!(record.last_generated_for().is_none());
    }

    #[test]
    fn test_reentrant_call_is_ignored_even_when_forced() {
        let mut record = GenerationRecord::default();
        let _ticket = record.begin(&input("cats", 3, false), false).unwrap();
        assert_eq!(
            record.begin(&input("cats", 3, false), true),
            Err(SkipReason::InFlight)
        );
    }

    #[test]
    fn test_force_regenerates_without_touching_identity() {
        let mut record = GenerationRecord::default();
        let first = record.begin(&input("cats", 3, false), false).unwrap();
        record.finish(&first);
        let forced = record.begin(&input("cats", 3, false), true).unwrap();
        assert!(forced.force);
        assert!(record.finish(&forced));
        assert_eq!(record.last_generated_for(), Some("cats"));
    }

    #[test]
    fn test_reset_makes_outstanding_ticket_stale() {
        let mut record = GenerationRecord::default();
        let ticket = record.begin(&input("cats", 3, false), false).unwrap();
        record.reset();
        let next = record.begin(&input("dogs", 3, false), false).unwrap();
        assert!(!record.finish(&ticket));
        assert!(record.is_in_flight());
        assert!(record.finish(&next));
        assert!(!record.is_in_flight());
    }

    #[test]
    fn test_reset_allows_same_query_again() {
        let mut record = GenerationRecord::default();
        let ticket = record.begin(&input("cats", 3, false), false).unwrap();
        record.finish(&ticket);
        record.reset();
        assert!(record.begin(&input("cats", 3, false), false).is_ok());
    }
}
