use crate::models::HistoryFrame;

/// Last-in-first-out stack of pre-branch snapshots backing "go back".
#[derive(Debug, Default)]
pub struct HistoryStack {
    frames: Vec<HistoryFrame>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: HistoryFrame) {
        self.frames.push(frame);
    }

    /// Remove and return the top frame; `None` when empty.
    pub fn pop(&mut self) -> Option<HistoryFrame> {
        self.frames.pop()
    }

    pub fn can_go_back(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultItem, ResultSet};
    use std::sync::Arc;

    fn frame(query: &str, page: u32) -> HistoryFrame {
        HistoryFrame {
            query: query.to_string(),
            result_set: Arc::new(ResultSet {
                items: vec![ResultItem {
                    title: format!("{query} result"),
                    ..Default::default()
                }],
                total: 1,
                total_pages: 1,
            }),
            page,
        }
    }

    #[test]
    fn test_push_then_pop_round_trips() {
        let mut stack = HistoryStack::new();
        let pushed = frame("cats", 2);
        stack.push(pushed.clone());
        assert_eq!(stack.pop(), Some(pushed));
        assert!(!stack.can_go_back());
    }

    #[test]
    fn test_pop_empty() {
        let mut stack = HistoryStack::new();
        assert!(stack.pop().is_none());
        assert!(!stack.can_go_back());
    }

    #[test]
    fn test_lifo_order_and_can_go_back() {
        let mut stack = HistoryStack::new();
        stack.push(frame("a", 1));
        stack.push(frame("b", 1));
        stack.push(frame("c", 3));
        assert_eq!(stack.len(), 3);

        assert_eq!(stack.pop().map(|f| f.query), Some("c".to_string()));
        assert!(stack.can_go_back());
        assert_eq!(stack.pop().map(|f| f.query), Some("b".to_string()));
        assert!(stack.can_go_back());
        let last = stack.pop();
        assert_eq!(last.as_ref().map(|f| f.query.as_str()), Some("a"));
        assert_eq!(last.map(|f| f.page), Some(1));
        assert!(!stack.can_go_back());
    }
}
