use parking_lot::Mutex;

#[derive(Debug)]
struct Pending {
    text: String,
    delivered: bool,
}

/// One-slot handoff of a question into the assistant.
///
/// Raising replaces whatever is pending. A raised question is handed out by
/// `claim` at most once and stays visible until the receiver acknowledges it.
#[derive(Debug, Default)]
pub struct QuestionSignal {
    slot: Mutex<Option<Pending>>,
}

impl QuestionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, text: impl Into<String>) {
        *self.slot.lock() = Some(Pending {
            text: text.into(),
            delivered: false,
        });
    }

    /// Hand the pending question to a receiver, once.
    pub fn claim(&self) -> Option<String> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(pending) if !pending.delivered => {
                pending.delivered = true;
                Some(pending.text.clone())
            }
            _ => None,
        }
    }

    /// Receiver is done with `text`. Returns whether it was still pending.
    pub fn acknowledge(&self, text: &str) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.text == text) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|p| p.text.clone())
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}
