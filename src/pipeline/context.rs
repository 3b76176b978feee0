use std::sync::Mutex;

/// Append-only history of answers produced during one run.
///
/// Shared across concurrently-processed rows, so ordering reflects
/// completion order rather than source row order; window reads see a
/// best-effort snapshot of whatever has completed so far.
#[derive(Debug, Default)]
pub struct ContextAccumulator {
    entries: Mutex<Vec<String>>,
}

impl ContextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, answer: String) {
        let mut entries = self.entries.lock().expect("context lock poisoned");
        entries.push(answer);
    }

    /// The up-to-`n` most recent answers, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let entries = self.entries.lock().expect("context lock poisoned");
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("context lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
