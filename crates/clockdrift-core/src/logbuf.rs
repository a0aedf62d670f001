use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryKind {
    /// One tab-separated drift row.
    Sample,
    /// Unrecognised device output, echoed with a `> ` prefix.
    Diagnostic,
    /// Connection changes and errors.
    Status,
}

/// Bounded capture log backing the monitor window's text pane.
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    show_diagnostics: bool,
}

impl LogStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
            show_diagnostics: true,
        }
    }

    pub fn set_show_diagnostics(&mut self, show: bool) {
        self.show_diagnostics = show;
    }

    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.entries.push_back(LogEntry {
            kind,
            text: text.into(),
        });
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            match entry.kind {
                EntryKind::Sample => result.push_str(&entry.text),
                EntryKind::Diagnostic => {
                    if !self.show_diagnostics {
                        continue;
                    }
                    result.push_str("> ");
                    result.push_str(&entry.text);
                }
                EntryKind::Status => {
                    result.push_str("# ");
                    result.push_str(&entry.text);
                }
            }
            result.push('\n');
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_past_capacity() {
        let mut store = LogStore::new(2);
        store.push(EntryKind::Sample, "a");
        store.push(EntryKind::Sample, "b");
        store.push(EntryKind::Sample, "c");
        let texts: Vec<_> = store.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["b", "c"]);
    }

    #[test]
    fn renders_prefixes_and_filters_diagnostics() {
        let mut store = LogStore::new(10);
        store.push(EntryKind::Status, "connected to COM5");
        store.push(EntryKind::Diagnostic, "RTC lost power");
        store.push(EntryKind::Sample, "1.0\t1\t0.0\t0.0\t");
        assert_eq!(store.to_text(), "# connected to COM5\n> RTC lost power\n1.0\t1\t0.0\t0.0\t\n");

        store.set_show_diagnostics(false);
        assert_eq!(store.to_text(), "# connected to COM5\n1.0\t1\t0.0\t0.0\t\n");
    }
}
