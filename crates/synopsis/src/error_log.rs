/// Default cap on the accumulated row-level error text, in bytes
pub const MAX_ERROR_LOG_LEN: usize = 4096;

/// Accumulates row-level problems so they can be reported once, at the end of
/// a run. Once an entry does not fit, it and every later entry are counted
/// but not kept, so the text is always a prefix of the error stream.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    text: String,
    capacity: usize,
    entries: usize,
    dropped: usize,
    full: bool,
}

impl Default for ErrorLog {
    fn default() -> Self {
        ErrorLog::with_capacity(MAX_ERROR_LOG_LEN)
    }
}

impl ErrorLog {
    pub fn with_capacity(capacity: usize) -> Self {
        ErrorLog {
            text: String::new(),
            capacity,
            entries: 0,
            dropped: 0,
            full: false,
        }
    }

    pub fn push<S: AsRef<str>>(&mut self, message: S) {
        let message = message.as_ref();
        if self.full || self.text.len() + message.len() + 1 > self.capacity {
            self.full = true;
            self.dropped += 1;
            return;
        }
        self.text.push_str(message);
        self.text.push('\n');
        self.entries += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0 && self.dropped == 0
    }

    /// Number of entries that were kept
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Emit the whole log as a single warning
    pub fn report(&self, context: &str) {
        if self.is_empty() {
            return;
        }
        match self.dropped {
            0 => log::warn!(
                "{}: {} row-level errors\n{}",
                context,
                self.entries,
                self.text.trim_end()
            ),
            n => log::warn!(
                "{}: {} row-level errors ({} more not shown)\n{}",
                context,
                self.entries + n,
                n,
                self.text.trim_end()
            ),
        }
    }
}
