//! Incremental framing for `text/event-stream` bodies.
//!
//! Network chunks split lines at arbitrary byte positions, so raw bytes
//! accumulate here and drain one `data:` payload at a time. Comment lines,
//! keepalives, and non-data fields are consumed and dropped.

pub(crate) struct EventStreamDecoder {
    pending: String,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Drain the next complete `data:` payload, trimmed.
    ///
    /// Returns `None` once no full line remains; a trailing partial line
    /// stays pending until the next `feed`.
    pub fn next_data(&mut self) -> Option<String> {
        loop {
            let line_end = self.pending.find('\n')?;
            let line: String = self.pending.drain(..=line_end).collect();
            if let Some(payload) = line.trim().strip_prefix("data:") {
                return Some(payload.trim().to_string());
            }
        }
    }
}
