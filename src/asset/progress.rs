//! Load progress reporting
//!
//! The host owns the progress display; the loader only hands it text. While a
//! download is under way the text is the rounded percentage (`"42%"`); at
//! completion it is the empty string, which clears the display.

use std::cell::Cell;
use std::rc::Rc;

use parking_lot::Mutex;

/// Receives progress text. An empty string signals completion.
pub trait ProgressSink {
    fn report(&self, text: &str);
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _text: &str) {}
}

/// Records every report, in order
#[derive(Debug, Default)]
pub struct ProgressLog {
    reports: Mutex<Vec<String>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.reports.lock().last().cloned()
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, text: &str) {
        self.reports.lock().push(text.to_string());
    }
}

/// `round(loaded / total * 100)`, capped at 100
pub fn percent(loaded: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    let ratio = (loaded as f64 / total as f64).min(1.0);
    (ratio * 100.0).round() as u32
}

/// Display text for a percentage: `"N%"` below 100, empty at 100
pub fn progress_text(percent: u32) -> String {
    if percent < 100 {
        format!("{percent}%")
    } else {
        String::new()
    }
}

/// Turns byte counts into deduplicated progress reports
pub struct ProgressTracker {
    sink: Option<Rc<dyn ProgressSink>>,
    last: Cell<Option<u32>>,
}

impl ProgressTracker {
    pub fn new(sink: Rc<dyn ProgressSink>) -> Self {
        Self {
            sink: Some(sink),
            last: Cell::new(None),
        }
    }

    /// Tracker that reports nothing
    pub fn silent() -> Self {
        Self {
            sink: None,
            last: Cell::new(None),
        }
    }

    /// Bytes received so far. Without a known total nothing is reported.
    pub fn update(&self, loaded: u64, total: Option<u64>) {
        let Some(total) = total else {
            return;
        };
        self.report_percent(percent(loaded, total));
    }

    /// Clear the display
    pub fn finish(&self) {
        self.report_percent(100);
    }

    fn report_percent(&self, value: u32) {
        if self.last.get() == Some(value) {
            return;
        }
        self.last.set(Some(value));
        if let Some(sink) = &self.sink {
            sink.report(&progress_text(value));
        }
    }
}

/// Upper bound on what a declared length may preallocate
pub const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// A download body assembled chunk by chunk, reporting after each chunk
pub struct ChunkedBody<'a> {
    data: Vec<u8>,
    total: Option<u64>,
    progress: &'a ProgressTracker,
}

impl<'a> ChunkedBody<'a> {
    pub fn new(total: Option<u64>, progress: &'a ProgressTracker) -> Self {
        Self {
            data: Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize),
            total,
            progress,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.progress.update(self.data.len() as u64, self.total);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
        assert_eq!(percent(7, 5), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn text_clears_at_completion() {
        assert_eq!(progress_text(0), "0%");
        assert_eq!(progress_text(99), "99%");
        assert_eq!(progress_text(100), "");
    }

    #[test]
    fn tracker_deduplicates() {
        let log = Rc::new(ProgressLog::new());
        let tracker = ProgressTracker::new(log.clone());
        tracker.update(10, Some(100));
        tracker.update(10, Some(100));
        tracker.update(50, None);
        tracker.update(100, Some(100));
        tracker.finish();
        assert_eq!(log.reports(), ["10%", ""]);
    }

    #[test]
    fn chunked_body_reports_each_chunk() {
        let log = Rc::new(ProgressLog::new());
        let tracker = ProgressTracker::new(log.clone());
        let mut body = ChunkedBody::new(Some(100), &tracker);
        body.push(&[1; 25]);
        body.push(&[2; 25]);
        body.push(&[3; 50]);

        assert_eq!(log.reports(), ["25%", "50%", ""]);
        let bytes = body.into_bytes();
        assert_eq!(bytes.len(), 100);
        assert_eq!((bytes[0], bytes[30], bytes[99]), (1, 2, 3));
    }

    #[test]
    fn chunked_body_without_length_stays_quiet() {
        let log = Rc::new(ProgressLog::new());
        let tracker = ProgressTracker::new(log.clone());
        let mut body = ChunkedBody::new(None, &tracker);
        body.push(b"abc");
        body.push(b"def");
        assert_eq!(body.len(), 6);
        assert!(log.reports().is_empty());
        assert_eq!(body.into_bytes(), b"abcdef");
    }

    #[test]
    fn forged_length_does_not_preallocate() {
        let tracker = ProgressTracker::silent();
        let body = ChunkedBody::new(Some(u64::MAX), &tracker);
        assert!(body.is_empty());
        assert!(body.data.capacity() as u64 <= MAX_PREALLOC);
    }
}
