// LogTailer - app/sink.rs
//
// Shared line sink: the only state shared between tail workers and the
// consumer. One mutex guards the pending lines, the restarted flag and the
// status, and is held only for the append or drain itself, never across I/O.
//
// The restarted flag is read-and-reset under the same lock as the lines, so a
// drain observes each restart exactly once together with the lines that
// followed it.

use crate::core::model::{ClassifiedLine, TailState};
use parking_lot::Mutex;

/// Status reported to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailStatus {
    pub state: TailState,
    /// Short human status, e.g. "42 lines (waiting)".
    pub primary: String,
    /// Context for the primary status, e.g. the target and generation start.
    pub supplementary: String,
}

/// Result of a drain: every line appended since the previous drain, and
/// whether a restart happened in between.
#[derive(Debug, Default)]
pub struct Drained {
    pub lines: Vec<ClassifiedLine>,
    pub restarted: bool,
}

#[derive(Debug, Default)]
struct SinkInner {
    lines: Vec<ClassifiedLine>,
    restarted: bool,
    status: TailStatus,
}

/// Ordered append/drain buffer shared by producers and one consumer.
#[derive(Debug, Default)]
pub struct LineSink {
    inner: Mutex<SinkInner>,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line in arrival order.
    pub fn push(&self, line: ClassifiedLine) {
        self.inner.lock().lines.push(line);
    }

    /// Take every pending line and the restarted flag, clearing both.
    pub fn drain(&self) -> Drained {
        let mut inner = self.inner.lock();
        Drained {
            lines: std::mem::take(&mut inner.lines),
            restarted: std::mem::replace(&mut inner.restarted, false),
        }
    }

    /// Read and clear the restarted flag without touching pending lines.
    pub fn take_restarted(&self) -> bool {
        std::mem::replace(&mut self.inner.lock().restarted, false)
    }

    /// Discard pending lines and raise the restarted flag.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.lines.clear();
        inner.restarted = true;
    }

    pub fn set_status(&self, state: TailState, primary: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.status.state = state;
        inner.status.primary = primary.into();
    }

    pub fn set_supplementary(&self, supplementary: impl Into<String>) {
        self.inner.lock().status.supplementary = supplementary.into();
    }

    pub fn status(&self) -> TailStatus {
        self.inner.lock().status.clone()
    }

    pub fn state(&self) -> TailState {
        self.inner.lock().status.state.clone()
    }

    /// Number of lines waiting to be drained.
    pub fn pending(&self) -> usize {
        self.inner.lock().lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::classify;
    use crate::core::model::SeverityScheme;

    fn line(text: &str, seq: u64) -> ClassifiedLine {
        classify(text, seq, &SeverityScheme::plain()).unwrap()
    }

    #[test]
    fn test_drain_returns_lines_in_order_and_clears() {
        let sink = LineSink::new();
        sink.push(line("a", 1));
        sink.push(line("b", 2));

        let drained = sink.drain();
        let texts: Vec<&str> = drained.lines.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(sink.pending(), 0);
        assert!(sink.drain().lines.is_empty());
    }

    #[test]
    fn test_restarted_is_observed_once() {
        let sink = LineSink::new();
        sink.reset();
        assert!(sink.take_restarted());
        assert!(!sink.take_restarted());
    }

    #[test]
    fn test_drain_reports_restart_once() {
        let sink = LineSink::new();
        sink.push(line("old", 5));
        sink.reset();
        sink.push(line("new", 1));

        let first = sink.drain();
        assert!(first.restarted);
        assert_eq!(first.lines.len(), 1);
        assert_eq!(first.lines[0].text(), "new");

        let second = sink.drain();
        assert!(!second.restarted);
    }

    #[test]
    fn test_status_round_trip() {
        let sink = LineSink::new();
        sink.set_status(TailState::Waiting, "3 lines (waiting)");
        sink.set_supplementary("/var/log/app.log");
        let status = sink.status();
        assert_eq!(status.state, TailState::Waiting);
        assert_eq!(status.primary, "3 lines (waiting)");
        assert_eq!(status.supplementary, "/var/log/app.log");
        assert_eq!(sink.state(), TailState::Waiting);
    }

    #[test]
    fn test_concurrent_producer_and_drain_keeps_order() {
        use std::sync::Arc;
        let sink = Arc::new(LineSink::new());
        let producer = {
            let sink = Arc::clone(&sink);
            std::thread::spawn(move || {
                for i in 1..=1_000u64 {
                    sink.push(line(&format!("line {i}"), i));
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 1_000 {
            seen.extend(sink.drain().lines.into_iter().map(|l| l.sequence()));
            std::thread::yield_now();
        }
        producer.join().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
