// LogTailer - tests/e2e_local_tail.rs
//
// End-to-end tests for local file tailing through the public facade.
//
// These tests use real files in a temp directory, real worker threads and the
// real built-in schemes; a separate writer appends, truncates and creates the
// file while the tail runs.

use logtailer::app::source::RemoteCommands;
use logtailer::app::state::ViewState;
use logtailer::app::tailer::Tailer;
use logtailer::core::filter::DisplayFilter;
use logtailer::core::model::TailState;
use logtailer::core::registry::SchemeRegistry;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Helpers
// =============================================================================

fn new_tailer() -> Tailer {
    Tailer::new(
        Arc::new(SchemeRegistry::with_builtins()),
        RemoteCommands::default(),
    )
}

/// Poll `cond` every 10 ms for up to 5 s.
fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// Drain into `view` until it holds `count` data lines.
fn pump_until(tailer: &Tailer, view: &mut ViewState, count: usize) -> bool {
    wait_for(|| {
        view.apply(tailer.drain_new_lines());
        view.lines.iter().filter(|l| !l.is_status()).count() >= count
    })
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new().append(true).create(true).open(path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    f.flush().unwrap();
}

fn data_texts(view: &ViewState) -> Vec<String> {
    view.lines
        .iter()
        .filter(|l| !l.is_status())
        .map(|l| l.text().to_string())
        .collect()
}

/// A Log4-layout line long enough to reach past the scheme's detection window.
fn log4_line(time: &str, level: &str, message: &str) -> String {
    format!("{time} [worker-pool-1] {level:<5} com.example.orders.OrderService - {message} (request-id=7f3a9c2e41b84d0c)\n")
}

fn log4_lines() -> String {
    [
        log4_line("12:00:01,001", "INFO", "listening on 8080"),
        log4_line("12:00:02,417", "WARN", "eviction took 812 ms"),
        log4_line("12:00:03,920", "ERROR", "connection refused"),
    ]
    .concat()
}

// =============================================================================
// Tests
// =============================================================================

/// Existing content is read from the start and classified with Log4.
#[test]
fn e2e_reads_and_classifies_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    std::fs::write(&path, log4_lines()).unwrap();

    let mut tailer = new_tailer();
    let mut view = ViewState::default();
    tailer.open_local(&path);
    assert!(pump_until(&tailer, &mut view, 3));

    let levels: Vec<String> = view
        .lines
        .iter()
        .filter(|l| !l.is_status())
        .map(|l| l.level().display_name.clone())
        .collect();
    assert_eq!(levels, vec!["Info", "Warn", "Error"]);

    let seqs: Vec<u64> = view
        .lines
        .iter()
        .filter(|l| !l.is_status())
        .map(|l| l.sequence())
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    tailer.close();
}

/// Lines appended while tailing arrive in order after the existing ones.
#[test]
fn e2e_follows_appended_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    std::fs::write(&path, log4_lines()).unwrap();

    let mut tailer = new_tailer();
    let mut view = ViewState::default();
    tailer.open_local(&path);
    assert!(pump_until(&tailer, &mut view, 3));
    assert!(wait_for(|| tailer.status().state == TailState::Waiting));
    assert_eq!(tailer.status_summary().0, "3 lines (waiting)");

    for i in 0..5 {
        append(&path, &log4_line(&format!("12:00:1{i},000"), "INFO", &format!("tick {i}")));
    }
    assert!(pump_until(&tailer, &mut view, 8));

    let texts = data_texts(&view);
    assert_eq!(texts.len(), 8);
    assert!(texts[3].contains("tick 0"));
    assert!(texts[7].contains("tick 4"));
    let seqs: Vec<u64> = view.lines.iter().filter(|l| !l.is_status()).map(|l| l.sequence()).collect();
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
    tailer.close();
}

/// Truncating the file starts a new generation from offset 0.
#[test]
fn e2e_truncation_restarts_generation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    std::fs::write(&path, log4_lines()).unwrap();

    let mut tailer = new_tailer();
    let mut view = ViewState::default();
    tailer.open_local(&path);
    assert!(pump_until(&tailer, &mut view, 3));
    assert!(wait_for(|| tailer.status().state == TailState::Waiting));
    let restarts_before = view.restarts;

    std::fs::write(&path, log4_line("12:01:00,000", "INFO", "restarted")).unwrap();
    assert!(wait_for(|| {
        view.apply(tailer.drain_new_lines());
        view.restarts > restarts_before && !data_texts(&view).is_empty()
    }));

    let texts = data_texts(&view);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("restarted"));
    let first = view.lines.iter().find(|l| !l.is_status()).unwrap();
    assert_eq!(first.sequence(), 1);
    tailer.close();
}

/// A file that does not exist yet is waited for, then read.
#[test]
fn e2e_waits_for_file_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.log");

    let mut tailer = new_tailer();
    tailer.open_local(&path);
    assert!(wait_for(|| {
        let status = tailer.status();
        matches!(status.state, TailState::Error(_)) && status.primary == "File not found, waiting"
    }));

    append(&path, &log4_line("12:00:00,000", "ERROR", "late start"));
    let mut view = ViewState::default();
    assert!(pump_until(&tailer, &mut view, 1));
    assert_eq!(view.lines.iter().find(|l| !l.is_status()).unwrap().level().display_name, "Error");
    tailer.close();
}

/// The display filter hides low ranks without affecting what is tailed.
#[test]
fn e2e_filter_applies_to_view_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    std::fs::write(&path, log4_lines()).unwrap();

    let registry = Arc::new(SchemeRegistry::with_builtins());
    let mut filter = DisplayFilter::default();
    filter.set_min_level("warn", &registry.current()).unwrap();

    let mut tailer = Tailer::new(registry, RemoteCommands::default());
    let mut view = ViewState::new(filter, 1_000);
    tailer.open_local(&path);
    assert!(pump_until(&tailer, &mut view, 3));

    let visible: Vec<&str> = view
        .visible()
        .filter(|l| !l.is_status())
        .map(|l| l.text())
        .collect();
    assert_eq!(visible.len(), 2);
    assert!(visible[0].contains("eviction"));
    assert!(visible[1].contains("connection refused"));
    tailer.close();
}

/// Closing stops the worker and reports Stopped; closing twice is harmless.
#[test]
fn e2e_close_stops_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    std::fs::write(&path, log4_lines()).unwrap();

    let mut tailer = new_tailer();
    tailer.open_local(&path);
    tailer.close();
    tailer.close();
    assert_eq!(tailer.status().state, TailState::Stopped);
    assert!(tailer.take_fault().is_none());

    // Writes after close are not picked up.
    tailer.drain_new_lines();
    append(&path, &log4_line("12:09:00,000", "INFO", "after close"));
    std::thread::sleep(Duration::from_millis(100));
    assert!(tailer.drain_new_lines().lines.is_empty());
}
