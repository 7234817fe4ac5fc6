// LogTailer - app/local.rs
//
// Local file tail source: one background worker that opens, follows and
// resynchronises a single file.
//
// Worker states:
//   Opening -> CatchingUp -> Waiting <-> CatchingUp
//   Restarted re-enters CatchingUp from offset 0 after a truncation.
//   Error is a retried excursion (file missing, open or read failure).
//
// Truncation is detected at end of file: if the handle's length is now
// smaller than the length recorded at the previous end of file, the reader
// seeks back to 0 and begins a new generation. On Unix a rename-based rotation
// (same path, new inode) reopens the path instead.
//
// Incomplete trailing lines are held in a partial buffer until their newline
// arrives; bytes are decoded as lossy UTF-8.

use crate::app::source::{sleep_while_running, LineEmitter, TailSource, TailTarget};
use crate::core::model::TailState;
use crate::platform::fs;
use crate::util::constants::{
    DEBUG_MAX_LINE_PREVIEW, LOCAL_CANCEL_CHECK_INTERVAL_MS, LOCAL_IDLE_BACKOFF_MS,
    LOCAL_OPEN_RETRY_MS, LOCAL_READ_BUFFER_BYTES, MAX_PARTIAL_LINE_BYTES,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A running worker and its stop flag.
struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Tails one local file on a dedicated thread.
pub struct LocalTailSource {
    target: TailTarget,
    path: PathBuf,
    emitter: Arc<LineEmitter>,
    worker: Option<Worker>,
}

impl LocalTailSource {
    /// Start tailing `path` from its beginning.
    ///
    /// Never fails: a missing or unreadable file is retried by the worker and
    /// reported through status lines.
    pub fn open(path: impl Into<PathBuf>, emitter: Arc<LineEmitter>) -> Self {
        let path = path.into();
        let mut source = Self {
            target: TailTarget::Local(path.clone()),
            path,
            emitter,
            worker: None,
        };
        source.start();
        source
    }

    fn start(&mut self) {
        let running = Arc::new(AtomicBool::new(true));
        let path = self.path.clone();
        let emitter = Arc::clone(&self.emitter);
        let flag = Arc::clone(&running);

        let handle = std::thread::spawn(move || run_local_tail(&path, &emitter, &flag));
        self.worker = Some(Worker { running, handle });
        tracing::info!(file = %self.path.display(), "Local tail started");
    }

    /// Flip the stop flag and join the worker. Returns false if no worker was
    /// running.
    fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        worker.running.store(false, Ordering::SeqCst);
        if worker.handle.join().is_err() {
            tracing::error!(file = %self.path.display(), "Local tail worker panicked");
            self.emitter
                .set_state(TailState::Stopped, "Tail worker panicked");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl TailSource for LocalTailSource {
    fn target(&self) -> &TailTarget {
        &self.target
    }

    fn emitter(&self) -> &Arc<LineEmitter> {
        &self.emitter
    }

    fn close(&mut self) {
        if self.stop() {
            tracing::info!(file = %self.path.display(), "Local tail closed");
        }
    }

    fn restart(&mut self) {
        tracing::info!(file = %self.path.display(), "Local tail restart requested");
        self.stop();
        self.start();
    }
}

impl Drop for LocalTailSource {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Why `follow_file` returned.
enum FollowEnd {
    Stopped,
    /// The path now names a different file.
    Rotated,
}

fn run_local_tail(path: &Path, emitter: &LineEmitter, running: &AtomicBool) {
    let mut rotated = false;

    while running.load(Ordering::SeqCst) {
        emitter.set_state(TailState::Opening, format!("Opening {}", path.display()));

        let file = match fs::open_shared(path) {
            Ok(f) => f,
            Err(e) => {
                let msg = if e.kind() == io::ErrorKind::NotFound {
                    "File not found, waiting".to_string()
                } else {
                    format!("Can't open file: {e}")
                };
                tracing::debug!(file = %path.display(), error = %e, "Local tail: open failed");
                emitter.enqueue(&msg, true);
                emitter.set_state(TailState::Error(msg.clone()), msg.as_str());
                sleep_while_running(running, LOCAL_OPEN_RETRY_MS, LOCAL_CANCEL_CHECK_INTERVAL_MS);
                continue;
            }
        };

        emitter.begin_generation();
        if std::mem::take(&mut rotated) {
            emitter.enqueue("Restart detected", true);
            emitter.set_state(TailState::Restarted, "Restart detected");
        }
        tracing::info!(file = %path.display(), "Local tail: file opened");

        match follow_file(path, file, emitter, running) {
            FollowEnd::Stopped => break,
            FollowEnd::Rotated => {
                tracing::info!(file = %path.display(), "Local tail: file rotated, reopening");
                rotated = true;
            }
        }
    }

    emitter.enqueue("Tail stopped", true);
    emitter.set_state(TailState::Stopped, "Tail stopped");
    tracing::debug!(file = %path.display(), "Local tail worker exited");
}

/// Read `file` until stopped or rotated.
fn follow_file(path: &Path, file: File, emitter: &LineEmitter, running: &AtomicBool) -> FollowEnd {
    let identity = file.metadata().ok();
    let mut reader = BufReader::with_capacity(LOCAL_READ_BUFFER_BYTES, file);
    let mut partial: Vec<u8> = Vec::new();
    let mut last_len: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match reader.read_until(b'\n', &mut partial) {
            Ok(0) => {
                let current_len = match reader.get_ref().metadata() {
                    Ok(m) => m.len(),
                    Err(e) => {
                        report_read_error(path, emitter, &e);
                        std::thread::sleep(Duration::from_millis(LOCAL_IDLE_BACKOFF_MS));
                        continue;
                    }
                };

                if current_len < last_len {
                    tracing::info!(
                        file = %path.display(),
                        old_len = last_len,
                        new_len = current_len,
                        "Local tail: file truncated, restarting from offset 0"
                    );
                    if let Err(e) = reader.seek(SeekFrom::Start(0)) {
                        report_read_error(path, emitter, &e);
                        continue;
                    }
                    partial.clear();
                    last_len = 0;
                    emitter.begin_generation();
                    emitter.enqueue("Restart detected", true);
                    emitter.set_state(TailState::Restarted, "Restart detected");
                    continue;
                }
                last_len = current_len;

                if let Some(ref opened) = identity {
                    if fs::path_rotated(path, opened) {
                        return FollowEnd::Rotated;
                    }
                }

                emitter.set_state(
                    TailState::Waiting,
                    format!("{} lines (waiting)", emitter.line_count()),
                );
                std::thread::sleep(Duration::from_millis(LOCAL_IDLE_BACKOFF_MS));
            }
            Ok(_) => {
                if partial.last() != Some(&b'\n') {
                    // Writer is mid-line; wait for the rest.
                    if partial.len() > MAX_PARTIAL_LINE_BYTES {
                        tracing::warn!(
                            file = %path.display(),
                            bytes = partial.len(),
                            "Local tail: partial line exceeds limit, emitting as-is"
                        );
                        emit_line(emitter, &partial);
                        partial.clear();
                    }
                    continue;
                }
                emit_line(emitter, &partial);
                partial.clear();
                emitter.set_state(
                    TailState::CatchingUp,
                    format!("{} lines (reading)", emitter.line_count()),
                );
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                report_read_error(path, emitter, &e);
                std::thread::sleep(Duration::from_millis(LOCAL_IDLE_BACKOFF_MS));
            }
        }
    }
    FollowEnd::Stopped
}

fn emit_line(emitter: &LineEmitter, bytes: &[u8]) {
    let decoded = String::from_utf8_lossy(bytes);
    let text = decoded.trim_end_matches(['\n', '\r']);
    if emitter.enqueue(text, false) && tracing::enabled!(tracing::Level::TRACE) {
        let preview: String = text.chars().take(DEBUG_MAX_LINE_PREVIEW).collect();
        tracing::trace!(line = %preview, "Local tail: line");
    }
}

fn report_read_error(path: &Path, emitter: &LineEmitter, e: &io::Error) {
    let msg = format!("Read error: {e}");
    tracing::warn!(file = %path.display(), error = %e, "Local tail: read error");
    emitter.set_state(TailState::Error(msg.clone()), msg.as_str());
    emitter.enqueue(&msg, true);
}
