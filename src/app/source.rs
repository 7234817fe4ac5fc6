// LogTailer - app/source.rs
//
// Common tail source contract shared by the local and remote variants.
//
// Workers never touch the sink directly: every line goes through a
// `LineEmitter`, which owns the generation's sequence counter and classifies
// against whatever scheme is current at the moment of the append.

use crate::app::sink::LineSink;
use crate::core::classify::classify;
use crate::core::model::TailState;
use crate::core::registry::SchemeRegistry;
use crate::util::constants;
use crate::util::error::TailError;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Targets
// =============================================================================

/// Connection settings for a remote file.
#[derive(Clone)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Absolute path of the file on the remote host.
    pub path: String,
    pub key_path: Option<PathBuf>,
    pub password: Option<String>,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: constants::DEFAULT_SSH_PORT,
            user: user.into(),
            path: path.into(),
            key_path: None,
            password: None,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("path", &self.path)
            .field("key_path", &self.key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What a tail source is watching.
#[derive(Debug, Clone)]
pub enum TailTarget {
    Local(PathBuf),
    Remote(RemoteTarget),
}

impl TailTarget {
    /// Human description used in status strings.
    pub fn describe(&self) -> String {
        match self {
            TailTarget::Local(path) => path.display().to_string(),
            TailTarget::Remote(r) if r.port == constants::DEFAULT_SSH_PORT => {
                format!("{}@{}:{}", r.user, r.host, r.path)
            }
            TailTarget::Remote(r) => format!("{}@{}:{}:{}", r.user, r.host, r.port, r.path),
        }
    }
}

/// The two remote command templates. Each contains the `FILE` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommands {
    pub size: String,
    pub follow: String,
}

impl RemoteCommands {
    pub fn size_for(&self, path: &str) -> String {
        render(&self.size, path)
    }

    pub fn follow_for(&self, path: &str) -> String {
        render(&self.follow, path)
    }
}

impl Default for RemoteCommands {
    fn default() -> Self {
        Self {
            size: constants::DEFAULT_SIZE_COMMAND.to_string(),
            follow: constants::DEFAULT_TAIL_COMMAND.to_string(),
        }
    }
}

fn render(template: &str, path: &str) -> String {
    template.replace(constants::FILE_PLACEHOLDER, path)
}

// =============================================================================
// Line emitter
// =============================================================================

/// The single append entry point used by tail workers.
///
/// Data lines take the next sequence number of the current generation,
/// starting at 1. Status lines always use 0 and leave the counter alone.
pub struct LineEmitter {
    sink: Arc<LineSink>,
    registry: Arc<SchemeRegistry>,
    next_seq: AtomicU64,
    description: String,
}

impl LineEmitter {
    pub fn new(sink: Arc<LineSink>, registry: Arc<SchemeRegistry>, target: &TailTarget) -> Self {
        Self {
            sink,
            registry,
            next_seq: AtomicU64::new(1),
            description: target.describe(),
        }
    }

    /// Classify `text` under the current scheme and append it.
    ///
    /// Returns false when nothing was appended (empty input).
    pub fn enqueue(&self, text: &str, is_status: bool) -> bool {
        if text.is_empty() {
            return false;
        }
        let scheme = self.registry.current();
        let sequence = if is_status {
            0
        } else {
            self.next_seq.fetch_add(1, Ordering::SeqCst)
        };
        match classify(text, sequence, &scheme) {
            Some(line) => {
                self.sink.push(line);
                true
            }
            None => false,
        }
    }

    /// Start a fresh generation: counter back to 1, sink cleared, restarted
    /// flag raised.
    pub fn begin_generation(&self) {
        self.next_seq.store(1, Ordering::SeqCst);
        self.sink.reset();
        let started = chrono::Local::now().format(constants::STATUS_TIME_FORMAT);
        self.sink
            .set_supplementary(format!("{} (since {started})", self.description));
        tracing::debug!(target_desc = %self.description, "New generation started");
    }

    pub fn set_state(&self, state: TailState, primary: impl Into<String>) {
        self.sink.set_status(state, primary);
    }

    /// Data lines appended in the current generation.
    pub fn line_count(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst).saturating_sub(1)
    }

    pub fn sink(&self) -> &Arc<LineSink> {
        &self.sink
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

// =============================================================================
// Tail source contract
// =============================================================================

/// Behaviour shared by every tail source variant.
///
/// `close` is idempotent and joins every worker the source owns before
/// returning. `restart` begins a new generation against the same target.
pub trait TailSource: Send {
    fn target(&self) -> &TailTarget;

    fn emitter(&self) -> &Arc<LineEmitter>;

    fn close(&mut self);

    fn restart(&mut self);

    /// Append a line through this source's emitter.
    fn enqueue(&self, text: &str, is_status: bool) -> bool {
        self.emitter().enqueue(text, is_status)
    }

    /// Take the fatal error that stopped this source, if any.
    fn take_fault(&self) -> Option<TailError> {
        None
    }
}

/// Sleep for `total_ms` in `slice_ms` steps, returning early once `running`
/// is cleared. Returns whether the caller should keep running.
pub(crate) fn sleep_while_running(running: &AtomicBool, total_ms: u64, slice_ms: u64) -> bool {
    let slice_ms = slice_ms.max(1);
    let slices = (total_ms / slice_ms).max(1);
    for _ in 0..slices {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        std::thread::sleep(Duration::from_millis(slice_ms));
    }
    running.load(Ordering::SeqCst)
}
