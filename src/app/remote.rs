// LogTailer - app/remote.rs
//
// Remote command tail source. Two workers share one remote session:
//
//   Size Monitor  - runs the size command every REMOTE_SIZE_POLL_INTERVAL_MS
//                   and drives the lifecycle: it starts the streamer when the
//                   file appears, stops it when the file vanishes, and bounces
//                   it when the file shrinks.
//   Tail Streamer - runs the follow command and turns its output into lines.
//                   If the command exits while the streamer should still run,
//                   the command is issued again.
//
// Every streamer start begins a new generation. The streamer slot is guarded
// by a mutex so a monitor-triggered bounce and a consumer restart never
// interleave.
//
// Faults (session loss, command failure) stop the whole source: the running
// flag is cleared, the error is appended as a status line and parked in the
// fault slot for the consumer. The monitor does not reconnect.

use crate::app::source::{
    sleep_while_running, LineEmitter, RemoteCommands, RemoteTarget, TailSource, TailTarget,
};
use crate::core::model::TailState;
use crate::platform::ssh::{self, SshOutput, SshShell};
use crate::util::constants::{
    MAX_PARTIAL_LINE_BYTES, REMOTE_CANCEL_CHECK_INTERVAL_MS, REMOTE_IDLE_BACKOFF_MS,
    REMOTE_SIZE_POLL_INTERVAL_MS,
};
use crate::util::error::TailError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use crate::platform::ssh::OutputPoll;

// =============================================================================
// Remote shell seam
// =============================================================================

/// A session able to run independent commands concurrently.
pub trait RemoteShell: Send + Sync {
    /// Run a command to completion and return its output.
    fn run(&self, command: &str) -> Result<String, TailError>;

    /// Start a long-running command and return its output stream.
    fn follow(&self, command: &str) -> Result<Box<dyn RemoteOutput>, TailError>;

    /// Tear the session down, failing any in-flight reads.
    fn disconnect(&self);
}

/// Output of a running follow command. `poll` must not block indefinitely.
pub trait RemoteOutput: Send {
    fn poll(&mut self) -> Result<OutputPoll, TailError>;

    fn close(&mut self);
}

impl RemoteShell for SshShell {
    fn run(&self, command: &str) -> Result<String, TailError> {
        SshShell::run(self, command)
    }

    fn follow(&self, command: &str) -> Result<Box<dyn RemoteOutput>, TailError> {
        Ok(Box::new(SshShell::follow(self, command)?))
    }

    fn disconnect(&self) {
        SshShell::disconnect(self)
    }
}

impl RemoteOutput for SshOutput {
    fn poll(&mut self) -> Result<OutputPoll, TailError> {
        SshOutput::poll(self)
    }

    fn close(&mut self) {
        SshOutput::close(self)
    }
}

// =============================================================================
// Size tracking
// =============================================================================

/// Parse the size command's output. Empty or non-numeric output means the
/// file does not exist and yields -1.
pub fn parse_size_output(output: &str) -> i64 {
    output.trim().parse::<i64>().unwrap_or(-1)
}

/// Lifecycle transition decided from one size reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEvent {
    /// Nothing to do.
    Unchanged,
    /// File absent and not yet reported as such; reported once per source.
    WaitingForCreation,
    /// File existed and is now gone.
    Vanished,
    /// File exists after being absent (or unknown).
    Appeared,
    /// File is smaller than at the previous reading.
    Shrunk,
}

/// Existence and length state of the remote file across size readings.
#[derive(Debug, Default)]
pub struct SizeTracker {
    exists: bool,
    warned: bool,
    last_len: i64,
}

impl SizeTracker {
    pub fn observe(&mut self, len: i64) -> SizeEvent {
        if len < 0 {
            if self.exists {
                self.exists = false;
                return SizeEvent::Vanished;
            }
            if !self.warned {
                self.warned = true;
                return SizeEvent::WaitingForCreation;
            }
            return SizeEvent::Unchanged;
        }

        if !self.exists {
            self.exists = true;
            self.last_len = len;
            return SizeEvent::Appeared;
        }
        let shrunk = len < self.last_len;
        self.last_len = len;
        if shrunk {
            SizeEvent::Shrunk
        } else {
            SizeEvent::Unchanged
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }
}

// =============================================================================
// Shared state
// =============================================================================

struct StreamerWorker {
    tailing: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// State shared by the source handle and both workers.
struct RemoteShared {
    shell: Arc<dyn RemoteShell>,
    emitter: Arc<LineEmitter>,
    /// Cleared by `close` or by a fault; stops both workers.
    running: AtomicBool,
    host: String,
    path: String,
    size_command: String,
    follow_command: String,
    streamer: Mutex<Option<StreamerWorker>>,
    fault: Mutex<Option<TailError>>,
}

impl RemoteShared {
    fn new(
        target: &RemoteTarget,
        commands: &RemoteCommands,
        emitter: Arc<LineEmitter>,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            shell,
            emitter,
            running: AtomicBool::new(true),
            host: target.host.clone(),
            path: target.path.clone(),
            size_command: commands.size_for(&target.path),
            follow_command: commands.follow_for(&target.path),
            streamer: Mutex::new(None),
            fault: Mutex::new(None),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin a new generation and launch the streamer into `slot`.
    fn start_streamer(self: &Arc<Self>, slot: &mut Option<StreamerWorker>, note: Option<&str>) {
        self.emitter.begin_generation();
        if let Some(note) = note {
            self.emitter.enqueue(note, true);
        }
        self.emitter.enqueue("Starting tail", true);
        self.emitter.set_state(TailState::Opening, "Starting tail");

        let tailing = Arc::new(AtomicBool::new(true));
        let shared = Arc::clone(self);
        let flag = Arc::clone(&tailing);
        let handle = std::thread::spawn(move || run_streamer(&shared, &flag));
        *slot = Some(StreamerWorker { tailing, handle });
        tracing::info!(host = %self.host, file = %self.path, "Tail streamer started");
    }

    /// Stop and join the streamer in `slot`, if any. Returns whether one ran.
    fn stop_streamer(&self, slot: &mut Option<StreamerWorker>) -> bool {
        let Some(worker) = slot.take() else {
            return false;
        };
        self.emitter.enqueue("Stopping tail", true);
        worker.tailing.store(false, Ordering::SeqCst);
        if worker.handle.join().is_err() {
            self.fail(TailError::WorkerPanicked {
                worker: "tail streamer",
            });
        }
        tracing::info!(host = %self.host, file = %self.path, "Tail streamer stopped");
        true
    }

    /// Stop the source because of `err` and park the error for the consumer.
    fn fail(&self, err: TailError) {
        self.running.store(false, Ordering::SeqCst);
        let msg = err.to_string();
        tracing::error!(host = %self.host, error = %msg, "Remote tail failed");
        self.emitter.enqueue(&msg, true);
        self.emitter.set_state(TailState::Stopped, msg);
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(err);
        }
    }
}

// =============================================================================
// Size Monitor
// =============================================================================

/// Lifecycle driver for a remote source.
pub struct SizeMonitor {
    shared: Arc<RemoteShared>,
    tracker: SizeTracker,
}

impl SizeMonitor {
    fn new(shared: Arc<RemoteShared>) -> Self {
        Self {
            shared,
            tracker: SizeTracker::default(),
        }
    }

    /// Run the size command once and act on the result.
    pub fn poll_once(&mut self) -> Result<SizeEvent, TailError> {
        let shared = &self.shared;
        let output = shared.shell.run(&shared.size_command)?;
        let len = parse_size_output(&output);
        let event = self.tracker.observe(len);
        tracing::debug!(host = %shared.host, file = %shared.path, len, event = ?event, "Size check");

        match event {
            SizeEvent::Unchanged => {}
            SizeEvent::WaitingForCreation => {
                shared.emitter.enqueue(
                    &format!("File {} doesn't exist, waiting for creation...", shared.path),
                    true,
                );
                shared
                    .emitter
                    .set_state(TailState::Waiting, "Waiting for file creation");
            }
            SizeEvent::Vanished => {
                shared
                    .emitter
                    .enqueue(&format!("File {} doesn't exist", shared.path), true);
                let mut slot = shared.streamer.lock();
                shared.stop_streamer(&mut slot);
                shared
                    .emitter
                    .set_state(TailState::Waiting, "Waiting for file creation");
            }
            SizeEvent::Appeared => {
                let mut slot = shared.streamer.lock();
                shared.stop_streamer(&mut slot);
                let note = format!("Opening {}", shared.path);
                shared.start_streamer(&mut slot, Some(note.as_str()));
            }
            SizeEvent::Shrunk => {
                tracing::info!(host = %shared.host, file = %shared.path, len, "Remote file shrank");
                let mut slot = shared.streamer.lock();
                shared.stop_streamer(&mut slot);
                let note = format!("File size is smaller, reopen from start {}", shared.path);
                shared.start_streamer(&mut slot, Some(note.as_str()));
            }
        }
        Ok(event)
    }

    /// Poll until the source stops. A command failure while still running is
    /// fatal to the source.
    fn run(&mut self) {
        while self.shared.is_running() {
            if let Err(e) = self.poll_once() {
                if self.shared.is_running() {
                    self.shared.fail(e);
                } else {
                    tracing::debug!(error = %e, "Size command interrupted by close");
                }
                return;
            }
            sleep_while_running(
                &self.shared.running,
                REMOTE_SIZE_POLL_INTERVAL_MS,
                REMOTE_CANCEL_CHECK_INTERVAL_MS,
            );
        }
    }

    pub fn tracker(&self) -> &SizeTracker {
        &self.tracker
    }
}

// =============================================================================
// Tail Streamer
// =============================================================================

/// How one follow command ended.
enum FollowEnd {
    /// Told to stop.
    Stopped,
    /// The remote command exited; issue it again.
    Finished,
    Failed(TailError),
}

fn run_streamer(shared: &RemoteShared, tailing: &AtomicBool) {
    let active = || tailing.load(Ordering::SeqCst) && shared.is_running();

    while active() {
        let mut output = match shared.shell.follow(&shared.follow_command) {
            Ok(o) => o,
            Err(e) => {
                if active() {
                    shared.fail(e);
                }
                break;
            }
        };

        let end = stream_output(shared, output.as_mut(), &active);
        output.close();
        match end {
            FollowEnd::Stopped => break,
            FollowEnd::Finished => {
                tracing::debug!(host = %shared.host, file = %shared.path, "Follow command exited; reissuing");
                std::thread::sleep(Duration::from_millis(REMOTE_IDLE_BACKOFF_MS));
            }
            FollowEnd::Failed(e) => {
                // A read failing during a stop is the expected way out.
                if active() {
                    shared.fail(e);
                }
                break;
            }
        }
    }
}

fn stream_output(
    shared: &RemoteShared,
    output: &mut dyn RemoteOutput,
    active: &dyn Fn() -> bool,
) -> FollowEnd {
    let emitter = &shared.emitter;
    let mut partial: Vec<u8> = Vec::new();

    while active() {
        match output.poll() {
            Ok(OutputPoll::Data(bytes)) => {
                partial.extend_from_slice(&bytes);
                while let Some(pos) = partial.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = partial.drain(..=pos).collect();
                    emit_line(emitter, &line);
                }
                if partial.len() > MAX_PARTIAL_LINE_BYTES {
                    tracing::warn!(bytes = partial.len(), "Remote partial line exceeds limit, emitting as-is");
                    emit_line(emitter, &partial);
                    partial.clear();
                }
                emitter.set_state(
                    TailState::CatchingUp,
                    format!("{} lines (reading)", emitter.line_count()),
                );
            }
            Ok(OutputPoll::Idle) => {
                emitter.set_state(
                    TailState::Waiting,
                    format!("{} lines (waiting)", emitter.line_count()),
                );
                std::thread::sleep(Duration::from_millis(REMOTE_IDLE_BACKOFF_MS));
            }
            Ok(OutputPoll::Finished) => {
                emit_line(emitter, &partial);
                return FollowEnd::Finished;
            }
            Err(e) => return FollowEnd::Failed(e),
        }
    }
    FollowEnd::Stopped
}

fn emit_line(emitter: &LineEmitter, bytes: &[u8]) {
    let decoded = String::from_utf8_lossy(bytes);
    emitter.enqueue(decoded.trim_end_matches(['\n', '\r']), false);
}

// =============================================================================
// Source handle
// =============================================================================

/// Tails a file on a remote host through a `RemoteShell`.
pub struct RemoteTailSource {
    target: TailTarget,
    shared: Arc<RemoteShared>,
    monitor: Option<JoinHandle<()>>,
}

impl RemoteTailSource {
    /// Connect over SSH and start monitoring `target`.
    ///
    /// Connection and authentication failures are fatal and returned; they
    /// are also appended to the sink as a status line.
    pub fn open(
        target: RemoteTarget,
        commands: &RemoteCommands,
        emitter: Arc<LineEmitter>,
    ) -> Result<Self, TailError> {
        emitter.set_state(TailState::Opening, format!("Connecting to {}", target.host));
        let methods = ssh::auth_methods(target.password.as_deref(), target.key_path.as_deref());
        match SshShell::connect(&target.host, target.port, &target.user, &methods) {
            Ok(shell) => Ok(Self::with_shell(target, commands, emitter, Arc::new(shell))),
            Err(e) => {
                let msg = format!("Failed to connect, {e}");
                emitter.enqueue(&msg, true);
                emitter.set_state(TailState::Stopped, msg);
                Err(e)
            }
        }
    }

    /// Start monitoring `target` over an already-connected shell.
    pub fn with_shell(
        target: RemoteTarget,
        commands: &RemoteCommands,
        emitter: Arc<LineEmitter>,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        let shared = Arc::new(RemoteShared::new(&target, commands, emitter, shell));
        let mut monitor = SizeMonitor::new(Arc::clone(&shared));
        let handle = std::thread::spawn(move || monitor.run());
        tracing::info!(host = %target.host, file = %target.path, "Remote tail started");
        Self {
            target: TailTarget::Remote(target),
            shared,
            monitor: Some(handle),
        }
    }

    pub fn streamer_running(&self) -> bool {
        self.shared.streamer.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

impl TailSource for RemoteTailSource {
    fn target(&self) -> &TailTarget {
        &self.target
    }

    fn emitter(&self) -> &Arc<LineEmitter> {
        &self.shared.emitter
    }

    fn close(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        {
            let mut slot = self.shared.streamer.lock();
            self.shared.stop_streamer(&mut slot);
        }
        // Unblocks a size command still waiting on the session.
        self.shared.shell.disconnect();
        if monitor.join().is_err() {
            tracing::error!(host = %self.shared.host, "Size monitor panicked");
        }
        self.shared.emitter.enqueue("Tail stopped", true);
        self.shared.emitter.set_state(TailState::Stopped, "Tail stopped");
        tracing::info!(host = %self.shared.host, file = %self.shared.path, "Remote tail closed");
    }

    /// Bounce the streamer. The size monitor keeps running. While the file
    /// is absent there is no streamer, so only a new generation is begun.
    fn restart(&mut self) {
        if !self.shared.is_running() {
            return;
        }
        let mut slot = self.shared.streamer.lock();
        if self.shared.stop_streamer(&mut slot) {
            self.shared.start_streamer(&mut slot, None);
        } else {
            self.shared.emitter.begin_generation();
        }
    }

    fn take_fault(&self) -> Option<TailError> {
        self.shared.fault.lock().take()
    }
}

impl Drop for RemoteTailSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sink::{Drained, LineSink};
    use crate::core::model::SeverityScheme;
    use crate::core::registry::SchemeRegistry;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const PATH: &str = "/var/log/app.log";

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

    fn connection_lost() -> TailError {
        TailError::Command {
            host: "db1".to_string(),
            command: "tail".to_string(),
            reason: "connection lost".to_string(),
        }
    }

    /// Follow output replaying fixed chunks, then idling, finishing or
    /// failing.
    struct ScriptedOutput {
        chunks: VecDeque<Vec<u8>>,
        finish: bool,
        fail: bool,
        /// When set, the read blocks until the flag is raised, then fails.
        release: Option<Arc<AtomicBool>>,
    }

    impl RemoteOutput for ScriptedOutput {
        fn poll(&mut self) -> Result<OutputPoll, TailError> {
            if let Some(c) = self.chunks.pop_front() {
                return Ok(OutputPoll::Data(c));
            }
            if let Some(release) = &self.release {
                while !release.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                return Err(connection_lost());
            }
            if self.fail {
                return Err(connection_lost());
            }
            Ok(if self.finish {
                OutputPoll::Finished
            } else {
                OutputPoll::Idle
            })
        }

        fn close(&mut self) {}
    }

    /// Shell answering size commands from a script (the last answer repeats)
    /// and follow commands with the same chunks each time.
    #[derive(Default)]
    struct ScriptedShell {
        sizes: Mutex<VecDeque<String>>,
        last_size: Mutex<String>,
        chunks: Vec<&'static str>,
        finish: bool,
        fail_run: bool,
        fail_follow: bool,
        fail_output: bool,
        release: Option<Arc<AtomicBool>>,
        follows: AtomicUsize,
        disconnected: AtomicBool,
    }

    impl ScriptedShell {
        fn with_sizes(sizes: &[&str]) -> Self {
            Self {
                sizes: Mutex::new(sizes.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }
    }

    impl RemoteShell for ScriptedShell {
        fn run(&self, command: &str) -> Result<String, TailError> {
            if self.fail_run {
                return Err(TailError::Command {
                    host: "db1".to_string(),
                    command: command.to_string(),
                    reason: "channel closed".to_string(),
                });
            }
            let mut last = self.last_size.lock();
            if let Some(next) = self.sizes.lock().pop_front() {
                *last = next;
            }
            Ok(last.clone())
        }

        fn follow(&self, command: &str) -> Result<Box<dyn RemoteOutput>, TailError> {
            self.follows.fetch_add(1, Ordering::SeqCst);
            if self.fail_follow {
                return Err(TailError::Command {
                    host: "db1".to_string(),
                    command: command.to_string(),
                    reason: "exec refused".to_string(),
                });
            }
            Ok(Box::new(ScriptedOutput {
                chunks: self.chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                finish: self.finish,
                fail: self.fail_output,
                release: self.release.clone(),
            }))
        }

        fn disconnect(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
    }

    fn target() -> RemoteTarget {
        RemoteTarget::new("db1", "ops", PATH)
    }

    fn emitter(sink: &Arc<LineSink>) -> Arc<LineEmitter> {
        let registry = Arc::new(SchemeRegistry::new(SeverityScheme::plain()).unwrap());
        Arc::new(LineEmitter::new(
            Arc::clone(sink),
            registry,
            &TailTarget::Remote(target()),
        ))
    }

    fn status_texts(drained: &Drained) -> Vec<String> {
        drained
            .lines
            .iter()
            .filter(|l| l.is_status())
            .map(|l| l.text().to_string())
            .collect()
    }

    fn shutdown(shared: &RemoteShared) {
        shared.running.store(false, Ordering::SeqCst);
        let mut slot = shared.streamer.lock();
        shared.stop_streamer(&mut slot);
    }

    #[test]
    fn test_parse_size_output() {
        assert_eq!(parse_size_output("120\n"), 120);
        assert_eq!(parse_size_output("  0 "), 0);
        assert_eq!(parse_size_output(""), -1);
        assert_eq!(parse_size_output("stat: cannot stat"), -1);
    }

    #[test]
    fn test_tracker_sequence() {
        let mut tracker = SizeTracker::default();
        let events: Vec<SizeEvent> = [-1, -1, 120, 120, 40, 50, -1, -1, 10]
            .into_iter()
            .map(|len| tracker.observe(len))
            .collect();
        assert_eq!(
            events,
            vec![
                SizeEvent::WaitingForCreation,
                SizeEvent::Unchanged,
                SizeEvent::Appeared,
                SizeEvent::Unchanged,
                SizeEvent::Shrunk,
                SizeEvent::Unchanged,
                SizeEvent::Vanished,
                SizeEvent::Unchanged,
                SizeEvent::Appeared,
            ]
        );
    }

    #[test]
    fn test_absent_after_vanish_waits_for_creation_once() {
        let mut tracker = SizeTracker::default();
        let events: Vec<SizeEvent> = [100, -1, -1, -1]
            .into_iter()
            .map(|len| tracker.observe(len))
            .collect();
        assert_eq!(
            events,
            vec![
                SizeEvent::Appeared,
                SizeEvent::Vanished,
                SizeEvent::WaitingForCreation,
                SizeEvent::Unchanged,
            ]
        );
    }

    #[test]
    fn test_size_sequence_drives_streamer() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell::with_sizes(&["", "", "120", "120", "40"]));
        let shared = Arc::new(RemoteShared::new(
            &target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        ));
        let mut monitor = SizeMonitor::new(Arc::clone(&shared));

        // Absent: one waiting notice.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::WaitingForCreation);
        let d = sink.drain();
        assert_eq!(
            status_texts(&d),
            vec![format!("File {PATH} doesn't exist, waiting for creation...")]
        );

        // Still absent: silent.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Unchanged);
        assert!(sink.drain().lines.is_empty());

        // Created: opening notice and a streamer in a fresh generation.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Appeared);
        let d = sink.drain();
        assert!(d.restarted);
        assert_eq!(
            status_texts(&d),
            vec![format!("Opening {PATH}"), "Starting tail".to_string()]
        );
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) == 1));

        // Unchanged: nothing.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Unchanged);
        let d = sink.drain();
        assert!(!d.restarted);
        assert!(status_texts(&d).is_empty());

        // Shrunk: reopen notice and a bounced streamer.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Shrunk);
        let d = sink.drain();
        assert!(d.restarted);
        assert_eq!(
            status_texts(&d),
            vec![
                format!("File size is smaller, reopen from start {PATH}"),
                "Starting tail".to_string()
            ]
        );
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) == 2));

        shutdown(&shared);
    }

    #[test]
    fn test_vanished_file_stops_streamer() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell::with_sizes(&["100", "nope", "nope"]));
        let shared = Arc::new(RemoteShared::new(
            &target(),
            &RemoteCommands::default(),
            emitter(&sink),
            shell as Arc<dyn RemoteShell>,
        ));
        let mut monitor = SizeMonitor::new(Arc::clone(&shared));

        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Appeared);
        assert!(shared.streamer.lock().is_some());
        sink.drain();

        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Vanished);
        assert!(shared.streamer.lock().is_none());
        assert!(!monitor.tracker().exists());
        let texts = status_texts(&sink.drain());
        assert_eq!(texts, vec![format!("File {PATH} doesn't exist"), "Stopping tail".to_string()]);

        // Still absent on the next poll: the one-time creation notice.
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::WaitingForCreation);
        assert_eq!(
            status_texts(&sink.drain()),
            vec![format!("File {PATH} doesn't exist, waiting for creation...")]
        );
        assert_eq!(monitor.poll_once().unwrap(), SizeEvent::Unchanged);

        shutdown(&shared);
    }

    #[test]
    fn test_streamer_emits_lines_across_chunks() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell {
            chunks: vec!["first li", "ne\nsecond\r\n\n", "third\n"],
            ..ScriptedShell::with_sizes(&["100"])
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );

        let mut lines = Vec::new();
        assert!(wait_for(|| {
            let d = sink.drain();
            if d.restarted {
                lines.clear();
            }
            lines.extend(d.lines.into_iter().filter(|l| !l.is_status()));
            lines.len() == 3
        }));
        let texts: Vec<&str> = lines.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["first line", "second", "third"]);
        let seqs: Vec<u64> = lines.iter().map(|l| l.sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(wait_for(|| sink.status().primary == "3 lines (waiting)"));

        source.close();
        assert!(shell.disconnected.load(Ordering::SeqCst));
        assert_eq!(sink.state(), TailState::Stopped);
        assert!(!source.streamer_running());
    }

    #[test]
    fn test_finished_follow_is_reissued() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell {
            chunks: vec!["line\n"],
            finish: true,
            ..ScriptedShell::with_sizes(&["10"])
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) >= 2));
        assert!(source.take_fault().is_none());
        source.close();
    }

    #[test]
    fn test_size_command_failure_is_fatal() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell {
            fail_run: true,
            ..Default::default()
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            shell as Arc<dyn RemoteShell>,
        );

        assert!(wait_for(|| !source.is_running()));
        assert_eq!(sink.state(), TailState::Stopped);
        let fault = source.take_fault();
        assert!(matches!(fault, Some(TailError::Command { .. })));
        assert!(source.take_fault().is_none());
        let texts = status_texts(&sink.drain());
        assert!(texts.iter().any(|t| t.contains("channel closed")));
        source.close();
    }

    #[test]
    fn test_read_failure_while_tailing_is_fatal() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell {
            chunks: vec!["before the drop\n"],
            fail_output: true,
            ..ScriptedShell::with_sizes(&["100"])
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );

        assert!(wait_for(|| !source.is_running()));
        assert_eq!(sink.state(), TailState::Stopped);
        let fault = source.take_fault();
        assert!(
            matches!(fault, Some(TailError::Command { ref reason, .. }) if reason == "connection lost"),
            "fault: {fault:?}"
        );

        let d = sink.drain();
        assert!(d.lines.iter().any(|l| !l.is_status() && l.text() == "before the drop"));
        assert!(status_texts(&d).iter().any(|t| t.contains("connection lost")));
        // The streamer is not re-issued after a fault.
        assert_eq!(shell.follows.load(Ordering::SeqCst), 1);
        source.close();
    }

    #[test]
    fn test_read_failure_after_stop_is_not_a_fault() {
        let sink = Arc::new(LineSink::new());
        let release = Arc::new(AtomicBool::new(false));
        let shell = Arc::new(ScriptedShell {
            release: Some(Arc::clone(&release)),
            ..ScriptedShell::with_sizes(&["100"])
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );
        // The streamer is now blocked in a read.
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) == 1));

        // Stop first, then let the blocked read fail as a torn-down session would.
        source.shared.running.store(false, Ordering::SeqCst);
        release.store(true, Ordering::SeqCst);
        source.close();

        assert!(source.take_fault().is_none());
        assert_eq!(sink.state(), TailState::Stopped);
        let texts = status_texts(&sink.drain());
        assert!(!texts.iter().any(|t| t.contains("connection lost")), "{texts:?}");
        assert_eq!(texts.last().map(String::as_str), Some("Tail stopped"));
    }

    #[test]
    fn test_follow_command_failure_is_fatal() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell {
            fail_follow: true,
            ..ScriptedShell::with_sizes(&["100"])
        });
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );

        assert!(wait_for(|| !source.is_running()));
        assert_eq!(sink.state(), TailState::Stopped);
        let fault = source.take_fault();
        assert!(
            matches!(fault, Some(TailError::Command { ref reason, .. }) if reason == "exec refused"),
            "fault: {fault:?}"
        );
        assert!(status_texts(&sink.drain()).iter().any(|t| t.contains("exec refused")));
        source.close();
    }

    #[test]
    fn test_restart_bounces_running_streamer() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell::with_sizes(&["100"]));
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) == 1));
        sink.drain();

        source.restart();
        let d = sink.drain();
        assert!(d.restarted);
        assert_eq!(status_texts(&d), vec!["Starting tail".to_string()]);
        assert!(wait_for(|| shell.follows.load(Ordering::SeqCst) == 2));
        source.close();
    }

    #[test]
    fn test_restart_while_absent_only_begins_generation() {
        let sink = Arc::new(LineSink::new());
        let shell = Arc::new(ScriptedShell::with_sizes(&[""]));
        let mut source = RemoteTailSource::with_shell(
            target(),
            &RemoteCommands::default(),
            emitter(&sink),
            Arc::clone(&shell) as Arc<dyn RemoteShell>,
        );
        assert!(wait_for(|| sink.state() == TailState::Waiting));
        sink.drain();

        source.restart();
        let d = sink.drain();
        assert!(d.restarted);
        assert!(d.lines.is_empty());
        assert!(!source.streamer_running());
        assert_eq!(shell.follows.load(Ordering::SeqCst), 0);
        source.close();
    }
}
