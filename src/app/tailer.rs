// LogTailer - app/tailer.rs
//
// Consumer facade over the tail engine. Owns the scheme registry handle, the
// shared sink and at most one active source.
//
// The sink outlives individual sources so status lines from a failed open
// remain drainable. Opening a target always closes the previous source first.

use crate::app::local::LocalTailSource;
use crate::app::remote::{RemoteShell, RemoteTailSource};
use crate::app::sink::{Drained, LineSink, TailStatus};
use crate::app::source::{LineEmitter, RemoteCommands, RemoteTarget, TailSource, TailTarget};
use crate::core::model::SeverityScheme;
use crate::core::registry::SchemeRegistry;
use crate::util::error::TailError;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Tailer {
    registry: Arc<SchemeRegistry>,
    commands: RemoteCommands,
    sink: Arc<LineSink>,
    source: Option<Box<dyn TailSource>>,
}

impl Tailer {
    pub fn new(registry: Arc<SchemeRegistry>, commands: RemoteCommands) -> Self {
        Self {
            registry,
            commands,
            sink: Arc::new(LineSink::new()),
            source: None,
        }
    }

    /// Start tailing a local file.
    pub fn open_local(&mut self, path: impl Into<PathBuf>) {
        self.close();
        let path = path.into();
        let emitter = self.emitter_for(&TailTarget::Local(path.clone()));
        self.source = Some(Box::new(LocalTailSource::open(path, emitter)));
    }

    /// Connect to a remote host and start tailing a file there.
    pub fn open_remote(&mut self, target: RemoteTarget) -> Result<(), TailError> {
        self.close();
        let emitter = self.emitter_for(&TailTarget::Remote(target.clone()));
        let source = RemoteTailSource::open(target, &self.commands, emitter)?;
        self.source = Some(Box::new(source));
        Ok(())
    }

    /// Start tailing a remote file over an existing shell.
    pub fn open_remote_with_shell(&mut self, target: RemoteTarget, shell: Arc<dyn RemoteShell>) {
        self.close();
        let emitter = self.emitter_for(&TailTarget::Remote(target.clone()));
        self.source = Some(Box::new(RemoteTailSource::with_shell(
            target,
            &self.commands,
            emitter,
            shell,
        )));
    }

    /// Stop the active source and join its workers. No-op when idle.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            tracing::debug!(target_desc = %source.target().describe(), "Closing tail source");
            source.close();
        }
    }

    /// Begin a new generation of the active source.
    pub fn restart(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.restart();
        }
    }

    /// Take every line produced since the previous call.
    pub fn drain_new_lines(&self) -> Drained {
        self.sink.drain()
    }

    /// `(primary, supplementary)` human status.
    pub fn status_summary(&self) -> (String, String) {
        let status = self.sink.status();
        (status.primary, status.supplementary)
    }

    pub fn status(&self) -> TailStatus {
        self.sink.status()
    }

    /// Make `name` the current scheme and restart the active source so new
    /// lines are classified under it. Unknown names fall back to the first
    /// registered scheme.
    pub fn select_scheme(&mut self, name: &str) -> Arc<SeverityScheme> {
        let scheme = self.registry.set_current(name);
        tracing::info!(scheme = %scheme.name, "Scheme selected");
        self.restart();
        scheme
    }

    /// Take the error that stopped the active source, if any.
    pub fn take_fault(&self) -> Option<TailError> {
        self.source.as_ref().and_then(|s| s.take_fault())
    }

    pub fn target(&self) -> Option<&TailTarget> {
        self.source.as_ref().map(|s| s.target())
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn registry(&self) -> &Arc<SchemeRegistry> {
        &self.registry
    }

    fn emitter_for(&self, target: &TailTarget) -> Arc<LineEmitter> {
        Arc::new(LineEmitter::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.registry),
            target,
        ))
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        self.close();
    }
}
