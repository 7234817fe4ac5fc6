// LogTailer - platform/ssh.rs
//
// SSH session used by the remote tail source.
//
// One authenticated `ssh2::Session` carries two independent command channels
// (size reports and the follow stream). After authentication the session is
// switched to non-blocking mode so neither channel can stall the other: a
// call that would block returns EAGAIN and is retried, and a follow channel
// with nothing to read reports `OutputPoll::Idle`. Closing a channel also
// retries EAGAIN, bounded by SSH_CHANNEL_CLOSE_TIMEOUT_MS.
//
// Passwords are passed straight to libssh2 and never logged.

use crate::util::constants::{
    REMOTE_COMMAND_TIMEOUT_SECS, REMOTE_READ_CHUNK_BYTES, SSH_CHANNEL_CLOSE_TIMEOUT_MS,
    SSH_CONNECT_TIMEOUT_SECS, SSH_RETRY_INTERVAL_MS,
};
use crate::util::error::TailError;
use ssh2::{Channel, ErrorCode, Session};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// libssh2's "would block" session error code.
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

/// libssh2's "authentication failed" session error code.
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;

/// One way of authenticating the remote user.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    /// Path to an unencrypted private key file.
    PrivateKey(PathBuf),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PrivateKey(p) => write!(f, "PrivateKey({})", p.display()),
        }
    }
}

/// Build the ordered list of methods to try: password first, then key.
/// Empty values are ignored.
pub fn auth_methods(password: Option<&str>, key: Option<&Path>) -> Vec<AuthMethod> {
    let mut methods = Vec::with_capacity(2);
    if let Some(p) = password.filter(|p| !p.is_empty()) {
        methods.push(AuthMethod::Password(p.to_string()));
    }
    if let Some(k) = key.filter(|k| !k.as_os_str().is_empty()) {
        methods.push(AuthMethod::PrivateKey(k.to_path_buf()));
    }
    methods
}

/// Result of one non-blocking read from a follow channel.
#[derive(Debug, PartialEq, Eq)]
pub enum OutputPoll {
    Data(Vec<u8>),
    /// Nothing available right now.
    Idle,
    /// The remote command exited and its output is exhausted.
    Finished,
}

/// An authenticated SSH session.
pub struct SshShell {
    session: Session,
    host: String,
}

impl SshShell {
    /// Connect and authenticate.
    ///
    /// Fails before touching the network when `methods` is empty. Methods are
    /// tried in order until one succeeds.
    pub fn connect(
        host: &str,
        port: u16,
        user: &str,
        methods: &[AuthMethod],
    ) -> Result<Self, TailError> {
        if methods.is_empty() {
            return Err(TailError::NoAuthMethods {
                host: host.to_string(),
            });
        }

        let connect_err = |source: io::Error| TailError::Connect {
            host: host.to_string(),
            port,
            source,
        };
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host name did not resolve to any address",
                ))
            })?;
        let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(SSH_CONNECT_TIMEOUT_SECS))
            .map_err(connect_err)?;

        let ssh_err = |operation: &'static str| {
            move |source: ssh2::Error| TailError::Ssh {
                host: host.to_string(),
                operation,
                source,
            }
        };
        let mut session = Session::new().map_err(ssh_err("session setup"))?;
        session.set_tcp_stream(tcp);
        session.set_timeout((SSH_CONNECT_TIMEOUT_SECS * 1_000) as u32);
        session.handshake().map_err(ssh_err("handshake"))?;

        let mut last_error = None;
        for method in methods {
            let attempt = match method {
                AuthMethod::Password(password) => session.userauth_password(user, password),
                AuthMethod::PrivateKey(key) => session.userauth_pubkey_file(user, None, key, None),
            };
            match attempt {
                Ok(()) if session.authenticated() => break,
                Ok(()) => {}
                Err(e) => {
                    tracing::debug!(host, method = ?method, error = %e, "SSH auth method rejected");
                    last_error = Some(e);
                }
            }
        }
        if !session.authenticated() {
            let source = last_error.unwrap_or_else(|| {
                ssh2::Error::new(
                    ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED),
                    "all authentication methods were rejected",
                )
            });
            return Err(TailError::Ssh {
                host: host.to_string(),
                operation: "authentication",
                source,
            });
        }

        session.set_blocking(false);
        tracing::info!(host, port, user, "SSH session established");
        Ok(Self {
            session,
            host: host.to_string(),
        })
    }

    /// Run `command` to completion and return its standard output.
    ///
    /// Bounded by `REMOTE_COMMAND_TIMEOUT_SECS`.
    pub fn run(&self, command: &str) -> Result<String, TailError> {
        let deadline = Instant::now() + Duration::from_secs(REMOTE_COMMAND_TIMEOUT_SECS);
        let mut channel = self.exec(command, deadline)?;

        let mut output = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match channel.read(&mut buf) {
                Ok(0) if channel.eof() => break,
                Ok(0) => self.wait_until(deadline, command)?,
                Ok(n) => output.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait_until(deadline, command)?
                }
                Err(e) => return Err(command_error(&self.host, command, e.to_string())),
            }
        }
        // The output is complete; a failed close only leaks the channel.
        if let Err(e) = close_channel(&mut channel, &self.host, command) {
            tracing::debug!(host = %self.host, error = %e, "Command channel close failed");
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Start `command` and return its output stream for polling.
    pub fn follow(&self, command: &str) -> Result<SshOutput, TailError> {
        let deadline = Instant::now() + Duration::from_secs(REMOTE_COMMAND_TIMEOUT_SECS);
        let channel = self.exec(command, deadline)?;
        tracing::debug!(host = %self.host, command, "Follow command started");
        Ok(SshOutput {
            channel,
            host: self.host.clone(),
            command: command.to_string(),
        })
    }

    /// Tear the session down. In-flight channel reads fail afterwards.
    pub fn disconnect(&self) {
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            tracing::debug!(host = %self.host, error = %e, "SSH disconnect reported an error");
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn exec(&self, command: &str, deadline: Instant) -> Result<Channel, TailError> {
        let mut channel = self.retry(command, "channel open", deadline, || {
            self.session.channel_session()
        })?;
        self.retry(command, "exec", deadline, || channel.exec(command))?;
        Ok(channel)
    }

    fn retry<T>(
        &self,
        command: &str,
        operation: &'static str,
        deadline: Instant,
        call: impl FnMut() -> Result<T, ssh2::Error>,
    ) -> Result<T, TailError> {
        retry(&self.host, command, operation, deadline, call)
    }

    fn wait_until(&self, deadline: Instant, command: &str) -> Result<(), TailError> {
        wait_until(&self.host, deadline, command)
    }
}

/// Repeat a libssh2 call while it reports EAGAIN, up to `deadline`.
fn retry<T>(
    host: &str,
    command: &str,
    operation: &'static str,
    deadline: Instant,
    mut call: impl FnMut() -> Result<T, ssh2::Error>,
) -> Result<T, TailError> {
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(e) if e.code() == ErrorCode::Session(LIBSSH2_ERROR_EAGAIN) => {
                wait_until(host, deadline, command)?;
            }
            Err(source) => {
                return Err(TailError::Ssh {
                    host: host.to_string(),
                    operation,
                    source,
                })
            }
        }
    }
}

fn wait_until(host: &str, deadline: Instant, command: &str) -> Result<(), TailError> {
    let now = Instant::now();
    if now >= deadline {
        return Err(command_error(host, command, "no response before the deadline".to_string()));
    }
    std::thread::sleep(Duration::from_millis(SSH_RETRY_INTERVAL_MS).min(deadline - now));
    Ok(())
}

fn command_error(host: &str, command: &str, reason: String) -> TailError {
    TailError::Command {
        host: host.to_string(),
        command: command.to_string(),
        reason,
    }
}

/// Send our close and wait for the peer's, retrying EAGAIN for at most
/// `SSH_CHANNEL_CLOSE_TIMEOUT_MS`.
fn close_channel(channel: &mut Channel, host: &str, command: &str) -> Result<(), TailError> {
    let deadline = Instant::now() + Duration::from_millis(SSH_CHANNEL_CLOSE_TIMEOUT_MS);
    retry(host, command, "channel close", deadline, || channel.close())?;
    retry(host, command, "channel wait close", deadline, || channel.wait_close())
}

/// Output stream of a running follow command.
pub struct SshOutput {
    channel: Channel,
    host: String,
    command: String,
}

impl SshOutput {
    pub fn poll(&mut self) -> Result<OutputPoll, TailError> {
        let mut buf = vec![0u8; REMOTE_READ_CHUNK_BYTES];
        match self.channel.read(&mut buf) {
            Ok(0) if self.channel.eof() => Ok(OutputPoll::Finished),
            Ok(0) => Ok(OutputPoll::Idle),
            Ok(n) => {
                buf.truncate(n);
                Ok(OutputPoll::Data(buf))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(OutputPoll::Idle),
            Err(e) => Err(command_error(&self.host, &self.command, e.to_string())),
        }
    }

    /// Close the channel, waiting briefly for the remote side to confirm.
    pub fn close(&mut self) {
        if let Err(e) = close_channel(&mut self.channel, &self.host, &self.command) {
            tracing::debug!(host = %self.host, error = %e, "Follow channel close failed");
        }
    }
}
