// LogTailer - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Polling intervals are fixed for behavioural parity and are deliberately not
// exposed through config.toml.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTailer";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTailer";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Local file tail
// =============================================================================

/// Sleep between end-of-file checks while waiting for a local file to grow (ms).
pub const LOCAL_IDLE_BACKOFF_MS: u64 = 10;

/// Sleep before retrying to open a local file that does not exist yet (ms).
pub const LOCAL_OPEN_RETRY_MS: u64 = 1_000;

/// How often the running flag is checked inside the open-retry sleep (ms).
pub const LOCAL_CANCEL_CHECK_INTERVAL_MS: u64 = 50;

/// Read buffer capacity for the local file reader.
pub const LOCAL_READ_BUFFER_BYTES: usize = 64 * 1024; // 64 KiB

/// Maximum accumulated size of an in-progress (newline-less) line.
///
/// Guards against unbounded growth when a tailed file produces no newlines.
/// Once exceeded the fragment is emitted as a line of its own.
pub const MAX_PARTIAL_LINE_BYTES: usize = 1024 * 1024; // 1 MiB

// =============================================================================
// Remote tail
// =============================================================================

/// Interval between remote size checks (ms).
pub const REMOTE_SIZE_POLL_INTERVAL_MS: u64 = 20_000;

/// Slice used to sleep through the size poll interval so stop is prompt (ms).
pub const REMOTE_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Sleep when the follow command has produced no new output (ms).
pub const REMOTE_IDLE_BACKOFF_MS: u64 = 100;

/// Upper bound on a single size-report command round trip (s).
pub const REMOTE_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Sleep between retries of a non-blocking SSH call that would block (ms).
pub const SSH_RETRY_INTERVAL_MS: u64 = 10;

/// Upper bound on closing a command channel and waiting for the peer's close (ms).
pub const SSH_CHANNEL_CLOSE_TIMEOUT_MS: u64 = 2_000;

/// TCP connect timeout for the SSH session (s).
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Bytes requested per read from a remote follow channel.
pub const REMOTE_READ_CHUNK_BYTES: usize = 16 * 1024;

/// Placeholder substituted with the remote path in command templates.
pub const FILE_PLACEHOLDER: &str = "FILE";

/// Default size-report command. Prints nothing when the file is absent.
pub const DEFAULT_SIZE_COMMAND: &str = "stat -c %s FILE 2>/dev/null";

/// Default follow command.
pub const DEFAULT_TAIL_COMMAND: &str = "tail -n 1000 -f FILE";

// =============================================================================
// Severity schemes
// =============================================================================

/// Maximum number of levels a single scheme may define.
pub const MAX_SCHEME_LEVELS: usize = 32;

/// Maximum number of schemes held by a registry (built-in + user).
pub const MAX_SCHEMES: usize = 64;

/// Maximum end offset of a detection window (characters).
pub const MAX_DETECTION_WINDOW_END: usize = 4_096;

/// Scheme made current when the configuration names none.
pub const DEFAULT_SCHEME_NAME: &str = "Log4";

// =============================================================================
// Consumer defaults
// =============================================================================

/// How often the consumer drains new lines (ms).
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable refresh interval (ms).
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;

/// Maximum user-configurable refresh interval (ms).
pub const MAX_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Default number of lines retained by the consumer view.
pub const DEFAULT_MAX_VIEW_LINES: usize = 100_000;

/// Minimum user-configurable view history.
pub const MIN_MAX_VIEW_LINES: usize = 1_000;

/// Maximum user-configurable view history.
pub const ABSOLUTE_MAX_VIEW_LINES: usize = 10_000_000;

/// Maximum regex pattern length accepted by the display filter.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a tailed line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable consulted by the CLI for an SSH password.
pub const SSH_PASSWORD_ENV: &str = "LOGTAILER_SSH_PASSWORD";

/// Timestamp format used in status strings.
pub const STATUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
