// LogTailer - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Recoverable tail conditions never reach these types: they are reported as
// status lines in the sink. Only configuration mistakes and faults that end a
// source are represented here.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogTailer operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTailerError {
    /// Severity scheme definition or registration failed.
    Scheme(SchemeError),

    /// A tail source failed fatally.
    Tail(TailError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// Display filter construction failed.
    Filter(FilterError),
}

impl fmt::Display for LogTailerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheme(e) => write!(f, "Scheme error: {e}"),
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Filter(e) => write!(f, "Filter error: {e}"),
        }
    }
}

impl std::error::Error for LogTailerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scheme(e) => Some(e),
            Self::Tail(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Filter(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheme errors
// ---------------------------------------------------------------------------

/// Errors related to severity scheme definitions.
#[derive(Debug)]
pub enum SchemeError {
    /// A compact `start,end,tag,name,colour,...` definition is malformed.
    InvalidDefinition { name: String, reason: String },

    /// Detection window bounds are inverted or out of range.
    InvalidWindow {
        name: String,
        start: usize,
        end: usize,
    },

    /// A scheme must define at least one level.
    NoLevels { name: String },

    /// A scheme defines more levels than allowed.
    TooManyLevels {
        name: String,
        count: usize,
        max: usize,
    },

    /// Two schemes in the same source share a name.
    DuplicateName { name: String },

    /// The registry already holds the maximum number of schemes.
    RegistryFull { name: String, max: usize },

    /// A scheme TOML document could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for SchemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDefinition { name, reason } => {
                write!(f, "Scheme '{name}': invalid definition: {reason}")
            }
            Self::InvalidWindow { name, start, end } => write!(
                f,
                "Scheme '{name}': detection window [{start}, {end}) is invalid"
            ),
            Self::NoLevels { name } => write!(f, "Scheme '{name}': no levels defined"),
            Self::TooManyLevels { name, count, max } => write!(
                f,
                "Scheme '{name}': {count} levels defined, maximum is {max}"
            ),
            Self::DuplicateName { name } => write!(f, "Duplicate scheme name '{name}'"),
            Self::RegistryFull { name, max } => write!(
                f,
                "Cannot register scheme '{name}': registry already holds {max} schemes"
            ),
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse scheme TOML '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SchemeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SchemeError> for LogTailerError {
    fn from(e: SchemeError) -> Self {
        Self::Scheme(e)
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Faults that terminate a tail source.
#[derive(Debug)]
pub enum TailError {
    /// Neither a password nor a private key was supplied for a remote target.
    NoAuthMethods { host: String },

    /// The TCP connection to the remote host could not be established.
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },

    /// An SSH protocol operation failed.
    Ssh {
        host: String,
        operation: &'static str,
        source: ssh2::Error,
    },

    /// A remote command could not be run to completion.
    Command {
        host: String,
        command: String,
        reason: String,
    },

    /// A worker thread panicked instead of returning.
    WorkerPanicked { worker: &'static str },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthMethods { host } => write!(
                f,
                "No remote access methods defined for '{host}': supply a password or a private key"
            ),
            Self::Connect { host, port, source } => {
                write!(f, "Can't connect to {host}:{port}: {source}")
            }
            Self::Ssh {
                host,
                operation,
                source,
            } => write!(f, "SSH {operation} failed on {host}: {source}"),
            Self::Command {
                host,
                command,
                reason,
            } => write!(f, "Remote command '{command}' failed on {host}: {reason}"),
            Self::WorkerPanicked { worker } => write!(f, "{worker} worker panicked"),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect { source, .. } => Some(source),
            Self::Ssh { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TailError> for LogTailerError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to the display filter.
#[derive(Debug)]
pub enum FilterError {
    /// User-provided regex is invalid.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    /// User-provided regex exceeds the maximum length.
    RegexTooLong { length: usize, max_length: usize },

    /// The minimum level tag is not defined by the current scheme.
    UnknownLevel { tag: String, scheme: String },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegex { pattern, source } => {
                write!(f, "Invalid filter regex '{pattern}': {source}")
            }
            Self::RegexTooLong { length, max_length } => write!(
                f,
                "Filter regex is {length} chars, exceeds maximum of {max_length}"
            ),
            Self::UnknownLevel { tag, scheme } => {
                write!(f, "Level '{tag}' is not defined by scheme '{scheme}'")
            }
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FilterError> for LogTailerError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogTailerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogTailer results.
pub type Result<T> = std::result::Result<T, LogTailerError>;
