// LogTailer - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::filter::DisplayFilter;
use crate::core::model::SeverityScheme;
use crate::core::scheme::{self, SchemeDefinition};
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogTailer configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtailer/ or %APPDATA%\LogTailer\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        match ProjectDirs::from("", "", constants::APP_ID) {
            Some(proj_dirs) => {
                let config_dir = proj_dirs.config_dir().to_path_buf();
                tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
                Self { config_dir }
            }
            None => {
                tracing::warn!("Could not determine platform directories, using current directory");
                Self {
                    config_dir: PathBuf::from("."),
                }
            }
        }
    }

    /// Full path of the default `config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so a newer config file still loads in an older
/// binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub logging: LoggingSection,
    pub remote: RemoteSection,
    pub display: DisplaySection,
    /// `[[scheme]]` tables, registered after the built-ins.
    pub scheme: Vec<SchemeDefinition>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// `[remote]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub port: Option<i64>,
    /// Size-report command; must contain the FILE placeholder.
    pub size_command: Option<String>,
    /// Follow command; must contain the FILE placeholder.
    pub tail_command: Option<String>,
}

/// `[display]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub scheme: Option<String>,
    pub min_level: Option<String>,
    pub filter: Option<String>,
    pub refresh_interval_ms: Option<u64>,
    pub max_lines: Option<usize>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Logging --
    pub log_level: Option<String>,
    pub log_file: Option<String>,

    // -- Remote --
    pub ssh_port: u16,
    pub size_command: String,
    pub tail_command: String,

    // -- Display --
    /// Scheme made current at start-up. None = first registered.
    pub scheme: Option<String>,
    pub min_level: Option<String>,
    pub filter: Option<String>,
    pub refresh_interval_ms: u64,
    pub max_lines: usize,

    /// User schemes that compiled successfully.
    pub schemes: Vec<SeverityScheme>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            log_file: None,
            ssh_port: constants::DEFAULT_SSH_PORT,
            size_command: constants::DEFAULT_SIZE_COMMAND.to_string(),
            tail_command: constants::DEFAULT_TAIL_COMMAND.to_string(),
            scheme: None,
            min_level: None,
            filter: None,
            refresh_interval_ms: constants::DEFAULT_REFRESH_INTERVAL_MS,
            max_lines: constants::DEFAULT_MAX_VIEW_LINES,
            schemes: Vec::new(),
        }
    }
}

/// Warning text for a rejected value.
fn out_of_range(field: &str, value: impl ToString, expected: String, default: impl std::fmt::Display) -> String {
    let err = ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    };
    format!("{err}. Using default ({default}).")
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). An unreadable
/// or unparseable file yields defaults with one warning.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigError::Io {
                path: config_path.to_path_buf(),
                source: e,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            let err = ConfigError::TomlParse {
                path: config_path.to_path_buf(),
                source: e,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let config = validate(raw, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    (config, warnings)
}

/// Validate each field against named constants, accumulating all problems.
fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(file) = raw.logging.file.filter(|f| !f.is_empty()) {
        config.log_file = Some(file);
    }

    // -- Remote: port --
    if let Some(port) = raw.remote.port {
        match u16::try_from(port) {
            Ok(p) if p > 0 => config.ssh_port = p,
            _ => warnings.push(out_of_range(
                "remote.port",
                port,
                "1-65535".to_string(),
                constants::DEFAULT_SSH_PORT,
            )),
        }
    }

    // -- Remote: command templates --
    for (field, value, slot) in [
        ("remote.size_command", raw.remote.size_command, &mut config.size_command),
        ("remote.tail_command", raw.remote.tail_command, &mut config.tail_command),
    ] {
        let Some(template) = value else { continue };
        if template.contains(constants::FILE_PLACEHOLDER) {
            *slot = template;
        } else {
            warnings.push(format!(
                "[remote] {} = \"{template}\" has no {} placeholder. Using default (\"{slot}\").",
                field.trim_start_matches("remote."),
                constants::FILE_PLACEHOLDER,
            ));
        }
    }

    // -- Display: scheme, min_level --
    config.scheme = raw.display.scheme.filter(|s| !s.is_empty());
    config.min_level = raw.display.min_level.filter(|s| !s.is_empty());

    // -- Display: filter --
    if let Some(pattern) = raw.display.filter.filter(|p| !p.is_empty()) {
        match DisplayFilter::default().set_regex(&pattern) {
            Ok(()) => config.filter = Some(pattern),
            Err(e) => warnings.push(format!("[display] filter: {e}. No filter applied.")),
        }
    }

    // -- Display: refresh_interval_ms --
    if let Some(ms) = raw.display.refresh_interval_ms {
        if (constants::MIN_REFRESH_INTERVAL_MS..=constants::MAX_REFRESH_INTERVAL_MS).contains(&ms) {
            config.refresh_interval_ms = ms;
        } else {
            warnings.push(out_of_range(
                "display.refresh_interval_ms",
                ms,
                format!(
                    "{}-{}",
                    constants::MIN_REFRESH_INTERVAL_MS,
                    constants::MAX_REFRESH_INTERVAL_MS
                ),
                constants::DEFAULT_REFRESH_INTERVAL_MS,
            ));
        }
    }

    // -- Display: max_lines --
    if let Some(lines) = raw.display.max_lines {
        if (constants::MIN_MAX_VIEW_LINES..=constants::ABSOLUTE_MAX_VIEW_LINES).contains(&lines) {
            config.max_lines = lines;
        } else {
            warnings.push(out_of_range(
                "display.max_lines",
                lines,
                format!(
                    "{}-{}",
                    constants::MIN_MAX_VIEW_LINES,
                    constants::ABSOLUTE_MAX_VIEW_LINES
                ),
                constants::DEFAULT_MAX_VIEW_LINES,
            ));
        }
    }

    // -- Schemes --
    let (schemes, errors) = scheme::compile_all(&raw.scheme);
    warnings.extend(errors.into_iter().map(|e| format!("[[scheme]] skipped: {e}")));
    config.schemes = schemes;

    config
}
