// LogTailer - core/scheme.rs
//
// Severity scheme definition, validation, and the embedded built-in schemes.
// Core layer: accepts strings and TOML values, never touches the filesystem.
//
// Two definition forms are accepted:
//   - compact:  "start,end,TAG,Name,Colour,TAG,Name,Colour,..."
//   - TOML:     [[scheme]] tables with `window = [start, end]` and `levels`
// Levels are ranked in the order they are written, starting at 0.

use crate::core::model::{DetectionWindow, SeverityLevel, SeverityScheme};
use crate::util::constants;
use crate::util::error::SchemeError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// A TOML document holding one or more `[[scheme]]` tables.
#[derive(Debug, Default, Deserialize)]
pub struct SchemeFile {
    #[serde(default)]
    pub scheme: Vec<SchemeDefinition>,
}

/// Raw scheme definition as written in TOML.
///
/// Either `definition` (compact form) or `window` + `levels` must be given.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemeDefinition {
    pub name: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub window: Option<[usize; 2]>,
    #[serde(default)]
    pub levels: Vec<LevelDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelDefinition {
    pub tag: String,
    pub name: String,
    #[serde(default = "default_colour")]
    pub colour: String,
}

fn default_colour() -> String {
    "Black".to_string()
}

// =============================================================================
// Building and validation
// =============================================================================

/// Build a scheme from `(tag, display name, colour)` triples.
///
/// Tags are lowercased; ranks follow triple order starting at 0.
pub fn build_scheme(
    name: &str,
    start: usize,
    end: usize,
    triples: &[(&str, &str, &str)],
) -> Result<SeverityScheme, SchemeError> {
    let levels = triples
        .iter()
        .enumerate()
        .map(|(rank, (tag, display_name, colour))| {
            Arc::new(SeverityLevel {
                tag: tag.trim().to_lowercase(),
                display_name: display_name.trim().to_string(),
                rank,
                colour_hint: colour.trim().to_string(),
            })
        })
        .collect();

    let scheme = SeverityScheme {
        name: name.to_string(),
        window: DetectionWindow::new(start, end),
        levels,
    };
    validate_scheme(&scheme)?;
    Ok(scheme)
}

/// Check the invariants classification relies on: a named scheme, an
/// ordered window within bounds, one to `MAX_SCHEME_LEVELS` levels ranked
/// 0, 1, 2... in order, and non-empty lowercase tags.
pub fn validate_scheme(scheme: &SeverityScheme) -> Result<(), SchemeError> {
    let name = scheme.name.as_str();
    if name.trim().is_empty() {
        return Err(SchemeError::InvalidDefinition {
            name: "(empty)".to_string(),
            reason: "scheme name is empty".to_string(),
        });
    }
    let DetectionWindow { start, end } = scheme.window;
    if start > end || end > constants::MAX_DETECTION_WINDOW_END {
        return Err(SchemeError::InvalidWindow {
            name: name.to_string(),
            start,
            end,
        });
    }
    if scheme.levels.is_empty() {
        return Err(SchemeError::NoLevels {
            name: name.to_string(),
        });
    }
    if scheme.levels.len() > constants::MAX_SCHEME_LEVELS {
        return Err(SchemeError::TooManyLevels {
            name: name.to_string(),
            count: scheme.levels.len(),
            max: constants::MAX_SCHEME_LEVELS,
        });
    }

    let invalid = |reason: String| SchemeError::InvalidDefinition {
        name: name.to_string(),
        reason,
    };
    for (position, level) in scheme.levels.iter().enumerate() {
        if level.rank != position {
            return Err(invalid(format!(
                "level '{}' has rank {} at position {position}",
                level.display_name, level.rank
            )));
        }
        if level.tag.is_empty() {
            return Err(invalid(format!("level {position} has an empty tag")));
        }
        if level.tag != level.tag.to_lowercase() {
            return Err(invalid(format!("tag '{}' is not lowercase", level.tag)));
        }
    }
    Ok(())
}

/// Parse the compact comma-separated form: `start,end` followed by one or more
/// `tag,name,colour` triples.
pub fn parse_compact(name: &str, csv: &str) -> Result<SeverityScheme, SchemeError> {
    let parts: Vec<&str> = csv.split(',').map(str::trim).collect();
    let invalid = |reason: String| SchemeError::InvalidDefinition {
        name: name.to_string(),
        reason,
    };

    if parts.len() < 5 {
        return Err(invalid(format!(
            "expected start,end and at least one tag,name,colour triple; got {} fields",
            parts.len()
        )));
    }
    if (parts.len() - 2) % 3 != 0 {
        return Err(invalid(format!(
            "{} fields after the window do not form complete tag,name,colour triples",
            parts.len() - 2
        )));
    }

    let start = parse_offset(parts[0]).map_err(|r| invalid(format!("window start: {r}")))?;
    let end = parse_offset(parts[1]).map_err(|r| invalid(format!("window end: {r}")))?;

    let triples: Vec<(&str, &str, &str)> = parts[2..]
        .chunks_exact(3)
        .map(|c| (c[0], c[1], c[2]))
        .collect();

    build_scheme(name, start, end, &triples)
}

fn parse_offset(field: &str) -> Result<usize, String> {
    field
        .parse::<usize>()
        .map_err(|e| format!("'{field}' is not a character offset ({e})"))
}

/// Validate a TOML `SchemeDefinition` and compile it into a runtime scheme.
pub fn compile_definition(def: &SchemeDefinition) -> Result<SeverityScheme, SchemeError> {
    match (&def.definition, def.window) {
        (Some(csv), None) if def.levels.is_empty() => parse_compact(&def.name, csv),
        (None, Some([start, end])) => {
            let triples: Vec<(&str, &str, &str)> = def
                .levels
                .iter()
                .map(|l| (l.tag.as_str(), l.name.as_str(), l.colour.as_str()))
                .collect();
            build_scheme(&def.name, start, end, &triples)
        }
        _ => Err(SchemeError::InvalidDefinition {
            name: def.name.clone(),
            reason: "give either `definition` or `window` with `levels`, not both".to_string(),
        }),
    }
}

/// Parse a TOML document of `[[scheme]]` tables.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_scheme_toml(toml_content: &str, source_path: &Path) -> Result<SchemeFile, SchemeError> {
    toml::from_str(toml_content).map_err(|e| SchemeError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Compile every definition, rejecting duplicate names within the batch.
///
/// Invalid definitions are returned as errors alongside the valid schemes so
/// one bad entry does not discard the rest.
pub fn compile_all(defs: &[SchemeDefinition]) -> (Vec<SeverityScheme>, Vec<SchemeError>) {
    let mut schemes: Vec<SeverityScheme> = Vec::new();
    let mut errors = Vec::new();

    for def in defs {
        if schemes.iter().any(|s| s.name == def.name) {
            errors.push(SchemeError::DuplicateName {
                name: def.name.clone(),
            });
            continue;
        }
        match compile_definition(def) {
            Ok(s) => schemes.push(s),
            Err(e) => errors.push(e),
        }
    }

    (schemes, errors)
}

// =============================================================================
// Built-in schemes (embedded at compile time)
// =============================================================================

/// Embedded TOML content for built-in schemes.
/// Each tuple is (filename, TOML content).
pub fn builtin_scheme_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("log4.toml", include_str!("../../schemes/log4.toml")),
        ("python.toml", include_str!("../../schemes/python.toml")),
        ("generic.toml", include_str!("../../schemes/generic.toml")),
    ]
}

/// Load and validate all built-in schemes, in source order.
///
/// Invalid built-ins are logged and skipped (non-fatal).
pub fn load_builtin_schemes() -> Vec<SeverityScheme> {
    let mut schemes = Vec::new();

    for (filename, content) in builtin_scheme_sources() {
        let path = PathBuf::from(format!("<builtin>/{filename}"));
        let file = match parse_scheme_toml(content, &path) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(file = filename, error = %e, "Failed to parse built-in scheme");
                continue;
            }
        };
        let (compiled, errors) = compile_all(&file.scheme);
        for e in errors {
            tracing::error!(file = filename, error = %e, "Invalid built-in scheme");
        }
        for scheme in compiled {
            tracing::debug!(scheme = %scheme.name, "Loaded built-in scheme");
            schemes.push(scheme);
        }
    }

    schemes
}

// =============================================================================
// Tests
// =============================================================================
