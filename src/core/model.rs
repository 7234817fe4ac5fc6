// LogTailer - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers.

use std::fmt;
use std::sync::Arc;

// =============================================================================
// Severity level and scheme
// =============================================================================

/// One severity level within a scheme.
///
/// `rank` is the level's position in its scheme (0 = lowest). The `tag` is the
/// lowercase text searched for inside a line's detection window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityLevel {
    pub tag: String,
    pub display_name: String,
    pub rank: usize,
    pub colour_hint: String,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Half-open `[start, end)` range of character offsets in which a line's
/// severity text is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionWindow {
    pub start: usize,
    pub end: usize,
}

impl DetectionWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A named classification scheme.
///
/// Schemes are immutable once built; the registry shares them as
/// `Arc<SeverityScheme>` and replaces the current one by swapping the pointer.
/// Construction goes through `core::scheme`, which guarantees at least one
/// level and ranks that match list positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityScheme {
    pub name: String,
    pub window: DetectionWindow,
    /// Levels ranked ascending; `levels[i].rank == i`.
    pub levels: Vec<Arc<SeverityLevel>>,
}

impl SeverityScheme {
    /// Single-level scheme used when no other scheme is available.
    pub fn plain() -> Self {
        Self {
            name: "Plain".to_string(),
            window: DetectionWindow::new(0, 0),
            levels: vec![Arc::new(SeverityLevel {
                tag: "plain".to_string(),
                display_name: "Plain".to_string(),
                rank: 0,
                colour_hint: "Black".to_string(),
            })],
        }
    }

    /// The rank-0 level, used whenever no tag matches.
    ///
    /// Panics on a scheme with no levels; `validate_scheme` rejects those.
    pub fn lowest(&self) -> &Arc<SeverityLevel> {
        &self.levels[0]
    }

    /// Find a level by its tag (case-insensitive) or display name.
    pub fn level_by_tag(&self, tag: &str) -> Option<&Arc<SeverityLevel>> {
        let wanted = tag.to_lowercase();
        self.levels
            .iter()
            .find(|l| l.tag == wanted || l.display_name.eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for SeverityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// Classified line
// =============================================================================

/// A single line produced by a tail source.
///
/// Data lines carry a sequence number that starts at 1 for each generation.
/// Status lines (errors, lifecycle notices) use sequence number 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    text: String,
    sequence: u64,
    level: Arc<SeverityLevel>,
}

impl ClassifiedLine {
    pub(crate) fn new(text: String, sequence: u64, level: Arc<SeverityLevel>) -> Self {
        Self {
            text,
            sequence,
            level,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn level(&self) -> &SeverityLevel {
        &self.level
    }

    /// True for synthetic status/error lines.
    pub fn is_status(&self) -> bool {
        self.sequence == 0
    }
}

// =============================================================================
// Tail state
// =============================================================================

/// Lifecycle state of a tail source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TailState {
    #[default]
    Opening,
    CatchingUp,
    Waiting,
    Restarted,
    Error(String),
    Stopped,
}

impl TailState {
    /// Short label for compact display.
    pub fn label(&self) -> &'static str {
        match self {
            TailState::Opening => "opening",
            TailState::CatchingUp => "reading",
            TailState::Waiting => "waiting",
            TailState::Restarted => "restarted",
            TailState::Error(_) => "error",
            TailState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailState::Error(msg) => write!(f, "error: {msg}"),
            other => f.write_str(other.label()),
        }
    }
}
