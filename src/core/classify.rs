// LogTailer - core/classify.rs
//
// Line classifier: assigns a severity level to raw text using a scheme's
// detection window. Pure function; callers decide how results are shared.

use crate::core::model::{ClassifiedLine, SeverityLevel, SeverityScheme};
use std::sync::Arc;

/// Classify `text` under `scheme`.
///
/// Returns `None` for empty input or a scheme with no levels. Lines no longer than the window end are
/// given the lowest level without any lookup. Otherwise the window is
/// lowercased and the scheme's levels are scanned in rank order; the first
/// level whose tag occurs in the window wins.
pub fn classify(text: &str, sequence: u64, scheme: &SeverityScheme) -> Option<ClassifiedLine> {
    if text.is_empty() || scheme.levels.is_empty() {
        return None;
    }
    let level = detect_level(text, scheme);
    Some(ClassifiedLine::new(text.to_string(), sequence, level))
}

/// Level lookup shared by `classify`; always returns a level of `scheme`.
fn detect_level(text: &str, scheme: &SeverityScheme) -> Arc<SeverityLevel> {
    let Some(window) = window_slice(text, scheme.window.start, scheme.window.end) else {
        return Arc::clone(scheme.lowest());
    };
    let window = window.to_lowercase();
    scheme
        .levels
        .iter()
        .find(|level| !level.tag.is_empty() && window.contains(level.tag.as_str()))
        .unwrap_or_else(|| scheme.lowest())
        .clone()
}

/// The `[start, end)` character range of `text`, or `None` when `text` has
/// `end` characters or fewer.
fn window_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    // Byte offset of every char boundary we care about; ASCII is the common case.
    if text.is_ascii() {
        return (text.len() > end).then(|| &text[start..end]);
    }
    let mut bounds = text.char_indices().map(|(i, _)| i);
    let start_byte = bounds.nth(start)?;
    let end_byte = if end > start {
        bounds.nth(end - start - 1)?
    } else {
        start_byte
    };
    // One more char must exist beyond `end` for the line to be longer than it.
    text[end_byte..].chars().next()?;
    Some(&text[start_byte..end_byte])
}
