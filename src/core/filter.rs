// LogTailer - core/filter.rs
//
// Display filter applied by consumers to classified lines.
// Both conditions are AND-combined. Status lines always pass so errors and
// lifecycle notices stay visible whatever the filter.
// Core layer: pure logic, no I/O.

use crate::core::model::{ClassifiedLine, SeverityScheme};
use crate::util::constants;
use crate::util::error::FilterError;
use regex::Regex;

/// Consumer-side filter state.
#[derive(Debug, Clone, Default)]
pub struct DisplayFilter {
    /// Lines ranked below this are hidden. 0 shows everything.
    pub min_rank: usize,

    /// Compiled regex search. None = no regex filter.
    pub regex: Option<Regex>,
}

impl DisplayFilter {
    /// Returns true if no filters are active.
    pub fn is_empty(&self) -> bool {
        self.min_rank == 0 && self.regex.is_none()
    }

    /// Set the regex pattern, compiling it. An empty pattern clears the filter.
    pub fn set_regex(&mut self, pattern: &str) -> Result<(), FilterError> {
        if pattern.is_empty() {
            self.regex = None;
            return Ok(());
        }
        if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
            return Err(FilterError::RegexTooLong {
                length: pattern.len(),
                max_length: constants::MAX_REGEX_PATTERN_LENGTH,
            });
        }
        let regex = Regex::new(pattern).map_err(|e| FilterError::InvalidRegex {
            pattern: pattern.to_string(),
            source: e,
        })?;
        self.regex = Some(regex);
        Ok(())
    }

    /// Set the minimum level by tag or display name under `scheme`.
    pub fn set_min_level(&mut self, tag: &str, scheme: &SeverityScheme) -> Result<(), FilterError> {
        let level = scheme
            .level_by_tag(tag)
            .ok_or_else(|| FilterError::UnknownLevel {
                tag: tag.to_string(),
                scheme: scheme.name.clone(),
            })?;
        self.min_rank = level.rank;
        Ok(())
    }

    /// Check if a single line passes all active filters.
    pub fn matches(&self, line: &ClassifiedLine) -> bool {
        if line.is_status() {
            return true;
        }
        if line.level().rank < self.min_rank {
            return false;
        }
        if let Some(ref regex) = self.regex {
            if !regex.is_match(line.text()) {
                return false;
            }
        }
        true
    }
}

/// Apply the filter to a slice of lines, returning indices of matching lines.
pub fn apply_filter(lines: &[ClassifiedLine], filter: &DisplayFilter) -> Vec<usize> {
    if filter.is_empty() {
        return (0..lines.len()).collect();
    }
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| filter.matches(line))
        .map(|(idx, _)| idx)
        .collect()
}
