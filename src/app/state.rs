// LogTailer - app/state.rs
//
// Consumer view state: the lines accumulated from successive drains, the
// display filter and the last status. Owned by whatever renders the tail.

use crate::app::sink::{Drained, TailStatus};
use crate::core::filter::{self, DisplayFilter};
use crate::core::model::ClassifiedLine;
use crate::util::constants;

#[derive(Debug)]
pub struct ViewState {
    /// Every retained line of the current generation, oldest first.
    pub lines: Vec<ClassifiedLine>,

    /// Indices into `lines` of the lines passing `filter`.
    pub filtered_indices: Vec<usize>,

    pub filter: DisplayFilter,

    /// Oldest lines are dropped beyond this many.
    pub max_lines: usize,

    /// Status as of the last `set_status` call.
    pub status: TailStatus,

    /// Number of restarts observed since creation.
    pub restarts: u64,
}

impl ViewState {
    pub fn new(filter: DisplayFilter, max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            filtered_indices: Vec::new(),
            filter,
            max_lines: max_lines.max(1),
            status: TailStatus::default(),
            restarts: 0,
        }
    }

    /// Fold one drain into the view.
    ///
    /// A restart discards everything held so far. Returns the lines from this
    /// drain that pass the filter, in order.
    pub fn apply(&mut self, drained: Drained) -> Vec<&ClassifiedLine> {
        if drained.restarted {
            self.restarts += 1;
            self.lines.clear();
            self.filtered_indices.clear();
        }

        let first_new = self.lines.len();
        self.lines.extend(drained.lines);

        let overflow = self.lines.len().saturating_sub(self.max_lines);
        if overflow > 0 {
            self.lines.drain(..overflow);
            self.apply_filter();
        } else {
            let filter = &self.filter;
            self.filtered_indices.extend(
                (first_new..self.lines.len()).filter(|&i| filter.matches(&self.lines[i])),
            );
        }

        let first_new = first_new.saturating_sub(overflow);
        let visible_from = self.filtered_indices.partition_point(|&i| i < first_new);
        self.filtered_indices[visible_from..]
            .iter()
            .map(|&i| &self.lines[i])
            .collect()
    }

    /// Recompute `filtered_indices` after a filter change.
    pub fn apply_filter(&mut self) {
        self.filtered_indices = filter::apply_filter(&self.lines, &self.filter);
    }

    pub fn set_status(&mut self, status: TailStatus) {
        self.status = status;
    }

    /// Lines currently passing the filter.
    pub fn visible(&self) -> impl Iterator<Item = &ClassifiedLine> {
        self.filtered_indices.iter().map(|&i| &self.lines[i])
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.filtered_indices.clear();
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DisplayFilter::default(), constants::DEFAULT_MAX_VIEW_LINES)
    }
}
