//! Selections in document positions.

use std::ops::Range;

use crate::mapping::{Assoc, Mapping, StepMap};
use crate::model::Node;
use crate::transform::textblock_ranges;

/// Where `move_cursor` places the caret.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum CursorTarget {
    Start,
    End,
}

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Cursor at the start of the first textblock.
    pub fn at_start(doc: &Node) -> Self {
        let pos = textblock_ranges(doc).first().map_or(0, |r| r.start);
        Self::collapsed(pos)
    }

    /// Cursor at the end of the last textblock.
    pub fn at_end(doc: &Node) -> Self {
        let pos = textblock_ranges(doc)
            .last()
            .map_or_else(|| doc.content_size(), |r| r.end);
        Self::collapsed(pos)
    }

    pub fn at(doc: &Node, target: CursorTarget) -> Self {
        match target {
            CursorTarget::Start => Self::at_start(doc),
            CursorTarget::End => Self::at_end(doc),
        }
    }

    /// Remap through a transaction's changes.
    pub fn map(&self, mapping: &Mapping) -> Self {
        Self {
            anchor: mapping.map(self.anchor, Assoc::After),
            head: mapping.map(self.head, Assoc::After),
        }
    }

    pub fn map_step(&self, map: &StepMap) -> Self {
        Self {
            anchor: map.map(self.anchor, Assoc::After),
            head: map.map(self.head, Assoc::After),
        }
    }

    /// Snap both ends into the nearest textblock of `doc`.
    pub fn clamp(&self, doc: &Node) -> Self {
        let ranges = textblock_ranges(doc);
        Self {
            anchor: snap(&ranges, self.anchor, doc.content_size()),
            head: snap(&ranges, self.head, doc.content_size()),
        }
    }
}

fn snap(ranges: &[Range<usize>], pos: usize, size: usize) -> usize {
    ranges
        .iter()
        .map(|r| pos.clamp(r.start, r.end))
        .min_by_key(|p| p.abs_diff(pos))
        .unwrap_or(pos.min(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let sel = Selection::new(7, 3);
        assert_eq!(sel.start(), 3);
        assert_eq!(sel.end(), 7);
        assert_eq!(sel.to_range(), 3..7);
        assert!(!sel.is_collapsed());
        assert!(Selection::collapsed(2).is_collapsed());
    }

    #[test]
    fn test_snap_prefers_nearest_range() {
        let ranges = vec![1..4, 6..6];
        assert_eq!(snap(&ranges, 0, 7), 1);
        assert_eq!(snap(&ranges, 5, 7), 4);
        assert_eq!(snap(&ranges, 7, 7), 6);
        assert_eq!(snap(&[], 9, 7), 7);
    }
}
