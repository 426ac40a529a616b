//! Position remapping across document changes.
//!
//! Every edit records a [`StepMap`]: the ranges it replaced, in the
//! coordinates of the document before the edit. A [`Mapping`] chains the step
//! maps of one transaction so positions (selections, decorations) computed
//! against the old document can be carried over to the new one.
//!
//! ```
//! use tapestry_editor_core::mapping::{Assoc, StepMap};
//!
//! // two characters inserted at position 4
//! let map = StepMap::new(vec![(4, 0, 2)]);
//! assert_eq!(map.map(4, Assoc::Before), 4);
//! assert_eq!(map.map(4, Assoc::After), 6);
//! assert_eq!(map.map(5, Assoc::Before), 7);
//! ```

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Assoc {
    Before,
    #[default]
    After,
}

/// Result of mapping a single position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The content around the position was replaced.
    pub deleted: bool,
}

/// Replaced ranges of one edit as `(start, old_size, new_size)` triples,
/// sorted by `start` and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
}

impl StepMap {
    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        Self { ranges }
    }

    /// The map of an edit that replaced the whole document content.
    pub fn replace_all(old_size: usize, new_size: usize) -> Self {
        Self::new(vec![(0, old_size, new_size)])
    }

    pub fn ranges(&self) -> &[(usize, usize, usize)] {
        &self.ranges
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for &(start, old_size, new_size) in &self.ranges {
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    Assoc::Before
                } else if pos == end {
                    Assoc::After
                } else {
                    assoc
                };
                let base = shift(start, diff);
                let mapped = match side {
                    Assoc::Before => base,
                    Assoc::After => base + new_size,
                };
                let boundary = match assoc {
                    Assoc::Before => start,
                    Assoc::After => end,
                };
                return MapResult {
                    pos: mapped,
                    deleted: pos != boundary,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: shift(pos, diff),
            deleted: false,
        }
    }
}

fn shift(pos: usize, diff: isize) -> usize {
    pos.saturating_add_signed(diff)
}

/// The step maps of a transaction, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    /// Map through every step. `deleted` is set if any step deleted it.
    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        self.maps.iter().fold(
            MapResult {
                pos,
                deleted: false,
            },
            |acc, map| {
                let next = map.map_result(acc.pos, assoc);
                MapResult {
                    pos: next.pos,
                    deleted: acc.deleted || next.deleted,
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion() {
        let map = StepMap::new(vec![(4, 0, 2)]);
        assert_eq!(map.map(0, Assoc::Before), 0);
        assert_eq!(map.map(4, Assoc::Before), 4);
        assert_eq!(map.map(4, Assoc::After), 6);
        assert_eq!(map.map(5, Assoc::Before), 7);
        assert!(!map.map_result(4, Assoc::After).deleted);
    }

    #[test]
    fn test_deletion() {
        let map = StepMap::new(vec![(2, 3, 0)]);
        assert_eq!(map.map(1, Assoc::After), 1);
        let inside = map.map_result(3, Assoc::After);
        assert_eq!(inside, MapResult { pos: 2, deleted: true });
        assert_eq!(map.map(5, Assoc::After), 2);
        assert!(!map.map_result(5, Assoc::After).deleted);
        assert_eq!(map.map(8, Assoc::After), 5);
    }

    #[test]
    fn test_replace_all_deletes_interior() {
        let map = StepMap::replace_all(10, 4);
        assert!(map.map_result(5, Assoc::After).deleted);
        assert_eq!(map.map(10, Assoc::After), 4);
        assert_eq!(map.map(0, Assoc::Before), 0);
    }

    #[test]
    fn test_mapping_chains_steps() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::new(vec![(1, 0, 1)]));
        mapping.push(StepMap::new(vec![(1, 0, 1)]));
        assert_eq!(mapping.map(5, Assoc::After), 7);
        assert_eq!(mapping.map(0, Assoc::After), 0);
    }
}
