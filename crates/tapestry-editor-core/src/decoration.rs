//! Position-anchored presentation metadata derived from document state.
//!
//! Decorations are cheap to clone: the payload sits behind an `Arc` so a
//! decoration that survives an edit keeps the very same payload object. The
//! host layer can use `Arc::ptr_eq` on payloads to skip re-rendering.

use std::collections::BTreeMap;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::mapping::{Assoc, Mapping};

/// What a decoration is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecorationKind {
    /// Covers exactly one node, `from` is its start and `to` its end.
    Node,
    /// Covers an inline range.
    Inline,
    /// Zero-width, at `from`.
    Widget,
}

/// Payload of a decoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationSpec {
    pub kind: DecorationKind,
    /// Presentation class (e.g. `placeholder`).
    pub class: SmolStr,
    pub attrs: BTreeMap<SmolStr, SmolStr>,
}

impl DecorationSpec {
    pub fn new(kind: DecorationKind, class: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            class: class.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub spec: Arc<DecorationSpec>,
}

impl Decoration {
    pub fn node(from: usize, to: usize, spec: DecorationSpec) -> Self {
        Self {
            from,
            to,
            spec: Arc::new(DecorationSpec {
                kind: DecorationKind::Node,
                ..spec
            }),
        }
    }

    pub fn inline(from: usize, to: usize, spec: DecorationSpec) -> Self {
        Self {
            from,
            to,
            spec: Arc::new(DecorationSpec {
                kind: DecorationKind::Inline,
                ..spec
            }),
        }
    }

    pub fn widget(pos: usize, spec: DecorationSpec) -> Self {
        Self {
            from: pos,
            to: pos,
            spec: Arc::new(DecorationSpec {
                kind: DecorationKind::Widget,
                ..spec
            }),
        }
    }

    pub fn kind(&self) -> DecorationKind {
        self.spec.kind
    }

    /// Same range and an equal payload.
    pub fn equivalent(&self, other: &Decoration) -> bool {
        self.from == other.from && self.to == other.to && self.spec == other.spec
    }

    fn map(&self, mapping: &Mapping) -> Option<Decoration> {
        match self.kind() {
            DecorationKind::Widget => {
                let mapped = mapping.map_result(self.from, Assoc::After);
                (!mapped.deleted).then(|| Decoration {
                    from: mapped.pos,
                    to: mapped.pos,
                    spec: self.spec.clone(),
                })
            }
            kind => {
                let from = mapping.map_result(self.from, Assoc::After);
                let to = mapping.map_result(self.to, Assoc::Before);
                if from.pos >= to.pos || (kind == DecorationKind::Node && (from.deleted || to.deleted)) {
                    return None;
                }
                Some(Decoration {
                    from: from.pos,
                    to: to.pos,
                    spec: self.spec.clone(),
                })
            }
        }
    }
}

/// Decorations sorted by range.
#[derive(Debug, Clone, Default)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

/// What changed between two decoration sets.
#[derive(Debug, Clone, Default)]
pub struct DecorationDiff {
    pub added: Vec<Decoration>,
    pub removed: Vec<Decoration>,
    pub kept: usize,
}

impl DecorationDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(mut decorations: Vec<Decoration>) -> Self {
        decorations.sort_by_key(|d| (d.from, d.to, d.kind()));
        Self { decorations }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    /// Decorations overlapping `from..to` (widgets at the edges included).
    pub fn find(&self, from: usize, to: usize) -> impl Iterator<Item = &Decoration> {
        self.decorations
            .iter()
            .filter(move |d| d.from <= to && d.to >= from)
    }

    /// Remap through a transaction, dropping decorations whose anchor was
    /// deleted or collapsed.
    pub fn map(&self, mapping: &Mapping) -> DecorationSet {
        if mapping.is_empty() {
            return self.clone();
        }
        DecorationSet::new(self.decorations.iter().filter_map(|d| d.map(mapping)).collect())
    }

    /// Move to `desired`, reusing every decoration of `self` that has an
    /// equivalent in `desired`.
    ///
    /// `self` should already be remapped to the new document.
    pub fn reconcile(&self, desired: Vec<Decoration>) -> (DecorationSet, DecorationDiff) {
        let mut used = vec![false; self.decorations.len()];
        let mut next = Vec::with_capacity(desired.len());
        let mut diff = DecorationDiff::default();

        for wanted in desired {
            let existing = self
                .decorations
                .iter()
                .enumerate()
                .find(|(i, old)| !used[*i] && old.equivalent(&wanted));
            match existing {
                Some((i, old)) => {
                    used[i] = true;
                    next.push(old.clone());
                    diff.kept += 1;
                }
                None => {
                    diff.added.push(wanted.clone());
                    next.push(wanted);
                }
            }
        }
        diff.removed = self
            .decorations
            .iter()
            .zip(used)
            .filter(|(_, used)| !used)
            .map(|(d, _)| d.clone())
            .collect();

        (DecorationSet::new(next), diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::StepMap;

    fn placeholder() -> DecorationSpec {
        DecorationSpec::new(DecorationKind::Node, "placeholder").attr("text", "Write…")
    }

    fn mapping(map: StepMap) -> Mapping {
        let mut mapping = Mapping::new();
        mapping.push(map);
        mapping
    }

    #[test]
    fn test_map_shifts_after_insert() {
        let set = DecorationSet::new(vec![Decoration::node(4, 6, placeholder())]);
        let mapped = set.map(&mapping(StepMap::new(vec![(1, 0, 1)])));
        let deco = mapped.iter().next().unwrap();
        assert_eq!((deco.from, deco.to), (5, 7));
        assert!(Arc::ptr_eq(&deco.spec, &set.iter().next().unwrap().spec));
    }

    #[test]
    fn test_map_drops_deleted_node() {
        let set = DecorationSet::new(vec![Decoration::node(4, 6, placeholder())]);
        let mapped = set.map(&mapping(StepMap::replace_all(6, 2)));
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_reconcile_keeps_equivalent() {
        let old = DecorationSet::new(vec![
            Decoration::node(0, 2, placeholder()),
            Decoration::node(4, 6, placeholder()),
        ]);
        let desired = vec![
            Decoration::node(4, 6, placeholder()),
            Decoration::widget(8, DecorationSpec::new(DecorationKind::Widget, "caret")),
        ];
        let (next, diff) = old.reconcile(desired);
        assert_eq!(next.len(), 2);
        assert_eq!(diff.kept, 1);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].from, 0);
        let kept = next.iter().next().unwrap();
        let original = old.iter().nth(1).unwrap();
        assert!(Arc::ptr_eq(&kept.spec, &original.spec));
    }
}
