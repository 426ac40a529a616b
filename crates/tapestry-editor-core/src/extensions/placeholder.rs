//! Placeholder decorations on empty textblocks.
//!
//! A block is vacant when it is an empty textblock, or a container whose
//! only child is vacant. Nested vacant blocks compete for one placeholder:
//! the innermost wins and its ancestors get none.
//!
//! The plugin state is a reducer over `(transaction, previous state)`: the
//! previous decorations are remapped through the transaction, then
//! reconciled against the decorations the new document calls for. Typing
//! elsewhere in the document leaves an untouched placeholder's payload
//! `Arc` intact.

use std::collections::BTreeSet;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::decoration::{Decoration, DecorationDiff, DecorationKind, DecorationSet, DecorationSpec};
use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::model::Node;
use crate::plugin::{Priority, StatePlugin};
use crate::state::DocState;
use crate::transaction::Transaction;

pub const PLACEHOLDER_CLASS: &str = "placeholder";

/// Registers a [`PlaceholderPlugin`].
#[derive(Debug, Clone)]
pub struct Placeholder {
    text: SmolStr,
    only_at_cursor: bool,
}

impl Placeholder {
    pub fn new(text: impl Into<SmolStr>) -> Self {
        Self {
            text: text.into(),
            only_at_cursor: false,
        }
    }

    /// Decorate only the empty textblock holding the cursor.
    pub fn only_at_cursor(mut self) -> Self {
        self.only_at_cursor = true;
        self
    }
}

impl Extension for Placeholder {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        let plugin = PlaceholderPlugin {
            text: self.text.clone(),
            only_at_cursor: self.only_at_cursor,
        };
        b.plugin(Priority::Low, move |_| Arc::new(plugin.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PlaceholderPlugin {
    text: SmolStr,
    only_at_cursor: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlaceholderState {
    pub decorations: DecorationSet,
    /// What the last transaction changed.
    pub last_diff: DecorationDiff,
}

impl PlaceholderPlugin {
    pub const KEY: &'static str = "placeholder";

    pub fn new(text: impl Into<SmolStr>, only_at_cursor: bool) -> Self {
        Self {
            text: text.into(),
            only_at_cursor,
        }
    }

    fn desired(&self, state: &DocState) -> Vec<Decoration> {
        let mut out = Vec::new();
        let mut anchors = BTreeSet::new();
        self.collect(&state.doc, 0, state.selection.head, &mut anchors, &mut out);
        out
    }

    /// Decorate the children of `parent`, whose content starts at `start`.
    /// Returns whether anything inside `parent` was decorated.
    fn collect(
        &self,
        parent: &Node,
        start: usize,
        head: usize,
        anchors: &mut BTreeSet<(usize, DecorationKind)>,
        out: &mut Vec<Decoration>,
    ) -> bool {
        let mut produced = false;
        let mut pos = start;
        for child in parent.children() {
            let end = pos + child.node_size();
            let inner = self.collect(child, pos + 1, head, anchors, out);
            if !inner && self.wants(child, pos, end, head) && anchors.insert((pos, DecorationKind::Node)) {
                let spec = DecorationSpec::new(DecorationKind::Node, PLACEHOLDER_CLASS)
                    .attr("text", self.text.clone());
                out.push(Decoration::node(pos, end, spec));
                produced = true;
            }
            produced |= inner;
            pos = end;
        }
        produced
    }

    fn wants(&self, node: &Node, from: usize, to: usize, head: usize) -> bool {
        is_vacant(node) && (!self.only_at_cursor || (from < head && head < to))
    }
}

fn is_vacant(node: &Node) -> bool {
    if node.is_textblock() {
        return node.content_size() == 0;
    }
    !node.is_leaf() && node.child_count() == 1 && node.first_child().is_some_and(is_vacant)
}

impl StatePlugin for PlaceholderPlugin {
    type State = PlaceholderState;

    fn key(&self) -> &str {
        Self::KEY
    }

    fn init(&self, state: &DocState) -> PlaceholderState {
        PlaceholderState {
            decorations: DecorationSet::new(self.desired(state)),
            last_diff: DecorationDiff::default(),
        }
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &PlaceholderState,
        old: &DocState,
        new: &DocState,
    ) -> PlaceholderState {
        let cursor_moved = self.only_at_cursor && old.selection != new.selection;
        if !tr.doc_changed() && !cursor_moved {
            return PlaceholderState {
                decorations: prev.decorations.clone(),
                last_diff: DecorationDiff::default(),
            };
        }

        let (decorations, last_diff) = prev.decorations.map(tr.mapping()).reconcile(self.desired(new));
        tracing::trace!(
            target: "tapestry::placeholder",
            added = last_diff.added.len(),
            removed = last_diff.removed.len(),
            kept = last_diff.kept,
            "placeholders reconciled"
        );
        PlaceholderState {
            decorations,
            last_diff,
        }
    }

    fn decorations<'a>(&self, state: &'a PlaceholderState) -> Option<&'a DecorationSet> {
        Some(&state.decorations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{Blockquote, Document};
    use crate::registry::{ComposeOptions, Composition, compose};
    use crate::schema::Attrs;
    use crate::selection::Selection;
    use crate::state::EditorState;

    fn composition(placeholder: Placeholder) -> Composition {
        let extensions: Vec<Arc<dyn Extension>> =
            vec![Arc::new(Document), Arc::new(Blockquote), Arc::new(placeholder)];
        compose(&extensions, &[], ComposeOptions::default()).unwrap()
    }

    fn paragraph(c: &Composition, text: &str) -> Node {
        let content = if text.is_empty() {
            vec![]
        } else {
            vec![c.schema.text(text, vec![]).unwrap()]
        };
        c.schema.node("paragraph", &Attrs::new(), content, vec![]).unwrap()
    }

    fn state(c: &Composition, paragraphs: &[&str]) -> EditorState {
        let children = paragraphs.iter().map(|p| paragraph(c, p)).collect();
        let doc = c.schema.node("doc", &Attrs::new(), children, vec![]).unwrap();
        EditorState::create(c.schema.clone(), doc, None, c.plugins.clone())
    }

    fn placeholders(state: &EditorState) -> &PlaceholderState {
        state.plugin_state_as::<PlaceholderState>(PlaceholderPlugin::KEY).unwrap()
    }

    fn ranges(state: &EditorState) -> Vec<(usize, usize)> {
        placeholders(state)
            .decorations
            .iter()
            .map(|d| (d.from, d.to))
            .collect()
    }

    #[test]
    fn test_untouched_placeholder_is_reused() {
        let c = composition(Placeholder::new("Write…"));
        let before = state(&c, &["one", ""]);
        assert_eq!(ranges(&before), vec![(5, 7)]);

        let mut tr = before.tr();
        tr.insert_text(1, "x").unwrap();
        let after = before.apply(&tr).unwrap();

        assert_eq!(ranges(&after), vec![(6, 8)]);
        let old = placeholders(&before).decorations.iter().next().unwrap();
        let new = placeholders(&after).decorations.iter().next().unwrap();
        assert!(Arc::ptr_eq(&old.spec, &new.spec));
        assert_eq!(placeholders(&after).last_diff.kept, 1);
        assert!(placeholders(&after).last_diff.is_empty());
    }

    #[test]
    fn test_typing_removes_placeholder() {
        let c = composition(Placeholder::new("Write…"));
        let before = state(&c, &["one", ""]);

        let mut tr = before.tr();
        tr.insert_text(6, "a").unwrap();
        let after = before.apply(&tr).unwrap();

        assert!(ranges(&after).is_empty());
        assert_eq!(placeholders(&after).last_diff.removed.len(), 1);
    }

    #[test]
    fn test_only_at_cursor_follows_selection() {
        let c = composition(Placeholder::new("Write…").only_at_cursor());
        let before = state(&c, &["", ""]);
        assert_eq!(ranges(&before), vec![(0, 2)]);

        let mut tr = before.tr();
        tr.set_selection(Selection::collapsed(3));
        let after = before.apply(&tr).unwrap();

        assert_eq!(ranges(&after), vec![(2, 4)]);
        let diff = &placeholders(&after).last_diff;
        assert_eq!((diff.added.len(), diff.removed.len()), (1, 1));
    }

    #[test]
    fn test_selection_change_ignored_without_cursor_mode() {
        let c = composition(Placeholder::new("Write…"));
        let before = state(&c, &["", ""]);

        let mut tr = before.tr();
        tr.set_selection(Selection::collapsed(3));
        let after = before.apply(&tr).unwrap();

        assert_eq!(ranges(&after), vec![(0, 2), (2, 4)]);
        let old: Vec<_> = placeholders(&before).decorations.iter().collect();
        let new: Vec<_> = placeholders(&after).decorations.iter().collect();
        assert!(old.iter().zip(&new).all(|(a, b)| Arc::ptr_eq(&a.spec, &b.spec)));
    }

    #[test]
    fn test_innermost_vacant_block_wins() {
        let c = composition(Placeholder::new("Write…"));
        let quote = c
            .schema
            .node("blockquote", &Attrs::new(), vec![paragraph(&c, "")], vec![])
            .unwrap();
        let doc = c.schema.node("doc", &Attrs::new(), vec![quote], vec![]).unwrap();
        let before = EditorState::create(c.schema.clone(), doc, None, c.plugins.clone());
        // the paragraph at 1..3, not the quote at 0..4
        assert_eq!(ranges(&before), vec![(1, 3)]);

        let mut tr = before.tr();
        tr.insert_text(2, "a").unwrap();
        let after = before.apply(&tr).unwrap();
        assert!(ranges(&after).is_empty());
    }

    #[test]
    fn test_is_vacant() {
        let c = composition(Placeholder::new("Write…"));
        let block = |children| c.schema.node("blockquote", &Attrs::new(), children, vec![]).unwrap();
        assert!(is_vacant(&paragraph(&c, "")));
        assert!(!is_vacant(&paragraph(&c, "x")));
        assert!(is_vacant(&block(vec![paragraph(&c, "")])));
        assert!(!is_vacant(&block(vec![paragraph(&c, ""), paragraph(&c, "")])));
        assert!(!is_vacant(&block(vec![paragraph(&c, "x")])));
    }
}
