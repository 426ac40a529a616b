//! Node and mark view factories.
//!
//! The core never renders. Extensions register factories here and the host
//! surface asks for a view when it paints a node or mark of that type.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::model::{Mark, Node};

/// Host-side rendering of one node.
pub trait NodeView: Send {
    /// Offer an updated node of the same type. Returning false asks the
    /// host to destroy this view and create a fresh one.
    fn update(&mut self, node: &Node) -> bool;

    fn destroy(&mut self) {}
}

/// Host-side rendering of one mark.
pub trait MarkView: Send {
    fn destroy(&mut self) {}
}

pub type NodeViewFactory = Arc<dyn Fn(&Node) -> Box<dyn NodeView> + Send + Sync>;

/// `(mark, inline)`: `inline` is false when the mark wraps a block-level
/// rendering.
pub type MarkViewFactory = Arc<dyn Fn(&Mark, bool) -> Box<dyn MarkView> + Send + Sync>;

/// Composed view factories, keyed by type name.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    nodes: IndexMap<SmolStr, NodeViewFactory>,
    marks: IndexMap<SmolStr, MarkViewFactory>,
}

impl ViewRegistry {
    pub(crate) fn new(
        nodes: IndexMap<SmolStr, NodeViewFactory>,
        marks: IndexMap<SmolStr, MarkViewFactory>,
    ) -> Self {
        Self { nodes, marks }
    }

    pub fn node_view(&self, node: &Node) -> Option<Box<dyn NodeView>> {
        self.nodes.get(node.type_name()).map(|factory| factory(node))
    }

    pub fn mark_view(&self, mark: &Mark, inline: bool) -> Option<Box<dyn MarkView>> {
        self.marks.get(mark.name()).map(|factory| factory(mark, inline))
    }

    pub fn node_types(&self) -> impl Iterator<Item = &SmolStr> {
        self.nodes.keys()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &SmolStr> {
        self.marks.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.marks.is_empty()
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("marks", &self.marks.keys().collect::<Vec<_>>())
            .finish()
    }
}
