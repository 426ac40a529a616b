//! The document tree: nodes and marks.
//!
//! Nodes are cheap to clone (a shared pointer) and immutable. Construction
//! goes through [`crate::Schema`], so every `Node` in circulation satisfies
//! its type's content expression.
//!
//! Positions follow the usual convention: entering or leaving a non-leaf node
//! costs one, every text character costs one, every leaf node costs one.

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use smol_str::SmolStr;

use crate::schema::{AttrValue, Attrs, MarkType, NodeType};

/// An inline formatting annotation attached to inline nodes.
#[derive(Clone)]
pub struct Mark {
    mark_type: Arc<MarkType>,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new_unchecked(mark_type: Arc<MarkType>, attrs: Attrs) -> Self {
        Self { mark_type, attrs }
    }

    pub fn mark_type(&self) -> &Arc<MarkType> {
        &self.mark_type
    }

    pub fn name(&self) -> &SmolStr {
        self.mark_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Sort by rank and keep only the last mark of each type.
    pub fn normalize_set(marks: Vec<Mark>) -> Vec<Mark> {
        let mut set: Vec<Mark> = Vec::with_capacity(marks.len());
        for mark in marks {
            set = mark.add_to_set(&set);
        }
        set
    }

    /// Add this mark to a sorted set, replacing a mark of the same type.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut out: Vec<Mark> = set
            .iter()
            .filter(|m| m.name() != self.name())
            .cloned()
            .collect();
        let index = out
            .iter()
            .position(|m| m.mark_type.rank() > self.mark_type.rank())
            .unwrap_or(out.len());
        out.insert(index, self.clone());
        out
    }

    /// Remove every mark of type `name` from a set.
    pub fn remove_from_set(name: &str, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| m.name() != name).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.attrs == other.attrs
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.attrs.is_empty() {
            write!(f, "{:?}", self.attrs)?;
        }
        Ok(())
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.name().as_str())?;
        if !self.attrs.is_empty() {
            map.serialize_entry("attrs", &self.attrs)?;
        }
        map.end()
    }
}

struct NodeInner {
    node_type: Arc<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
    text: Option<String>,
    marks: Vec<Mark>,
}

/// A node in the document tree.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    pub(crate) fn new_unchecked(
        node_type: Arc<NodeType>,
        attrs: Attrs,
        content: Vec<Node>,
        text: Option<String>,
        marks: Vec<Mark>,
    ) -> Self {
        Node(Arc::new(NodeInner {
            node_type,
            attrs,
            content,
            text,
            marks,
        }))
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.0.node_type
    }

    pub fn type_name(&self) -> &SmolStr {
        self.0.node_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.0.attrs.get(name)
    }

    pub fn children(&self) -> &[Node] {
        &self.0.content
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last()
    }

    pub fn child_count(&self) -> usize {
        self.0.content.len()
    }

    /// Text of a text node; `None` for every other node.
    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.node_type.is_textblock()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.node_type.is_leaf()
    }

    pub fn is_inline(&self) -> bool {
        self.0.node_type.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.node_type.is_block()
    }

    /// Same object, not just equal content.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Size of this node in position units.
    pub fn node_size(&self) -> usize {
        match &self.0.text {
            Some(text) => text.chars().count(),
            None if self.is_leaf() => 1,
            None => self.content_size() + 2,
        }
    }

    /// Size of this node's content.
    pub fn content_size(&self) -> usize {
        self.0.content.iter().map(Node::node_size).sum()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.0.text {
            out.push_str(text);
        }
        for child in &self.0.content {
            child.collect_text(out);
        }
    }

    /// Call `f` for every descendant with its position relative to the start
    /// of this node's content, its parent and its index in the parent.
    /// Returning false from `f` skips that node's children.
    pub fn descendants<F>(&self, mut f: F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        self.walk(0, &mut f);
    }

    fn walk<F>(&self, base: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        let mut pos = base;
        for (index, child) in self.0.content.iter().enumerate() {
            if f(child, pos, self, index) && !child.0.content.is_empty() {
                child.walk(pos + 1, f);
            }
            pos += child.node_size();
        }
    }

    /// Same type, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.type_name() == other.type_name()
            && self.0.attrs == other.0.attrs
            && self.0.marks == other.0.marks
    }

    /// A copy of this text node with different text.
    pub(crate) fn with_text(&self, text: String) -> Node {
        debug_assert!(self.is_text());
        Node::new_unchecked(
            self.0.node_type.clone(),
            Attrs::new(),
            Vec::new(),
            Some(text),
            self.0.marks.clone(),
        )
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.type_name() == other.type_name()
                && self.0.attrs == other.0.attrs
                && self.0.text == other.0.text
                && self.0.marks == other.0.marks
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.0.text {
            for mark in self.0.marks.iter().rev() {
                write!(f, "{}(", mark.name())?;
            }
            write!(f, "{text:?}")?;
            for _ in &self.0.marks {
                f.write_str(")")?;
            }
            return Ok(());
        }
        f.write_str(self.type_name())?;
        if !self.0.attrs.is_empty() {
            write!(f, "{:?}", self.0.attrs)?;
        }
        if !self.0.content.is_empty() {
            f.write_str("(")?;
            for (i, child) in self.0.content.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child:?}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.type_name().as_str())?;
        if !self.0.attrs.is_empty() {
            map.serialize_entry("attrs", &self.0.attrs)?;
        }
        if let Some(text) = &self.0.text {
            map.serialize_entry("text", text)?;
        }
        if !self.0.marks.is_empty() {
            map.serialize_entry("marks", &self.0.marks)?;
        }
        if !self.0.content.is_empty() {
            map.serialize_entry("content", &self.0.content)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrSpec, MarkSpec, NodeSpec, Schema};

    fn schema() -> Schema {
        Schema::new(
            [
                NodeSpec::new("doc").content("block+"),
                NodeSpec::new("paragraph").content("inline*").group("block"),
                NodeSpec::new("rule").group("block"),
                NodeSpec::new("text").group("inline"),
            ],
            [
                MarkSpec::new("em"),
                MarkSpec::new("link").attr("href", AttrSpec::required()),
                MarkSpec::new("code"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sizes() {
        let s = schema();
        let para = s
            .node("paragraph", &Attrs::new(), vec![s.text("héllo", vec![]).unwrap()], vec![])
            .unwrap();
        let rule = s.node("rule", &Attrs::new(), vec![], vec![]).unwrap();
        let doc = s.node("doc", &Attrs::new(), vec![para, rule], vec![]).unwrap();
        assert_eq!(doc.child(0).unwrap().node_size(), 7);
        assert_eq!(doc.child(1).unwrap().node_size(), 1);
        assert_eq!(doc.content_size(), 8);
        assert_eq!(doc.text_content(), "héllo");
    }

    #[test]
    fn test_mark_sets_sorted_by_rank() {
        let s = schema();
        let code = s.mark("code", &Attrs::new()).unwrap();
        let em = s.mark("em", &Attrs::new()).unwrap();
        let set = Mark::normalize_set(vec![code.clone(), em.clone(), code.clone()]);
        assert_eq!(set, vec![em.clone(), code]);
        assert_eq!(Mark::remove_from_set("em", &set).len(), 1);
        assert!(em.is_in_set(&set));
    }

    #[test]
    fn test_descendants_positions() {
        let s = schema();
        let p1 = s
            .node("paragraph", &Attrs::new(), vec![s.text("ab", vec![]).unwrap()], vec![])
            .unwrap();
        let p2 = s.node("paragraph", &Attrs::new(), vec![], vec![]).unwrap();
        let doc = s.node("doc", &Attrs::new(), vec![p1, p2], vec![]).unwrap();
        let mut seen = Vec::new();
        doc.descendants(|node, pos, _, _| {
            seen.push((node.type_name().to_string(), pos));
            true
        });
        assert_eq!(
            seen,
            vec![
                ("paragraph".to_string(), 0),
                ("text".to_string(), 1),
                ("paragraph".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_debug_format() {
        let s = schema();
        let em = s.mark("em", &Attrs::new()).unwrap();
        let para = s
            .node(
                "paragraph",
                &Attrs::new(),
                vec![
                    s.text("a ", vec![]).unwrap(),
                    s.text("b", vec![em]).unwrap(),
                ],
                vec![],
            )
            .unwrap();
        assert_eq!(format!("{para:?}"), r#"paragraph("a ", em("b"))"#);
    }
}
