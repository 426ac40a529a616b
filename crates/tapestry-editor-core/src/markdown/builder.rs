//! Token stream reduction into a schema-valid tree.
//!
//! The builder keeps a stack of open contexts. Each context tracks where its
//! children stand in the node type's content expression, so a child that does
//! not fit is caught when it arrives instead of when the parent closes:
//!
//! - required children missing before it are filled with defaults,
//! - inline content in a block-only context opens an implicit default block,
//! - an implicit block that cannot take the child is closed and the parent
//!   tried again,
//! - anything else is dropped and reported as a [`ParseAnomaly`].

use std::sync::Arc;

use smol_str::SmolStr;

use super::parser::ParseAnomaly;
use crate::content::ContentMatch;
use crate::model::{Mark, Node};
use crate::schema::{AttrValue, Attrs, NodeType, Schema};

/// Deepest block nesting the builder creates. Opens past it are skipped and
/// their content flows into the innermost open node.
pub const MAX_NESTING: usize = 100;

struct Frame {
    node_type: Arc<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
    state: ContentMatch,
    /// Active inline marks.
    marks: Vec<Mark>,
    /// Opened by the builder, not by a token.
    implicit: bool,
}

impl Frame {
    fn new(node_type: Arc<NodeType>, attrs: Attrs, marks: Vec<Mark>, implicit: bool) -> Self {
        let state = node_type.content_expr().start();
        Self {
            node_type,
            attrs,
            content: Vec::new(),
            state,
            marks,
            implicit,
        }
    }
}

/// Builds a document from tokens. Parse rules drive it through the methods
/// below.
pub struct TreeBuilder<'a> {
    schema: &'a Schema,
    stack: Vec<Frame>,
    /// Names of rejected opens, with the stack depth at rejection.
    skipped: Vec<(SmolStr, usize)>,
    anomalies: Vec<ParseAnomaly>,
    depth_capped: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        let root = Frame::new(schema.top_node_type().clone(), Attrs::new(), Vec::new(), false);
        Self {
            schema,
            stack: vec![root],
            skipped: Vec::new(),
            anomalies: Vec::new(),
            depth_capped: false,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Type name of the innermost open context.
    pub fn current(&self) -> Option<&SmolStr> {
        self.stack.last().map(|f| f.node_type.name())
    }

    pub fn report(&mut self, anomaly: ParseAnomaly) {
        self.anomalies.push(anomaly);
    }

    /// Open a non-leaf node. Returns false when it was rejected; its
    /// content then flows into the enclosing context.
    pub fn open_node(&mut self, name: &str, attrs: &Attrs) -> bool {
        let Some(node_type) = self.schema.node_type(name).cloned() else {
            self.reject(name);
            return false;
        };
        if self.stack.len() > MAX_NESTING {
            if !self.depth_capped {
                self.depth_capped = true;
                self.report(ParseAnomaly::TooDeep {
                    node: name.into(),
                    limit: MAX_NESTING,
                });
            }
            self.skipped.push((name.into(), self.stack.len()));
            return false;
        }
        if !self.make_room(&node_type) {
            self.reject(name);
            return false;
        }
        let marks = if node_type.is_inline() {
            self.marks().to_vec()
        } else {
            Vec::new()
        };
        self.stack.push(Frame::new(node_type, attrs.clone(), marks, false));
        true
    }

    /// Close the innermost open node named `name`.
    pub fn close_node(&mut self, name: &str) -> bool {
        let frame_index = self
            .stack
            .iter()
            .rposition(|f| !f.implicit && f.node_type.name() == name)
            .filter(|&i| i > 0);
        let skip_index = self.skipped.iter().rposition(|(n, _)| n == name);

        if let Some(s) = skip_index
            && frame_index.is_none_or(|f| self.skipped[s].1 > f)
        {
            self.skipped.remove(s);
            return false;
        }
        let Some(index) = frame_index else {
            self.report(ParseAnomaly::UnmatchedClose { name: name.into() });
            return false;
        };
        while self.stack.len() > index + 1 {
            if let Some(top) = self.stack.last()
                && !top.implicit
            {
                let node = top.node_type.name().clone();
                self.report(ParseAnomaly::Unclosed { node });
            }
            self.close_top();
        }
        self.close_top()
    }

    /// Add a leaf node (image, rule, hard break).
    pub fn add_node(&mut self, name: &str, attrs: &Attrs) -> bool {
        let Some(node_type) = self.schema.node_type(name).cloned() else {
            self.reject(name);
            return false;
        };
        let marks = if node_type.is_inline() {
            self.marks().to_vec()
        } else {
            Vec::new()
        };
        match self.schema.node(name, attrs, Vec::new(), marks) {
            Ok(node) => self.push_child(node),
            Err(err) => {
                self.report(ParseAnomaly::InvalidNode {
                    node: name.into(),
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    /// Add text carrying the active marks.
    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.schema.text(text, self.marks().to_vec()) {
            Ok(node) => {
                self.push_child(node);
            }
            Err(err) => self.report(ParseAnomaly::InvalidNode {
                node: "text".into(),
                reason: err.to_string(),
            }),
        }
    }

    pub fn open_mark(&mut self, name: &str, attrs: &Attrs) {
        match self.schema.mark(name, attrs) {
            Ok(mark) => {
                if let Some(top) = self.stack.last_mut() {
                    top.marks = mark.add_to_set(&top.marks);
                }
            }
            Err(err) => self.report(ParseAnomaly::InvalidNode {
                node: name.into(),
                reason: err.to_string(),
            }),
        }
    }

    pub fn close_mark(&mut self, name: &str) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        if top.marks.iter().any(|m| m.name() == name) {
            top.marks = Mark::remove_from_set(name, &top.marks);
        } else if self.schema.mark_type(name).is_some() {
            self.report(ParseAnomaly::UnmatchedClose { name: name.into() });
        }
    }

    /// Set an attribute on the innermost open node of type `node`.
    pub fn set_attr(&mut self, node: &str, attr: &str, value: AttrValue) -> bool {
        match self.stack.iter_mut().rev().find(|f| f.node_type.name() == node) {
            Some(frame) => {
                frame.attrs.insert(attr.into(), value);
                true
            }
            None => false,
        }
    }

    /// Close everything and return the document, if one could be built.
    pub fn finish(mut self) -> (Option<Node>, Vec<ParseAnomaly>) {
        while self.stack.len() > 1 {
            if let Some(top) = self.stack.last()
                && !top.implicit
            {
                let node = top.node_type.name().clone();
                self.report(ParseAnomaly::Unclosed { node });
            }
            self.close_top();
        }
        let doc = self.stack.pop().and_then(|root| {
            let name = root.node_type.name().clone();
            match self.schema.node_filled(&name, &root.attrs, root.content) {
                Ok(doc) => Some(doc),
                Err(err) => {
                    self.anomalies.push(ParseAnomaly::InvalidNode {
                        node: name,
                        reason: err.to_string(),
                    });
                    None
                }
            }
        });
        (doc, self.anomalies)
    }

    fn marks(&self) -> &[Mark] {
        self.stack.last().map_or(&[], |f| &f.marks)
    }

    fn reject(&mut self, name: &str) {
        let parent = self.current().cloned().unwrap_or_default();
        self.report(ParseAnomaly::Rejected {
            node: name.into(),
            parent,
        });
        self.skipped.push((name.into(), self.stack.len()));
    }

    /// Prepare the stack so the top context accepts `node_type` next.
    fn make_room(&mut self, node_type: &NodeType) -> bool {
        let mut wrapped = false;
        loop {
            let Some(top) = self.stack.last() else {
                return false;
            };
            let expr = top.node_type.content_expr();
            let fill = top.state.fill_before(expr, node_type.name());
            let default_block = self.schema.default_block().clone();
            let can_wrap = node_type.is_inline()
                && !wrapped
                && !top.node_type.is_textblock()
                && top.state.fill_before(expr, default_block.name()).is_some();
            let implicit = top.implicit;

            if let Some(fill) = fill
                && self.insert_fill(&fill)
            {
                return true;
            }
            if can_wrap {
                wrapped = true;
                if self.make_room(&default_block) {
                    let marks = self.marks().to_vec();
                    self.stack
                        .push(Frame::new(default_block, Attrs::new(), marks, true));
                    continue;
                }
            }
            if implicit {
                self.close_top();
                continue;
            }
            return false;
        }
    }

    fn insert_fill(&mut self, fill: &[SmolStr]) -> bool {
        let mut nodes = Vec::with_capacity(fill.len());
        for name in fill {
            match self.schema.node_filled(name, &Attrs::new(), Vec::new()) {
                Ok(node) => nodes.push(node),
                Err(_) => return false,
            }
        }
        for node in nodes {
            self.append(node);
        }
        true
    }

    fn push_child(&mut self, node: Node) -> bool {
        if !self.make_room(node.node_type()) {
            let parent = self.current().cloned().unwrap_or_default();
            self.report(ParseAnomaly::Rejected {
                node: node.type_name().clone(),
                parent,
            });
            return false;
        }
        self.append(node)
    }

    /// Append to the top context, which must accept the node.
    fn append(&mut self, node: Node) -> bool {
        let schema = self.schema;
        let Some(top) = self.stack.last_mut() else {
            return false;
        };
        let node = if !top.node_type.marks_allowed() && !node.marks().is_empty() {
            strip_marks(schema, node)
        } else {
            node
        };

        if let (Some(text), Some(prev)) = (node.text(), top.content.last_mut())
            && let Some(prev_text) = prev.text()
            && prev.marks() == node.marks()
        {
            *prev = prev.with_text(format!("{prev_text}{text}"));
            return true;
        }

        let expr = top.node_type.content_expr();
        match top.state.match_type(expr, node.type_name()) {
            Some(next) => {
                top.state = next;
                top.content.push(node);
                true
            }
            None => {
                let parent = top.node_type.name().clone();
                self.report(ParseAnomaly::Rejected {
                    node: node.type_name().clone(),
                    parent,
                });
                false
            }
        }
    }

    fn close_top(&mut self) -> bool {
        let Some(frame) = self.stack.pop() else {
            return false;
        };
        if self.stack.is_empty() {
            self.stack.push(frame);
            return false;
        }
        let name = frame.node_type.name().clone();
        let implicit = frame.implicit;
        let inner_marks = frame.marks;
        match self.schema.node_filled(&name, &frame.attrs, frame.content) {
            Ok(node) => {
                if implicit && let Some(parent) = self.stack.last_mut() {
                    parent.marks = inner_marks;
                }
                self.append(node)
            }
            Err(err) => {
                self.report(ParseAnomaly::InvalidNode {
                    node: name,
                    reason: err.to_string(),
                });
                false
            }
        }
    }
}

fn strip_marks(schema: &Schema, node: Node) -> Node {
    match node.text() {
        Some(text) => schema.text(text, Vec::new()).unwrap_or(node),
        None => Node::new_unchecked(
            node.node_type().clone(),
            node.attrs().clone(),
            node.children().to_vec(),
            None,
            Vec::new(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrSpec, MarkSpec, NodeSpec};

    fn schema() -> Schema {
        Schema::new(
            [
                NodeSpec::new("doc").content("block+"),
                NodeSpec::new("paragraph").content("inline*").group("block"),
                NodeSpec::new("code_block")
                    .content("text*")
                    .group("block")
                    .no_marks(),
                NodeSpec::new("bullet_list").content("list_item+").group("block"),
                NodeSpec::new("list_item").content("paragraph block*"),
                NodeSpec::new("image")
                    .inline()
                    .group("inline")
                    .attr("src", AttrSpec::required()),
                NodeSpec::new("text").group("inline"),
            ],
            [MarkSpec::new("em")],
        )
        .unwrap()
    }

    #[test]
    fn test_inline_at_top_is_wrapped() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.add_text("loose");
        let (doc, anomalies) = b.finish();
        assert_eq!(format!("{:?}", doc.unwrap()), r#"doc(paragraph("loose"))"#);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_text_merges_and_marks_apply() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_node("paragraph", &Attrs::new());
        b.add_text("a");
        b.add_text("b");
        b.open_mark("em", &Attrs::new());
        b.add_text("c");
        b.close_mark("em");
        b.close_node("paragraph");
        let (doc, _) = b.finish();
        assert_eq!(format!("{:?}", doc.unwrap()), r#"doc(paragraph("ab", em("c")))"#);
    }

    #[test]
    fn test_missing_leading_paragraph_is_filled() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_node("bullet_list", &Attrs::new());
        b.open_node("list_item", &Attrs::new());
        b.open_node("bullet_list", &Attrs::new());
        b.open_node("list_item", &Attrs::new());
        b.add_text("x");
        b.close_node("list_item");
        b.close_node("bullet_list");
        b.close_node("list_item");
        b.close_node("bullet_list");
        let (doc, anomalies) = b.finish();
        assert_eq!(
            format!("{:?}", doc.unwrap()),
            r#"doc(bullet_list(list_item(paragraph, bullet_list(list_item(paragraph("x"))))))"#
        );
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_code_block_drops_marks() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_mark("em", &Attrs::new());
        b.open_node("code_block", &Attrs::new());
        b.add_text("x");
        b.close_node("code_block");
        let (doc, _) = b.finish();
        assert_eq!(format!("{:?}", doc.unwrap()), r#"doc(code_block("x"))"#);
    }

    #[test]
    fn test_rejected_and_unmatched_are_reported() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_node("paragraph", &Attrs::new());
        assert!(!b.open_node("bullet_list", &Attrs::new()));
        b.add_text("kept");
        b.close_node("bullet_list");
        b.close_node("paragraph");
        b.close_node("paragraph");
        let (doc, anomalies) = b.finish();
        assert_eq!(format!("{:?}", doc.unwrap()), r#"doc(paragraph("kept"))"#);
        assert_eq!(
            anomalies,
            vec![
                ParseAnomaly::Rejected {
                    node: "bullet_list".into(),
                    parent: "paragraph".into()
                },
                ParseAnomaly::UnmatchedClose {
                    name: "paragraph".into()
                },
            ]
        );
    }

    #[test]
    fn test_unclosed_at_end() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_node("paragraph", &Attrs::new());
        b.add_text("open");
        let (doc, anomalies) = b.finish();
        assert_eq!(doc.unwrap().text_content(), "open");
        assert_eq!(
            anomalies,
            vec![ParseAnomaly::Unclosed {
                node: "paragraph".into()
            }]
        );
    }

    #[test]
    fn test_set_attr_on_enclosing() {
        let s = schema();
        let mut b = TreeBuilder::new(&s);
        b.open_node("bullet_list", &Attrs::new());
        assert!(b.set_attr("bullet_list", "tight", AttrValue::Bool(true)));
        assert!(!b.set_attr("list_item", "checked", AttrValue::Bool(true)));
    }
}
