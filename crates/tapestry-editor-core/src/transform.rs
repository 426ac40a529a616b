//! Tree edits used to build transactions.
//!
//! Every function takes the current document and returns a fresh one plus
//! the [`StepMap`] describing the change. Untouched subtrees are shared with
//! the old document.

use std::ops::Range;

use crate::error::TransformError;
use crate::mapping::StepMap;
use crate::model::{Mark, Node};
use crate::schema::{Attrs, Schema};

/// Content ranges of every textblock, in document order.
pub fn textblock_ranges(doc: &Node) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    doc.descendants(|node, pos, _, _| {
        if node.is_textblock() {
            ranges.push(pos + 1..pos + 1 + node.content_size());
            false
        } else {
            !node.is_leaf()
        }
    });
    ranges
}

/// The textblock whose content contains `pos`, with its start position.
pub fn find_textblock(doc: &Node, pos: usize) -> Option<(Node, usize)> {
    let mut found = None;
    doc.descendants(|node, start, _, _| {
        if found.is_some() {
            return false;
        }
        let end = start + node.node_size();
        if node.is_textblock() {
            if start < pos && pos < end {
                found = Some((node.clone(), start));
            }
            false
        } else {
            start < pos && pos < end
        }
    });
    found
}

/// Insert `text` at `pos`, which must point into a textblock.
///
/// The new text takes the marks of the text immediately before it.
pub fn insert_text(
    schema: &Schema,
    doc: &Node,
    pos: usize,
    text: &str,
) -> Result<(Node, StepMap), TransformError> {
    let len = text.chars().count();
    if len == 0 {
        return Ok((doc.clone(), StepMap::default()));
    }
    let doc = edit_textblock(schema, doc, pos, &mut |block, offset| {
        let children = insert_inline(schema, block.children(), offset, text)?;
        Ok(schema.with_content(block, children)?)
    })?;
    Ok((doc, StepMap::new(vec![(pos, 0, len)])))
}

/// Delete `from..to`, which must lie inside a single textblock.
pub fn delete_text(
    schema: &Schema,
    doc: &Node,
    from: usize,
    to: usize,
) -> Result<(Node, StepMap), TransformError> {
    if from >= to {
        return Ok((doc.clone(), StepMap::default()));
    }
    let (block, start) =
        find_textblock(doc, from).ok_or(TransformError::InvalidPosition { pos: from })?;
    if to > start + 1 + block.content_size() {
        return Err(TransformError::InvalidPosition { pos: to });
    }
    let len = to - from;
    let doc = edit_textblock(schema, doc, from, &mut |block, offset| {
        let children = delete_inline(block.children(), offset, offset + len);
        Ok(schema.with_content(block, children)?)
    })?;
    Ok((doc, StepMap::new(vec![(from, len, 0)])))
}

/// Change the type of the textblock containing `pos`.
///
/// Marks are stripped when the target type does not allow them.
pub fn set_block_type(
    schema: &Schema,
    doc: &Node,
    pos: usize,
    type_name: &str,
    attrs: &Attrs,
) -> Result<(Node, StepMap), TransformError> {
    let (block, start) = find_textblock(doc, pos).ok_or(TransformError::InvalidPosition { pos })?;
    let end = start + block.node_size();
    let doc = edit_textblock(schema, doc, pos, &mut |block, _| {
        let target = schema
            .node_type(type_name)
            .ok_or_else(|| crate::error::SchemaError::UnknownNodeType(type_name.into()))?;
        let children = if target.marks_allowed() {
            block.children().to_vec()
        } else {
            block
                .children()
                .iter()
                .map(|c| match c.text() {
                    Some(text) => schema.text(text, Vec::new()),
                    None => Ok(c.clone()),
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(schema.node(type_name, attrs, merge_text(children), Vec::new())?)
    })?;
    Ok((doc, StepMap::new(vec![(start, 1, 1), (end - 1, 1, 1)])))
}

/// Insert top-level `blocks` before the child at `index` (clamped to the
/// child count).
pub fn insert_blocks(
    schema: &Schema,
    doc: &Node,
    index: usize,
    blocks: Vec<Node>,
) -> Result<(Node, StepMap), TransformError> {
    let size: usize = blocks.iter().map(Node::node_size).sum();
    if size == 0 {
        return Ok((doc.clone(), StepMap::default()));
    }
    let index = index.min(doc.child_count());
    let pos: usize = doc.children()[..index].iter().map(Node::node_size).sum();
    let mut content = doc.children().to_vec();
    content.splice(index..index, blocks);
    let doc = schema.with_content(doc, content)?;
    Ok((doc, StepMap::new(vec![(pos, 0, size)])))
}

/// Merge adjacent text nodes that carry the same marks.
pub(crate) fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (Some(prev), Some(text)) = (out.last(), node.text())
            && let Some(prev_text) = prev.text()
            && prev.marks() == node.marks()
        {
            let merged = prev.with_text(format!("{prev_text}{text}"));
            if let Some(last) = out.last_mut() {
                *last = merged;
            }
            continue;
        }
        out.push(node);
    }
    out
}

type BlockEdit<'a> = dyn FnMut(&Node, usize) -> Result<Node, TransformError> + 'a;

/// Rebuild the path down to the textblock containing `pos` (relative to
/// `node`'s content), replacing that block with `edit(block, offset)`.
fn edit_textblock(
    schema: &Schema,
    node: &Node,
    pos: usize,
    edit: &mut BlockEdit<'_>,
) -> Result<Node, TransformError> {
    edit_at(schema, node, pos, pos, edit)
}

fn edit_at(
    schema: &Schema,
    node: &Node,
    pos: usize,
    doc_pos: usize,
    edit: &mut BlockEdit<'_>,
) -> Result<Node, TransformError> {
    let mut offset = 0;
    for (index, child) in node.children().iter().enumerate() {
        let end = offset + child.node_size();
        if child.is_textblock() && offset < pos && pos < end {
            let replaced = edit(child, pos - offset - 1)?;
            return replace_child(schema, node, index, replaced);
        }
        if !child.is_leaf() && !child.is_text() && offset < pos && pos < end {
            let replaced = edit_at(schema, child, pos - offset - 1, doc_pos, edit)?;
            return replace_child(schema, node, index, replaced);
        }
        offset = end;
    }
    Err(TransformError::InvalidPosition { pos: doc_pos })
}

fn replace_child(
    schema: &Schema,
    node: &Node,
    index: usize,
    child: Node,
) -> Result<Node, TransformError> {
    let mut children = node.children().to_vec();
    children[index] = child;
    Ok(schema.with_content(node, children)?)
}

fn insert_inline(
    schema: &Schema,
    children: &[Node],
    offset: usize,
    text: &str,
) -> Result<Vec<Node>, TransformError> {
    let mut out = Vec::with_capacity(children.len() + 1);
    let mut pos = 0;
    let mut inserted = false;
    for child in children {
        let size = child.node_size();
        if !inserted
            && let Some(existing) = child.text()
            && pos < offset
            && offset <= pos + size
        {
            let split = existing
                .char_indices()
                .nth(offset - pos)
                .map_or(existing.len(), |(i, _)| i);
            let mut joined = String::with_capacity(existing.len() + text.len());
            joined.push_str(&existing[..split]);
            joined.push_str(text);
            joined.push_str(&existing[split..]);
            out.push(child.with_text(joined));
            inserted = true;
        } else {
            if !inserted && pos == offset {
                out.push(schema.text(text, Vec::<Mark>::new())?);
                inserted = true;
            }
            out.push(child.clone());
        }
        pos += size;
    }
    if !inserted {
        out.push(schema.text(text, Vec::new())?);
    }
    Ok(merge_text(out))
}

fn delete_inline(children: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::with_capacity(children.len());
    let mut pos = 0;
    for child in children {
        let start = pos;
        pos += child.node_size();
        if pos <= from || start >= to {
            out.push(child.clone());
            continue;
        }
        // Inline leaves inside the range are dropped whole.
        if let Some(text) = child.text() {
            let kept: String = text
                .chars()
                .enumerate()
                .filter(|(i, _)| start + i < from || start + i >= to)
                .map(|(_, c)| c)
                .collect();
            if !kept.is_empty() {
                out.push(child.with_text(kept));
            }
        }
    }
    merge_text(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrSpec, AttrValue, MarkSpec, NodeSpec};

    fn schema() -> Schema {
        Schema::new(
            [
                NodeSpec::new("doc").content("block+"),
                NodeSpec::new("paragraph").content("inline*").group("block"),
                NodeSpec::new("heading")
                    .content("inline*")
                    .group("block")
                    .attr("level", AttrSpec::with_default(1)),
                NodeSpec::new("code_block")
                    .content("text*")
                    .group("block")
                    .no_marks(),
                NodeSpec::new("blockquote").content("block+").group("block"),
                NodeSpec::new("text").group("inline"),
            ],
            [MarkSpec::new("em")],
        )
        .unwrap()
    }

    fn para(s: &Schema, children: Vec<Node>) -> Node {
        s.node("paragraph", &Attrs::new(), children, vec![]).unwrap()
    }

    fn doc(s: &Schema, children: Vec<Node>) -> Node {
        s.node("doc", &Attrs::new(), children, vec![]).unwrap()
    }

    #[test]
    fn test_insert_into_empty_paragraph() {
        let s = schema();
        let d = doc(&s, vec![para(&s, vec![]), para(&s, vec![])]);
        let (next, map) = insert_text(&s, &d, 3, "x").unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph, paragraph("x"))"#);
        assert_eq!(map.ranges(), &[(3, 0, 1)]);
        assert!(d.child(0).unwrap().ptr_eq(next.child(0).unwrap()));
    }

    #[test]
    fn test_insert_inherits_preceding_marks() {
        let s = schema();
        let em = s.mark("em", &Attrs::new()).unwrap();
        let d = doc(
            &s,
            vec![para(
                &s,
                vec![s.text("ab", vec![em]).unwrap(), s.text("cd", vec![]).unwrap()],
            )],
        );
        let (next, _) = insert_text(&s, &d, 3, "X").unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph(em("abX"), "cd"))"#);
        let (next, _) = insert_text(&s, &d, 1, "Y").unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph("Y", em("ab"), "cd"))"#);
    }

    #[test]
    fn test_insert_nested_and_invalid() {
        let s = schema();
        let quote = s
            .node(
                "blockquote",
                &Attrs::new(),
                vec![para(&s, vec![s.text("hi", vec![]).unwrap()])],
                vec![],
            )
            .unwrap();
        let d = doc(&s, vec![quote]);
        let (next, _) = insert_text(&s, &d, 4, "!").unwrap();
        assert_eq!(next.text_content(), "hi!");
        assert_eq!(
            insert_text(&s, &d, 0, "x").unwrap_err(),
            TransformError::InvalidPosition { pos: 0 }
        );
    }

    #[test]
    fn test_set_block_type_strips_marks() {
        let s = schema();
        let em = s.mark("em", &Attrs::new()).unwrap();
        let d = doc(
            &s,
            vec![para(
                &s,
                vec![s.text("a", vec![em]).unwrap(), s.text("b", vec![]).unwrap()],
            )],
        );
        let (next, map) = set_block_type(&s, &d, 1, "code_block", &Attrs::new()).unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(code_block("ab"))"#);
        assert_eq!(map.ranges(), &[(0, 1, 1), (3, 1, 1)]);

        let level = Attrs::from([("level".into(), AttrValue::Int(2))]);
        let (next, _) = set_block_type(&s, &d, 1, "heading", &level).unwrap();
        assert_eq!(next.child(0).unwrap().attr("level"), Some(&AttrValue::Int(2)));
    }

    #[test]
    fn test_delete_text() {
        let s = schema();
        let em = s.mark("em", &Attrs::new()).unwrap();
        let d = doc(
            &s,
            vec![para(
                &s,
                vec![s.text("ab", vec![]).unwrap(), s.text("cd", vec![em]).unwrap(), s.text("ef", vec![]).unwrap()],
            )],
        );
        let (next, map) = delete_text(&s, &d, 2, 6).unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph("af"))"#);
        assert_eq!(map.ranges(), &[(2, 4, 0)]);
        assert_eq!(
            delete_text(&s, &d, 2, 20).unwrap_err(),
            TransformError::InvalidPosition { pos: 20 }
        );
    }

    #[test]
    fn test_insert_blocks() {
        let s = schema();
        let d = doc(&s, vec![para(&s, vec![s.text("b", vec![]).unwrap()])]);
        let first = para(&s, vec![s.text("a", vec![]).unwrap()]);
        let (next, map) = insert_blocks(&s, &d, 0, vec![first.clone()]).unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph("a"), paragraph("b"))"#);
        assert_eq!(map.ranges(), &[(0, 0, 3)]);

        let (next, map) = insert_blocks(&s, &d, 9, vec![first]).unwrap();
        assert_eq!(format!("{next:?}"), r#"doc(paragraph("b"), paragraph("a"))"#);
        assert_eq!(map.ranges(), &[(3, 0, 3)]);

        let (same, map) = insert_blocks(&s, &d, 0, Vec::new()).unwrap();
        assert!(same.ptr_eq(&d));
        assert!(map.ranges().is_empty());
    }

    #[test]
    fn test_textblock_ranges() {
        let s = schema();
        let d = doc(&s, vec![para(&s, vec![s.text("ab", vec![]).unwrap()]), para(&s, vec![])]);
        assert_eq!(textblock_ranges(&d), vec![1..3, 5..5]);
        assert_eq!(find_textblock(&d, 5).map(|(_, start)| start), Some(4));
    }
}
