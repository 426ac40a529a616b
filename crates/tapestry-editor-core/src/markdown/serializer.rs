use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::escape::EscapeConfig;
use super::writer::MarkdownWriter;
use crate::error::SerializeError;
use crate::model::{Mark, Node};

/// Renders one node: `(writer, node, parent, index_in_parent)`.
pub type NodeSerializer =
    Arc<dyn Fn(&mut MarkdownWriter<'_>, &Node, &Node, usize) -> Result<(), SerializeError> + Send + Sync>;

/// Computes a mark delimiter from its surroundings: `(writer, mark, parent, index)`.
pub type MarkDelimFn = Arc<dyn Fn(&mut MarkdownWriter<'_>, &Mark, &Node, usize) -> String + Send + Sync>;

#[derive(Clone)]
pub enum MarkDelim {
    Static(SmolStr),
    Dynamic(MarkDelimFn),
}

impl From<&'static str> for MarkDelim {
    fn from(s: &'static str) -> Self {
        MarkDelim::Static(SmolStr::new_static(s))
    }
}

impl fmt::Debug for MarkDelim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkDelim::Static(s) => write!(f, "{s:?}"),
            MarkDelim::Dynamic(_) => f.write_str("<dynamic>"),
        }
    }
}

/// How a mark is written around the text it covers.
#[derive(Debug, Clone)]
pub struct MarkSerializer {
    pub open: MarkDelim,
    pub close: MarkDelim,
    /// May be closed in a different order than opened (`*` and `**`).
    pub mixable: bool,
    /// Leading and trailing whitespace is moved outside the delimiters.
    pub expel_enclosing_whitespace: bool,
    /// Escape the covered text. Must be the innermost mark when false.
    pub escape: bool,
}

impl MarkSerializer {
    pub fn new(open: impl Into<MarkDelim>, close: impl Into<MarkDelim>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            mixable: false,
            expel_enclosing_whitespace: false,
            escape: true,
        }
    }

    pub fn dynamic<O, C>(open: O, close: C) -> Self
    where
        O: Fn(&mut MarkdownWriter<'_>, &Mark, &Node, usize) -> String + Send + Sync + 'static,
        C: Fn(&mut MarkdownWriter<'_>, &Mark, &Node, usize) -> String + Send + Sync + 'static,
    {
        Self::new(MarkDelim::Dynamic(Arc::new(open)), MarkDelim::Dynamic(Arc::new(close)))
    }

    pub fn mixable(mut self) -> Self {
        self.mixable = true;
        self
    }

    pub fn expel_whitespace(mut self) -> Self {
        self.expel_enclosing_whitespace = true;
        self
    }

    pub fn no_escape(mut self) -> Self {
        self.escape = false;
        self
    }
}

/// Document tree to markdown text.
#[derive(Clone)]
pub struct MarkdownSerializer {
    nodes: IndexMap<SmolStr, NodeSerializer>,
    marks: IndexMap<SmolStr, MarkSerializer>,
    escape: EscapeConfig,
}

impl MarkdownSerializer {
    pub fn new(
        nodes: IndexMap<SmolStr, NodeSerializer>,
        marks: IndexMap<SmolStr, MarkSerializer>,
        escape: EscapeConfig,
    ) -> Self {
        Self {
            nodes,
            marks,
            escape,
        }
    }

    pub fn node_serializer(&self, name: &str) -> Option<&NodeSerializer> {
        self.nodes.get(name)
    }

    pub fn mark_serializer(&self, name: &str) -> Option<&MarkSerializer> {
        self.marks.get(name)
    }

    pub fn escape(&self) -> &EscapeConfig {
        &self.escape
    }

    /// Serialize with the configured escape patterns.
    pub fn serialize(&self, doc: &Node) -> Result<String, SerializeError> {
        self.serialize_with_escape(doc, &self.escape)
    }

    /// Serialize with one-off escape patterns.
    pub fn serialize_with_escape(&self, doc: &Node, escape: &EscapeConfig) -> Result<String, SerializeError> {
        tapestry_common::measure("markdown serialize", || {
            let mut writer = MarkdownWriter::new(self, escape);
            writer.render_content(doc)?;
            Ok(canonicalize(writer.into_output()))
        })
    }
}

impl fmt::Debug for MarkdownSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownSerializer")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("marks", &self.marks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// No leading blank lines, exactly one trailing newline, `""` when empty.
fn canonicalize(out: String) -> String {
    let trimmed = out.trim_start_matches('\n').trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize(String::new()), "");
        assert_eq!(canonicalize("\n\n".into()), "");
        assert_eq!(canonicalize("\na\n\n\n".into()), "a\n");
        assert_eq!(canonicalize("a".into()), "a\n");
    }
}
