//! Document schema: node and mark types assembled from extension specs.
//!
//! A [`Schema`] is immutable once built and is shared as `Arc<Schema>`. All
//! nodes are created through it, which is what keeps invalid trees
//! unrepresentable: attribute sets are completed and checked, and child
//! sequences are matched against the parent's content expression.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::content::ContentExpr;
use crate::error::SchemaError;
use crate::model::{Mark, Node};

/// Name of the schema's top node type.
pub const TOP_NODE: &str = "doc";
/// Name of the text node type.
pub const TEXT_NODE: &str = "text";
/// Group that block-level node types join.
pub const BLOCK_GROUP: &str = "block";
/// Group that inline node types join.
pub const INLINE_GROUP: &str = "inline";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(SmolStr),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => f.write_str("null"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.into())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value.into())
    }
}

impl From<SmolStr> for AttrValue {
    fn from(value: SmolStr) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttrValue::Null, Into::into)
    }
}

/// Attribute values of a node or mark, ordered by name.
pub type Attrs = BTreeMap<SmolStr, AttrValue>;

/// Declaration of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSpec {
    /// Value used when none is given. `None` makes the attribute required.
    pub default: Option<AttrValue>,
}

impl AttrSpec {
    pub fn required() -> Self {
        Self { default: None }
    }

    pub fn with_default(value: impl Into<AttrValue>) -> Self {
        Self {
            default: Some(value.into()),
        }
    }

    /// Optional attribute defaulting to null.
    pub fn optional() -> Self {
        Self::with_default(AttrValue::Null)
    }
}

/// Ordered attribute declarations of a node or mark type.
pub type AttrSpecs = IndexMap<SmolStr, AttrSpec>;

/// Declarative description of a node type, as contributed by an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: SmolStr,
    /// Content expression. Empty for leaf nodes.
    pub content: SmolStr,
    /// Space separated group names.
    pub group: SmolStr,
    pub inline: bool,
    pub atom: bool,
    pub marks_allowed: bool,
    pub attrs: AttrSpecs,
}

impl NodeSpec {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            content: SmolStr::default(),
            group: SmolStr::default(),
            inline: false,
            atom: false,
            marks_allowed: true,
            attrs: AttrSpecs::new(),
        }
    }

    pub fn content(mut self, expr: impl Into<SmolStr>) -> Self {
        self.content = expr.into();
        self
    }

    pub fn group(mut self, group: impl Into<SmolStr>) -> Self {
        self.group = group.into();
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    /// Disallow marks on this node's inline content (code blocks).
    pub fn no_marks(mut self) -> Self {
        self.marks_allowed = false;
        self
    }

    pub fn attr(mut self, name: impl Into<SmolStr>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }
}

/// Declarative description of a mark type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkSpec {
    pub name: SmolStr,
    pub attrs: AttrSpecs,
    /// Whether the mark extends to text typed at its end.
    pub inclusive: bool,
}

impl MarkSpec {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            attrs: AttrSpecs::new(),
            inclusive: true,
        }
    }

    pub fn attr(mut self, name: impl Into<SmolStr>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }
}

/// A compiled node type.
#[derive(Debug)]
pub struct NodeType {
    pub(crate) spec: NodeSpec,
    pub(crate) groups: Vec<SmolStr>,
    pub(crate) content: ContentExpr,
    pub(crate) rank: usize,
    pub(crate) textblock: bool,
}

impl NodeType {
    pub fn name(&self) -> &SmolStr {
        &self.spec.name
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn content_expr(&self) -> &ContentExpr {
        &self.content
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn is_text(&self) -> bool {
        self.spec.name == TEXT_NODE
    }

    pub fn is_inline(&self) -> bool {
        self.spec.inline || self.is_text()
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }

    /// Leaf nodes accept no content. Text is not considered a leaf.
    pub fn is_leaf(&self) -> bool {
        self.content.is_empty() && !self.is_text()
    }

    /// A block whose content is inline.
    pub fn is_textblock(&self) -> bool {
        self.textblock
    }

    pub fn marks_allowed(&self) -> bool {
        self.spec.marks_allowed
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name == other.spec.name
    }
}

/// A compiled mark type.
#[derive(Debug)]
pub struct MarkType {
    pub(crate) spec: MarkSpec,
    pub(crate) rank: usize,
}

impl MarkType {
    pub fn name(&self) -> &SmolStr {
        &self.spec.name
    }

    pub fn spec(&self) -> &MarkSpec {
        &self.spec
    }

    /// Position in the fixed mark precedence (definition order).
    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name == other.spec.name
    }
}

/// The assembled document vocabulary.
#[derive(Debug)]
pub struct Schema {
    nodes: IndexMap<SmolStr, Arc<NodeType>>,
    marks: IndexMap<SmolStr, Arc<MarkType>>,
    default_block: SmolStr,
}

impl Schema {
    /// Compile node and mark specs, in definition order.
    pub fn new(
        node_specs: impl IntoIterator<Item = NodeSpec>,
        mark_specs: impl IntoIterator<Item = MarkSpec>,
    ) -> Result<Self, SchemaError> {
        let node_specs: Vec<NodeSpec> = node_specs.into_iter().collect();
        let mark_specs: Vec<MarkSpec> = mark_specs.into_iter().collect();

        let mut groups: IndexMap<SmolStr, Vec<SmolStr>> = IndexMap::new();
        for spec in &node_specs {
            for group in spec.group.split_whitespace() {
                groups
                    .entry(SmolStr::new(group))
                    .or_default()
                    .push(spec.name.clone());
            }
        }
        let inline_types: Vec<SmolStr> = node_specs
            .iter()
            .filter(|s| s.inline || s.name == TEXT_NODE)
            .map(|s| s.name.clone())
            .collect();

        let resolve = |name: &str| -> Option<Vec<SmolStr>> {
            if node_specs.iter().any(|s| s.name == name) {
                Some(vec![SmolStr::new(name)])
            } else {
                groups.get(name).cloned()
            }
        };

        let mut nodes = IndexMap::new();
        for (rank, spec) in node_specs.iter().enumerate() {
            if nodes.contains_key(&spec.name) {
                return Err(SchemaError::DuplicateName(spec.name.clone()));
            }
            let content = ContentExpr::parse(&spec.content, &resolve).map_err(|source| {
                SchemaError::InvalidContentExpr {
                    node: spec.name.clone(),
                    expr: spec.content.clone(),
                    source,
                }
            })?;
            let is_inline = spec.inline || spec.name == TEXT_NODE;
            let textblock =
                !is_inline && content.accepts_any(|t| inline_types.iter().any(|i| i == t));
            let node_type = NodeType {
                spec: spec.clone(),
                groups: spec.group.split_whitespace().map(SmolStr::new).collect(),
                content,
                rank,
                textblock,
            };
            nodes.insert(spec.name.clone(), Arc::new(node_type));
        }

        let mut marks = IndexMap::new();
        for (rank, spec) in mark_specs.into_iter().enumerate() {
            if nodes.contains_key(&spec.name) || marks.contains_key(&spec.name) {
                return Err(SchemaError::DuplicateName(spec.name));
            }
            marks.insert(spec.name.clone(), Arc::new(MarkType { spec, rank }));
        }

        if !nodes.contains_key(TOP_NODE) {
            return Err(SchemaError::MissingRequired("top node `doc`".into()));
        }
        if !nodes.contains_key(TEXT_NODE) {
            return Err(SchemaError::MissingRequired("node `text`".into()));
        }
        let default_block = nodes
            .values()
            .find(|t| t.in_group(BLOCK_GROUP) && t.is_textblock())
            .map(|t| t.name().clone())
            .ok_or_else(|| SchemaError::MissingRequired("a block textblock".into()))?;

        tracing::trace!(
            target: "tapestry::schema",
            nodes = nodes.len(),
            marks = marks.len(),
            default_block = %default_block,
            "schema compiled"
        );

        Ok(Self {
            nodes,
            marks,
            default_block,
        })
    }

    pub fn node_type(&self, name: &str) -> Option<&Arc<NodeType>> {
        self.nodes.get(name)
    }

    pub fn mark_type(&self, name: &str) -> Option<&Arc<MarkType>> {
        self.marks.get(name)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &Arc<NodeType>> {
        self.nodes.values()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &Arc<MarkType>> {
        self.marks.values()
    }

    pub fn top_node_type(&self) -> &Arc<NodeType> {
        &self.nodes[TOP_NODE]
    }

    /// The first block textblock in definition order (usually `paragraph`).
    pub fn default_block(&self) -> &Arc<NodeType> {
        &self.nodes[&self.default_block]
    }

    fn require_node(&self, name: &str) -> Result<&Arc<NodeType>, SchemaError> {
        self.node_type(name)
            .ok_or_else(|| SchemaError::UnknownNodeType(name.into()))
    }

    /// Create a node, checking attributes and content.
    pub fn node(
        &self,
        name: &str,
        attrs: &Attrs,
        content: Vec<Node>,
        marks: Vec<Mark>,
    ) -> Result<Node, SchemaError> {
        let node_type = self.require_node(name)?;
        if node_type.is_text() {
            return Err(SchemaError::InvalidText);
        }
        let attrs = compute_attrs(node_type.name(), &node_type.spec.attrs, attrs)?;
        check_content(node_type, &content)?;
        Ok(Node::new_unchecked(node_type.clone(), attrs, content, None, marks))
    }

    /// Create a node, appending default children when required content is
    /// missing at the end.
    pub fn node_filled(
        &self,
        name: &str,
        attrs: &Attrs,
        mut content: Vec<Node>,
    ) -> Result<Node, SchemaError> {
        let node_type = self.require_node(name)?;
        let expr = node_type.content_expr();
        let state = expr
            .match_sequence(content.iter().map(|n| n.type_name().as_str()))
            .ok_or_else(|| invalid_content(node_type, &content))?;
        if let Some(missing) = state.fill_end(expr) {
            for child in missing {
                if child == TEXT_NODE {
                    return Err(invalid_content(node_type, &content));
                }
                content.push(self.node_filled(&child, &Attrs::new(), Vec::new())?);
            }
        }
        self.node(name, attrs, content, Vec::new())
    }

    /// Create a text node. Empty text is rejected.
    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Result<Node, SchemaError> {
        let text = text.into();
        if text.is_empty() {
            return Err(SchemaError::InvalidText);
        }
        let node_type = self.require_node(TEXT_NODE)?;
        Ok(Node::new_unchecked(
            node_type.clone(),
            Attrs::new(),
            Vec::new(),
            Some(text),
            Mark::normalize_set(marks),
        ))
    }

    /// Create a mark with completed attributes.
    pub fn mark(&self, name: &str, attrs: &Attrs) -> Result<Mark, SchemaError> {
        let mark_type = self
            .mark_type(name)
            .ok_or_else(|| SchemaError::UnknownMarkType(name.into()))?;
        let attrs = compute_attrs(mark_type.name(), &mark_type.spec.attrs, attrs)?;
        Ok(Mark::new_unchecked(mark_type.clone(), attrs))
    }

    /// A document holding a single empty default block.
    pub fn empty_doc(&self) -> Result<Node, SchemaError> {
        let block = self.node_filled(self.default_block().name(), &Attrs::new(), Vec::new())?;
        self.node(TOP_NODE, &Attrs::new(), vec![block], Vec::new())
    }

    /// Rebuild `node` with new children, keeping type, attrs and marks.
    pub fn with_content(&self, node: &Node, content: Vec<Node>) -> Result<Node, SchemaError> {
        check_content(node.node_type(), &content)?;
        Ok(Node::new_unchecked(
            node.node_type().clone(),
            node.attrs().clone(),
            content,
            None,
            node.marks().to_vec(),
        ))
    }
}

/// Fill defaults for missing attributes and drop undeclared ones.
pub fn compute_attrs(owner: &str, specs: &AttrSpecs, given: &Attrs) -> Result<Attrs, SchemaError> {
    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = match given.get(name) {
            Some(value) => value.clone(),
            None => spec.default.clone().ok_or_else(|| SchemaError::MissingAttr {
                owner: owner.into(),
                attr: name.clone(),
            })?,
        };
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

fn check_content(node_type: &NodeType, content: &[Node]) -> Result<(), SchemaError> {
    let valid = node_type
        .content_expr()
        .match_sequence(content.iter().map(|n| n.type_name().as_str()))
        .is_some_and(|state| state.valid_end(node_type.content_expr()));
    if !valid {
        return Err(invalid_content(node_type, content));
    }
    if !node_type.marks_allowed() && content.iter().any(|c| !c.marks().is_empty()) {
        return Err(SchemaError::MarksNotAllowed(node_type.name().clone()));
    }
    Ok(())
}

fn invalid_content(node_type: &NodeType, content: &[Node]) -> SchemaError {
    SchemaError::InvalidContent {
        node: node_type.name().clone(),
        children: content
            .iter()
            .map(|n| n.type_name().as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}
