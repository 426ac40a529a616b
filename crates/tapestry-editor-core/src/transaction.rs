//! Transactions: atomic document mutations with position mapping.

use std::collections::BTreeMap;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::TransformError;
use crate::mapping::{Mapping, StepMap};
use crate::model::Node;
use crate::schema::{AttrValue, Attrs, Schema};
use crate::selection::Selection;
use crate::state::EditorState;
use crate::transform;

/// Metadata key set on full-document replace transactions.
pub const META_REPLACE: &str = "replace";

/// A document change under construction, built against one state version.
#[derive(Debug, Clone)]
pub struct Transaction {
    base_version: u64,
    schema: Arc<Schema>,
    before: Node,
    doc: Node,
    mapping: Mapping,
    selection: Selection,
    selection_set: bool,
    meta: BTreeMap<SmolStr, AttrValue>,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Self {
            base_version: state.version(),
            schema: state.schema().clone(),
            before: state.doc().clone(),
            doc: state.doc().clone(),
            mapping: Mapping::new(),
            selection: state.selection(),
            selection_set: false,
            meta: BTreeMap::new(),
        }
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn before(&self) -> &Node {
        &self.before
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// True iff at least one step was recorded.
    pub fn doc_changed(&self) -> bool {
        !self.mapping.is_empty()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selection_set(&self) -> bool {
        self.selection_set
    }

    fn step(&mut self, doc: Node, map: StepMap) {
        self.selection = self.selection.map_step(&map);
        self.mapping.push(map);
        self.doc = doc;
    }

    /// Replace the whole document.
    pub fn replace_doc(&mut self, doc: Node) -> &mut Self {
        let map = StepMap::replace_all(self.doc.content_size(), doc.content_size());
        self.step(doc, map);
        self.meta.insert(META_REPLACE.into(), true.into());
        self
    }

    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<&mut Self, TransformError> {
        let (doc, map) = transform::insert_text(&self.schema, &self.doc, pos, text)?;
        if !map.ranges().is_empty() {
            self.step(doc, map);
        }
        Ok(self)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        let (doc, map) = transform::delete_text(&self.schema, &self.doc, from, to)?;
        if !map.ranges().is_empty() {
            self.step(doc, map);
        }
        Ok(self)
    }

    /// Insert top-level blocks before the child at `index`.
    pub fn insert_blocks(&mut self, index: usize, blocks: Vec<Node>) -> Result<&mut Self, TransformError> {
        let (doc, map) = transform::insert_blocks(&self.schema, &self.doc, index, blocks)?;
        if !map.ranges().is_empty() {
            self.step(doc, map);
        }
        Ok(self)
    }

    /// Replace the selection (collapsed only) with `text`.
    pub fn insert_text_at_selection(&mut self, text: &str) -> Result<&mut Self, TransformError> {
        let pos = self.selection.head;
        self.insert_text(pos, text)
    }

    pub fn set_block_type(
        &mut self,
        pos: usize,
        type_name: &str,
        attrs: &Attrs,
    ) -> Result<&mut Self, TransformError> {
        let (doc, map) = transform::set_block_type(&self.schema, &self.doc, pos, type_name, attrs)?;
        self.step(doc, map);
        Ok(self)
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self.selection_set = true;
        self
    }

    pub fn set_meta(&mut self, key: impl Into<SmolStr>, value: impl Into<AttrValue>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&AttrValue> {
        self.meta.get(key)
    }
}
