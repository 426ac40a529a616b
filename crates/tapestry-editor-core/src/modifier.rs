//! Call-site overlays applied to a finished composition.
//!
//! A [`DynamicModifier`] patches resolved handlers by key. It can wrap,
//! replace or veto a handler, but it never adds a key or moves one: a patch
//! whose key the composition did not produce is skipped.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::markdown::{MarkSerializer, NodeSerializer, TokenHandler};
use crate::schema::AttrSpecs;

/// Receives the base value and returns its replacement.
pub type Patch<V> = Arc<dyn Fn(V) -> V + Send + Sync>;

#[derive(Clone, Default)]
pub struct DynamicModifier {
    schema_attrs: IndexMap<SmolStr, Patch<AttrSpecs>>,
    parse_rules: IndexMap<SmolStr, Patch<TokenHandler>>,
    node_serializers: IndexMap<SmolStr, Patch<NodeSerializer>>,
    mark_serializers: IndexMap<SmolStr, Patch<MarkSerializer>>,
}

impl DynamicModifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch the attribute specs of a node or mark type before the schema
    /// is compiled.
    pub fn schema_attrs<F>(mut self, type_name: impl Into<SmolStr>, patch: F) -> Self
    where
        F: Fn(AttrSpecs) -> AttrSpecs + Send + Sync + 'static,
    {
        self.schema_attrs.insert(type_name.into(), Arc::new(patch));
        self
    }

    /// Patch the handler for a token name.
    pub fn parse_rule<F>(mut self, token: impl Into<SmolStr>, patch: F) -> Self
    where
        F: Fn(TokenHandler) -> TokenHandler + Send + Sync + 'static,
    {
        self.parse_rules.insert(token.into(), Arc::new(patch));
        self
    }

    pub fn node_serializer<F>(mut self, node: impl Into<SmolStr>, patch: F) -> Self
    where
        F: Fn(NodeSerializer) -> NodeSerializer + Send + Sync + 'static,
    {
        self.node_serializers.insert(node.into(), Arc::new(patch));
        self
    }

    pub fn mark_serializer<F>(mut self, mark: impl Into<SmolStr>, patch: F) -> Self
    where
        F: Fn(MarkSerializer) -> MarkSerializer + Send + Sync + 'static,
    {
        self.mark_serializers.insert(mark.into(), Arc::new(patch));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.schema_attrs.is_empty()
            && self.parse_rules.is_empty()
            && self.node_serializers.is_empty()
            && self.mark_serializers.is_empty()
    }

    pub(crate) fn apply_schema_attrs(&self, resolved: &mut IndexMap<SmolStr, AttrSpecs>) {
        apply_patches("schema attrs", resolved, &self.schema_attrs);
    }

    pub(crate) fn apply_parse_rules(&self, resolved: &mut IndexMap<SmolStr, TokenHandler>) {
        apply_patches("parse rule", resolved, &self.parse_rules);
    }

    pub(crate) fn apply_node_serializers(&self, resolved: &mut IndexMap<SmolStr, NodeSerializer>) {
        apply_patches("node serializer", resolved, &self.node_serializers);
    }

    pub(crate) fn apply_mark_serializers(&self, resolved: &mut IndexMap<SmolStr, MarkSerializer>) {
        apply_patches("mark serializer", resolved, &self.mark_serializers);
    }
}

/// Substitute each patched key in place. Map order is untouched.
fn apply_patches<V: Clone>(
    family: &'static str,
    resolved: &mut IndexMap<SmolStr, V>,
    patches: &IndexMap<SmolStr, Patch<V>>,
) {
    for (key, patch) in patches {
        match resolved.get_mut(key) {
            Some(slot) => {
                *slot = patch(slot.clone());
                tracing::trace!(target: "tapestry::modifier", family, key = %key, "handler patched");
            }
            None => {
                tracing::debug!(
                    target: "tapestry::modifier",
                    family,
                    key = %key,
                    "modifier key has no handler, skipped"
                );
            }
        }
    }
}

impl fmt::Debug for DynamicModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModifier")
            .field("schema_attrs", &self.schema_attrs.keys().collect::<Vec<_>>())
            .field("parse_rules", &self.parse_rules.keys().collect::<Vec<_>>())
            .field("node_serializers", &self.node_serializers.keys().collect::<Vec<_>>())
            .field("mark_serializers", &self.mark_serializers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttrSpec;

    #[test]
    fn test_patch_keeps_order_and_skips_missing() {
        let mut resolved: IndexMap<SmolStr, AttrSpecs> = IndexMap::new();
        resolved.insert("paragraph".into(), AttrSpecs::new());
        resolved.insert("heading".into(), AttrSpecs::new());

        let modifier = DynamicModifier::new()
            .schema_attrs("heading", |mut attrs| {
                attrs.insert("id".into(), AttrSpec::optional());
                attrs
            })
            .schema_attrs("missing", |attrs| attrs);
        modifier.apply_schema_attrs(&mut resolved);

        let keys: Vec<_> = resolved.keys().map(SmolStr::as_str).collect();
        assert_eq!(keys, ["paragraph", "heading"]);
        assert!(resolved["heading"].contains_key("id"));
        assert!(resolved["paragraph"].is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(DynamicModifier::new().is_empty());
        assert!(!DynamicModifier::new().parse_rule("em", |h| h).is_empty());
    }
}
