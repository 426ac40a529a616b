//! Extension composition.
//!
//! [`compose`] walks extensions in order, merges their contributions into
//! keyed tables, applies dynamic modifiers and builds the schema, parser,
//! serializer and plugin list every editor instance shares.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use smol_str::SmolStr;
use tapestry_common::TimingGuard;

use crate::action::{Action, ActionRegistry, InputRule, KeyCombo, Keymap};
use crate::error::ComposeError;
use crate::extension::{
    ActionFactory, ConflictPolicy, Extension, ExtensionBuilder, ExtensionContext, FactoryContext,
    PluginFactory,
};
use crate::markdown::{
    EscapeConfig, MarkSerializer, MarkdownParser, MarkdownSerializer, NodeSerializer, ParseRule,
    ParserOptions, TokenHandler, TreeTransformer, builtin_rules,
};
use crate::modifier::DynamicModifier;
use crate::plugin::{Plugin, Priority};
use crate::schema::{AttrSpecs, MarkSpec, NodeSpec, Schema};
use crate::view::{MarkViewFactory, NodeViewFactory, ViewRegistry};

/// Owner recorded for entries seeded before any extension runs.
const BUILTIN: &str = "builtin";

/// Settings that shape the composed parser and serializer.
#[derive(Clone, Default)]
pub struct ComposeOptions {
    pub parser: ParserOptions,
    pub escape: EscapeConfig,
    pub transformers: Vec<TreeTransformer>,
}

/// Everything composed from one extension list.
#[derive(Clone)]
pub struct Composition {
    pub schema: Arc<Schema>,
    pub parser: MarkdownParser,
    pub serializer: MarkdownSerializer,
    /// Stable-sorted by priority, then declaration order.
    pub plugins: Arc<[Arc<dyn Plugin>]>,
    pub views: ViewRegistry,
    pub actions: ActionRegistry,
    pub keymap: Keymap,
    pub input_rules: Vec<InputRule>,
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("schema", &self.schema)
            .field("parser", &self.parser)
            .field("serializer", &self.serializer)
            .field("plugins", &self.plugins.iter().map(|p| p.key()).collect::<Vec<_>>())
            .field("views", &self.views)
            .field("actions", &self.actions)
            .field("keymap", &self.keymap)
            .field("input_rules", &self.input_rules)
            .finish()
    }
}

struct Slot<V> {
    owner: SmolStr,
    value: V,
    builtin: bool,
}

/// One keyed capability table. Insertion order is the composition order.
struct Table<K, V> {
    kind: &'static str,
    entries: IndexMap<K, Slot<V>>,
}

impl<K: Hash + Eq + fmt::Display, V> Table<K, V> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    fn seed(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            Slot {
                owner: SmolStr::new_static(BUILTIN),
                value,
                builtin: true,
            },
        );
    }

    fn insert(&mut self, key: K, value: V, owner: &SmolStr, policy: ConflictPolicy) -> Result<(), ComposeError> {
        match self.entries.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(Slot {
                    owner: owner.clone(),
                    value,
                    builtin: false,
                });
            }
            Entry::Occupied(mut entry) => {
                if !entry.get().builtin && policy != ConflictPolicy::Override {
                    return Err(ComposeError::Conflict {
                        kind: self.kind,
                        key: SmolStr::new(entry.key().to_string()),
                        first: entry.get().owner.clone(),
                        second: owner.clone(),
                    });
                }
                tracing::debug!(
                    target: "tapestry::compose",
                    kind = self.kind,
                    key = %entry.key(),
                    replaced = %entry.get().owner,
                    by = %owner,
                    "definition replaced"
                );
                // Same key, same slot: the original position is kept.
                *entry.get_mut() = Slot {
                    owner: owner.clone(),
                    value,
                    builtin: false,
                };
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn map_values<W>(self, mut f: impl FnMut(V) -> W) -> IndexMap<K, W> {
        self.entries
            .into_iter()
            .map(|(key, slot)| (key, f(slot.value)))
            .collect()
    }
}

enum TypeDef {
    Node(NodeSpec),
    Mark(MarkSpec),
}

impl TypeDef {
    fn attrs(&self) -> &AttrSpecs {
        match self {
            TypeDef::Node(spec) => &spec.attrs,
            TypeDef::Mark(spec) => &spec.attrs,
        }
    }
}

/// Per-extension registration state carried through [`compose`].
struct Merge {
    types: Table<SmolStr, TypeDef>,
    parse_rules: Table<SmolStr, ParseRule>,
    node_serializers: Table<SmolStr, NodeSerializer>,
    mark_serializers: Table<SmolStr, MarkSerializer>,
    plugins: Vec<(Priority, SmolStr, ConflictPolicy, PluginFactory)>,
    actions: Table<SmolStr, ActionFactory>,
    key_bindings: Table<KeyCombo, SmolStr>,
    input_rules: Table<SmolStr, InputRule>,
    node_views: Table<SmolStr, NodeViewFactory>,
    mark_views: Table<SmolStr, MarkViewFactory>,
}

impl Merge {
    fn new() -> Self {
        let mut parse_rules = Table::new("parse rule");
        for (token, rule) in builtin_rules() {
            parse_rules.seed(token, rule);
        }
        Self {
            types: Table::new("type"),
            parse_rules,
            node_serializers: Table::new("node serializer"),
            mark_serializers: Table::new("mark serializer"),
            plugins: Vec::new(),
            actions: Table::new("action"),
            key_bindings: Table::new("key binding"),
            input_rules: Table::new("input rule"),
            node_views: Table::new("node view"),
            mark_views: Table::new("mark view"),
        }
    }

    fn absorb(&mut self, extension: &dyn Extension, context: &mut ExtensionContext) -> Result<(), ComposeError> {
        let owner = SmolStr::new(extension.name());
        let policy = extension.conflict_policy();
        let mut builder = ExtensionBuilder::new(owner.clone(), context);
        extension.register(&mut builder)?;
        let contribution = builder.finish();

        for spec in contribution.nodes {
            self.types
                .insert(spec.name.clone(), TypeDef::Node(spec), &owner, policy)?;
        }
        for spec in contribution.marks {
            self.types
                .insert(spec.name.clone(), TypeDef::Mark(spec), &owner, policy)?;
        }
        for (token, rule) in contribution.parse_rules {
            self.parse_rules.insert(token, rule, &owner, policy)?;
        }
        for (node, serializer) in contribution.node_serializers {
            self.node_serializers.insert(node, serializer, &owner, policy)?;
        }
        for (mark, serializer) in contribution.mark_serializers {
            self.mark_serializers.insert(mark, serializer, &owner, policy)?;
        }
        for (priority, factory) in contribution.plugins {
            self.plugins.push((priority, owner.clone(), policy, factory));
        }
        for (name, factory) in contribution.actions {
            self.actions.insert(name, factory, &owner, policy)?;
        }
        for (combo, action) in contribution.key_bindings {
            self.key_bindings.insert(combo, action, &owner, policy)?;
        }
        for rule in contribution.input_rules {
            self.input_rules
                .insert(rule.name().clone(), rule, &owner, policy)?;
        }
        for (node, factory) in contribution.node_views {
            self.node_views.insert(node, factory, &owner, policy)?;
        }
        for (mark, factory) in contribution.mark_views {
            self.mark_views.insert(mark, factory, &owner, policy)?;
        }
        Ok(())
    }

    /// Apply schema modifiers and compile.
    fn build_schema(&mut self, modifiers: &[DynamicModifier]) -> Result<Schema, ComposeError> {
        let mut attrs: IndexMap<SmolStr, AttrSpecs> = self
            .types
            .entries
            .iter()
            .map(|(name, slot)| (name.clone(), slot.value.attrs().clone()))
            .collect();
        for modifier in modifiers {
            modifier.apply_schema_attrs(&mut attrs);
        }

        let mut nodes = Vec::new();
        let mut marks = Vec::new();
        for (name, slot) in &self.types.entries {
            let patched = attrs.get(name).cloned().unwrap_or_default();
            match &slot.value {
                TypeDef::Node(spec) => nodes.push(NodeSpec {
                    attrs: patched,
                    ..spec.clone()
                }),
                TypeDef::Mark(spec) => marks.push(MarkSpec {
                    attrs: patched,
                    ..spec.clone()
                }),
            }
        }
        Ok(Schema::new(nodes, marks)?)
    }

    /// Every rule, serializer, binding and view must point at something
    /// that exists.
    fn check_targets(&self, schema: &Schema) -> Result<(), ComposeError> {
        let unknown = |kind: &'static str, key: &SmolStr, owner: &SmolStr, target: &SmolStr| ComposeError::UnknownTarget {
            kind,
            key: key.clone(),
            extension: owner.clone(),
            target: target.clone(),
        };

        for (token, slot) in &self.parse_rules.entries {
            if let Some(target) = slot.value.target() {
                let known = if slot.value.targets_mark() {
                    schema.mark_type(target).is_some()
                } else {
                    schema.node_type(target).is_some()
                };
                if !known {
                    return Err(unknown("parse rule", token, &slot.owner, target));
                }
            }
        }
        for (node, slot) in &self.node_serializers.entries {
            if schema.node_type(node).is_none() {
                return Err(unknown("node serializer", node, &slot.owner, node));
            }
        }
        for (mark, slot) in &self.mark_serializers.entries {
            if schema.mark_type(mark).is_none() {
                return Err(unknown("mark serializer", mark, &slot.owner, mark));
            }
        }
        for (combo, slot) in &self.key_bindings.entries {
            if !self.actions.entries.contains_key(&slot.value) {
                let key = SmolStr::new(combo.to_string());
                return Err(unknown("key binding", &key, &slot.owner, &slot.value));
            }
        }
        for (node, slot) in &self.node_views.entries {
            if schema.node_type(node).is_none() {
                return Err(unknown("node view", node, &slot.owner, node));
            }
        }
        for (mark, slot) in &self.mark_views.entries {
            if schema.mark_type(mark).is_none() {
                return Err(unknown("mark view", mark, &slot.owner, mark));
            }
        }
        Ok(())
    }
}

/// Compose `extensions`, in order, into one editor vocabulary.
///
/// `modifiers` are applied after every extension has registered, in order.
/// Their keys never add entries; a key with nothing to patch is skipped.
pub fn compose(
    extensions: &[Arc<dyn Extension>],
    modifiers: &[DynamicModifier],
    options: ComposeOptions,
) -> Result<Composition, ComposeError> {
    let _timing = TimingGuard::new("compose");
    let mut context = ExtensionContext::default();
    let mut merge = Merge::new();
    let mut seen = HashSet::new();

    for extension in extensions {
        if !seen.insert(SmolStr::new(extension.name())) {
            return Err(ComposeError::DuplicateExtension(extension.name().into()));
        }
        merge.absorb(extension.as_ref(), &mut context)?;
        tracing::trace!(target: "tapestry::compose", extension = extension.name(), "extension registered");
    }

    let schema = Arc::new(merge.build_schema(modifiers)?);
    merge.check_targets(&schema)?;

    let cx = FactoryContext {
        schema: &schema,
        context: &context,
    };

    let mut plugin_table: Table<SmolStr, (Priority, Arc<dyn Plugin>)> = Table::new("plugin");
    for (priority, owner, policy, factory) in &merge.plugins {
        let plugin = factory(&cx);
        plugin_table.insert(SmolStr::new(plugin.key()), (*priority, plugin), owner, *policy)?;
    }
    let mut plugins: Vec<(Priority, Arc<dyn Plugin>)> =
        plugin_table.map_values(|v| v).into_values().collect();
    plugins.sort_by_key(|(priority, _)| *priority);
    let plugins: Arc<[Arc<dyn Plugin>]> = plugins.into_iter().map(|(_, plugin)| plugin).collect();

    let actions = ActionRegistry::from_map(
        merge
            .actions
            .entries
            .iter()
            .map(|(name, slot)| {
                let run = (slot.value)(&cx);
                (name.clone(), Action::new(name.clone(), move |state| run(state)))
            })
            .collect(),
    );

    let Merge {
        parse_rules,
        node_serializers,
        mark_serializers,
        key_bindings,
        input_rules,
        node_views,
        mark_views,
        types,
        ..
    } = merge;

    let mut handlers: IndexMap<SmolStr, TokenHandler> = parse_rules.map_values(ParseRule::into_handler);
    let mut nodes = node_serializers.map_values(|s| s);
    let mut marks = mark_serializers.map_values(|s| s);
    for modifier in modifiers {
        modifier.apply_parse_rules(&mut handlers);
        modifier.apply_node_serializers(&mut nodes);
        modifier.apply_mark_serializers(&mut marks);
    }

    let parser = MarkdownParser::new(schema.clone(), options.parser, handlers, options.transformers)?;
    let serializer = MarkdownSerializer::new(nodes, marks, options.escape);
    let views = ViewRegistry::new(node_views.map_values(|f| f), mark_views.map_values(|f| f));
    let keymap = Keymap::from_map(key_bindings.map_values(|a| a));
    let input_rules: Vec<InputRule> = input_rules.map_values(|r| r).into_values().collect();

    tracing::info!(
        target: "tapestry::compose",
        extensions = extensions.len(),
        types = types.len(),
        plugins = plugins.len(),
        actions = actions.len(),
        modifiers = modifiers.len(),
        "editor composed"
    );

    Ok(Composition {
        schema,
        parser,
        serializer,
        plugins,
        views,
        actions,
        keymap,
        input_rules,
    })
}
