//! The extension contract.
//!
//! An extension is registered once per editor. Its [`Extension::register`]
//! fills a [`Contribution`] through an [`ExtensionBuilder`]; the registry then
//! merges every contribution in order (see [`crate::registry::compose`]).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::action::{ActionFn, InputRule, KeyCombo};
use crate::error::{ComposeError, SerializeError};
use crate::markdown::{MarkSerializer, MarkdownWriter, NodeSerializer, ParseRule};
use crate::model::{Mark, Node};
use crate::plugin::{Plugin, Priority};
use crate::schema::{MarkSpec, NodeSpec, Schema};
use crate::state::EditorState;
use crate::transaction::Transaction;
use crate::view::{MarkView, MarkViewFactory, NodeView, NodeViewFactory};

/// What happens when an extension defines a key an earlier one already did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// A duplicate is a composition error.
    #[default]
    Reject,
    /// This extension's definition replaces the earlier one in place.
    Override,
}

pub trait Extension: Send + Sync {
    /// Unique within one editor. Used in conflict reports.
    fn name(&self) -> &str;

    fn conflict_policy(&self) -> ConflictPolicy {
        ConflictPolicy::Reject
    }

    fn register(&self, builder: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError>;
}

/// Values extensions publish for each other during one composition pass,
/// keyed by type.
#[derive(Default)]
pub struct ExtensionContext {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ExtensionContext {
    /// Publish `value`, replacing any earlier value of the same type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Passed to plugin and action factories once the schema exists.
pub struct FactoryContext<'a> {
    pub schema: &'a Arc<Schema>,
    pub context: &'a ExtensionContext,
}

pub type PluginFactory = Arc<dyn Fn(&FactoryContext<'_>) -> Arc<dyn Plugin> + Send + Sync>;
pub type ActionFactory = Arc<dyn Fn(&FactoryContext<'_>) -> ActionFn + Send + Sync>;

/// Everything one extension contributed, in declaration order.
#[derive(Default)]
pub struct Contribution {
    pub nodes: Vec<NodeSpec>,
    pub marks: Vec<MarkSpec>,
    pub parse_rules: Vec<(SmolStr, ParseRule)>,
    pub node_serializers: Vec<(SmolStr, NodeSerializer)>,
    pub mark_serializers: Vec<(SmolStr, MarkSerializer)>,
    pub plugins: Vec<(Priority, PluginFactory)>,
    pub actions: Vec<(SmolStr, ActionFactory)>,
    pub key_bindings: Vec<(KeyCombo, SmolStr)>,
    pub input_rules: Vec<InputRule>,
    pub node_views: Vec<(SmolStr, NodeViewFactory)>,
    pub mark_views: Vec<(SmolStr, MarkViewFactory)>,
}

impl Contribution {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.marks.is_empty()
            && self.parse_rules.is_empty()
            && self.node_serializers.is_empty()
            && self.mark_serializers.is_empty()
            && self.plugins.is_empty()
            && self.actions.is_empty()
            && self.key_bindings.is_empty()
            && self.input_rules.is_empty()
            && self.node_views.is_empty()
            && self.mark_views.is_empty()
    }
}

/// The handle an extension registers through.
pub struct ExtensionBuilder<'a> {
    extension: SmolStr,
    context: &'a mut ExtensionContext,
    contribution: Contribution,
}

impl<'a> ExtensionBuilder<'a> {
    pub(crate) fn new(extension: SmolStr, context: &'a mut ExtensionContext) -> Self {
        Self {
            extension,
            context,
            contribution: Contribution::default(),
        }
    }

    pub(crate) fn finish(self) -> Contribution {
        self.contribution
    }

    pub fn extension_name(&self) -> &SmolStr {
        &self.extension
    }

    pub fn node(&mut self, spec: NodeSpec) -> &mut Self {
        self.contribution.nodes.push(spec);
        self
    }

    pub fn mark(&mut self, spec: MarkSpec) -> &mut Self {
        self.contribution.marks.push(spec);
        self
    }

    pub fn parse_rule(&mut self, token: impl Into<SmolStr>, rule: ParseRule) -> &mut Self {
        self.contribution.parse_rules.push((token.into(), rule));
        self
    }

    pub fn node_serializer<F>(&mut self, node: impl Into<SmolStr>, f: F) -> &mut Self
    where
        F: Fn(&mut MarkdownWriter<'_>, &Node, &Node, usize) -> Result<(), SerializeError>
            + Send
            + Sync
            + 'static,
    {
        self.contribution
            .node_serializers
            .push((node.into(), Arc::new(f)));
        self
    }

    pub fn mark_serializer(&mut self, mark: impl Into<SmolStr>, serializer: MarkSerializer) -> &mut Self {
        self.contribution
            .mark_serializers
            .push((mark.into(), serializer));
        self
    }

    pub fn plugin<F>(&mut self, priority: Priority, factory: F) -> &mut Self
    where
        F: Fn(&FactoryContext<'_>) -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.contribution.plugins.push((priority, Arc::new(factory)));
        self
    }

    /// Register a command that only needs the editor state.
    pub fn action<F>(&mut self, name: impl Into<SmolStr>, run: F) -> &mut Self
    where
        F: Fn(&EditorState) -> Option<Transaction> + Send + Sync + 'static,
    {
        let run: ActionFn = Arc::new(run);
        self.action_factory(name, move |_| run.clone())
    }

    /// Register a command built from the composed schema and context.
    pub fn action_factory<F>(&mut self, name: impl Into<SmolStr>, factory: F) -> &mut Self
    where
        F: Fn(&FactoryContext<'_>) -> ActionFn + Send + Sync + 'static,
    {
        self.contribution
            .actions
            .push((name.into(), Arc::new(factory)));
        self
    }

    /// Bind a chord such as `Mod-Alt-1` to an action name.
    pub fn key_binding(&mut self, chord: &str, action: impl Into<SmolStr>) -> Result<&mut Self, ComposeError> {
        let combo: KeyCombo = chord.parse().map_err(|err| ComposeError::Extension {
            extension: self.extension.clone(),
            message: format!("{err}"),
        })?;
        self.contribution.key_bindings.push((combo, action.into()));
        Ok(self)
    }

    pub fn input_rule(&mut self, rule: InputRule) -> &mut Self {
        self.contribution.input_rules.push(rule);
        self
    }

    pub fn node_view<F>(&mut self, node: impl Into<SmolStr>, factory: F) -> &mut Self
    where
        F: Fn(&Node) -> Box<dyn NodeView> + Send + Sync + 'static,
    {
        self.contribution
            .node_views
            .push((node.into(), Arc::new(factory)));
        self
    }

    pub fn mark_view<F>(&mut self, mark: impl Into<SmolStr>, factory: F) -> &mut Self
    where
        F: Fn(&Mark, bool) -> Box<dyn MarkView> + Send + Sync + 'static,
    {
        self.contribution
            .mark_views
            .push((mark.into(), Arc::new(factory)));
        self
    }

    /// Publish a value for extensions registered later.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.context.provide(value);
        self
    }

    /// Read a value an earlier extension published.
    pub fn context<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.get::<T>()
    }
}
