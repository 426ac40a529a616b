//! Transaction observer plugins.
//!
//! A plugin derives auxiliary state from the document and keeps it current as
//! transactions are applied. [`EditorState::apply`](crate::EditorState::apply)
//! calls every plugin's `apply` exactly once per transaction, in plugin
//! order, and stores the result as the plugin's next state.
//!
//! Implement [`StatePlugin`] for a typed state; the blanket impl adapts it to
//! the object-safe [`Plugin`] trait the editor stores.

use std::any::Any;
use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::state::DocState;
use crate::transaction::Transaction;

/// Type-erased plugin state.
pub type PluginState = Arc<dyn Any + Send + Sync>;

/// Ordering tier for plugins. Plugins are stable-sorted by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Highest,
    High,
    #[default]
    Normal,
    Low,
    Lowest,
}

pub trait Plugin: Send + Sync {
    /// Unique key, used to look the state up.
    fn key(&self) -> &str;

    fn init(&self, state: &DocState) -> PluginState;

    /// Next state. Must be a pure function of its inputs.
    fn apply(
        &self,
        tr: &Transaction,
        value: &PluginState,
        old: &DocState,
        new: &DocState,
    ) -> PluginState;

    fn decorations<'a>(&self, _value: &'a PluginState) -> Option<&'a DecorationSet> {
        None
    }
}

/// A plugin with a concrete state type.
pub trait StatePlugin: Send + Sync + 'static {
    type State: Send + Sync + 'static;

    fn key(&self) -> &str;

    fn init(&self, state: &DocState) -> Self::State;

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Self::State,
        old: &DocState,
        new: &DocState,
    ) -> Self::State;

    fn decorations<'a>(&self, _state: &'a Self::State) -> Option<&'a DecorationSet> {
        None
    }
}

impl<P: StatePlugin> Plugin for P {
    fn key(&self) -> &str {
        StatePlugin::key(self)
    }

    fn init(&self, state: &DocState) -> PluginState {
        Arc::new(StatePlugin::init(self, state))
    }

    fn apply(
        &self,
        tr: &Transaction,
        value: &PluginState,
        old: &DocState,
        new: &DocState,
    ) -> PluginState {
        match value.downcast_ref::<P::State>() {
            Some(prev) => Arc::new(StatePlugin::apply(self, tr, prev, old, new)),
            None => {
                tracing::warn!(
                    target: "tapestry::plugin",
                    key = StatePlugin::key(self),
                    "plugin state has unexpected type, reinitialising"
                );
                Arc::new(StatePlugin::init(self, new))
            }
        }
    }

    fn decorations<'a>(&self, value: &'a PluginState) -> Option<&'a DecorationSet> {
        value
            .downcast_ref::<P::State>()
            .and_then(|state| StatePlugin::decorations(self, state))
    }
}
