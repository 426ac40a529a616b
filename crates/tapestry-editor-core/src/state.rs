//! Editor state: document, selection and plugin states, advanced one
//! transaction at a time.

use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::error::TransactionError;
use crate::model::Node;
use crate::plugin::{Plugin, PluginState};
use crate::schema::Schema;
use crate::selection::Selection;
use crate::transaction::Transaction;

/// The document/selection pair plugins observe.
#[derive(Debug, Clone, PartialEq)]
pub struct DocState {
    pub doc: Node,
    pub selection: Selection,
}

/// An immutable editor state. Applying a transaction yields the next one.
#[derive(Clone)]
pub struct EditorState {
    doc_state: DocState,
    schema: Arc<Schema>,
    plugins: Arc<[Arc<dyn Plugin>]>,
    plugin_states: Vec<PluginState>,
    version: u64,
}

impl EditorState {
    /// Initial state. The selection defaults to the start of the document.
    pub fn create(
        schema: Arc<Schema>,
        doc: Node,
        selection: Option<Selection>,
        plugins: Arc<[Arc<dyn Plugin>]>,
    ) -> Self {
        let selection = selection
            .map(|s| s.clamp(&doc))
            .unwrap_or_else(|| Selection::at_start(&doc));
        let doc_state = DocState { doc, selection };
        let plugin_states = plugins.iter().map(|p| p.init(&doc_state)).collect();
        Self {
            doc_state,
            schema,
            plugins,
            plugin_states,
            version: 0,
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc_state.doc
    }

    pub fn selection(&self) -> Selection {
        self.doc_state.selection
    }

    pub fn doc_state(&self) -> &DocState {
        &self.doc_state
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Number of transactions applied since creation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Start a transaction against this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    /// Apply a transaction built against this exact state.
    pub fn apply(&self, tr: &Transaction) -> Result<EditorState, TransactionError> {
        if tr.base_version() != self.version {
            return Err(TransactionError::Stale {
                built: tr.base_version(),
                current: self.version,
            });
        }

        let doc = tr.doc().clone();
        let selection = tr.selection().clamp(&doc);
        let next = DocState { doc, selection };

        let plugin_states = self
            .plugins
            .iter()
            .zip(&self.plugin_states)
            .map(|(plugin, value)| plugin.apply(tr, value, &self.doc_state, &next))
            .collect();

        tracing::trace!(
            target: "tapestry::state",
            version = self.version + 1,
            doc_changed = tr.doc_changed(),
            "transaction applied"
        );

        Ok(EditorState {
            doc_state: next,
            schema: self.schema.clone(),
            plugins: self.plugins.clone(),
            plugin_states,
            version: self.version + 1,
        })
    }

    pub fn plugin_state(&self, key: &str) -> Option<&PluginState> {
        self.plugins
            .iter()
            .position(|p| p.key() == key)
            .map(|i| &self.plugin_states[i])
    }

    /// Typed view of a plugin's state.
    pub fn plugin_state_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.plugin_state(key).and_then(|s| s.downcast_ref::<T>())
    }

    /// Decoration sets of every plugin that provides one, keyed by plugin.
    pub fn decorations(&self) -> impl Iterator<Item = (&str, &DecorationSet)> {
        self.plugins
            .iter()
            .zip(&self.plugin_states)
            .filter_map(|(plugin, value)| plugin.decorations(value).map(|set| (plugin.key(), set)))
    }
}

impl std::fmt::Debug for EditorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorState")
            .field("doc", &self.doc_state.doc)
            .field("selection", &self.doc_state.selection)
            .field("plugins", &self.plugins.iter().map(|p| p.key()).collect::<Vec<_>>())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeSpec;

    struct Counter;

    impl crate::plugin::StatePlugin for Counter {
        type State = Vec<bool>;

        fn key(&self) -> &str {
            "counter"
        }

        fn init(&self, _state: &DocState) -> Self::State {
            Vec::new()
        }

        fn apply(
            &self,
            tr: &Transaction,
            prev: &Self::State,
            _old: &DocState,
            _new: &DocState,
        ) -> Self::State {
            let mut next = prev.clone();
            next.push(tr.doc_changed());
            next
        }
    }

    fn state() -> EditorState {
        let schema = Arc::new(
            Schema::new(
                [
                    NodeSpec::new("doc").content("block+"),
                    NodeSpec::new("paragraph").content("inline*").group("block"),
                    NodeSpec::new("text").group("inline"),
                ],
                [],
            )
            .unwrap(),
        );
        let doc = schema.empty_doc().unwrap();
        let plugins: Arc<[Arc<dyn Plugin>]> = Arc::new([Arc::new(Counter) as Arc<dyn Plugin>]);
        EditorState::create(schema, doc, None, plugins)
    }

    #[test]
    fn test_apply_calls_plugins_once_in_order() {
        let s0 = state();
        assert_eq!(s0.selection(), Selection::collapsed(1));
        let mut tr = s0.tr();
        tr.insert_text(1, "hi").unwrap();
        let s1 = s0.apply(&tr).unwrap();
        let s2 = s1.apply(&s1.tr()).unwrap();
        assert_eq!(s2.plugin_state_as::<Vec<bool>>("counter"), Some(&vec![true, false]));
        assert_eq!(s1.selection(), Selection::collapsed(3));
        assert_eq!(s2.version(), 2);
    }

    #[test]
    fn test_stale_transaction_rejected() {
        let s0 = state();
        let stale = s0.tr();
        let s1 = s0.apply(&s0.tr()).unwrap();
        assert_eq!(
            s1.apply(&stale).unwrap_err(),
            TransactionError::Stale {
                built: 0,
                current: 1
            }
        );
    }
}
