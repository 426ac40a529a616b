//! The boundary between the core and whatever renders the document.

use std::sync::Arc;

use crate::error::TransactionError;
use crate::model::Node;
use crate::plugin::Plugin;
use crate::schema::Schema;
use crate::state::EditorState;
use crate::transaction::Transaction;

/// Owns the live [`EditorState`] and applies transactions to it in the
/// order they are dispatched.
pub trait EditingSurface: Sized {
    fn create(schema: Arc<Schema>, doc: Node, plugins: Arc<[Arc<dyn Plugin>]>) -> Self;

    fn state(&self) -> &EditorState;

    /// Apply `tr`. Transactions built against an older state are rejected.
    fn dispatch(&mut self, tr: &Transaction) -> Result<(), TransactionError>;

    fn focus(&mut self);

    fn has_focus(&self) -> bool;

    /// Release the surface. Later dispatches fail.
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}

/// A surface with no rendering, for tests and server-side use.
#[derive(Debug)]
pub struct HeadlessSurface {
    state: EditorState,
    focused: bool,
    destroyed: bool,
}

impl EditingSurface for HeadlessSurface {
    fn create(schema: Arc<Schema>, doc: Node, plugins: Arc<[Arc<dyn Plugin>]>) -> Self {
        Self {
            state: EditorState::create(schema, doc, None, plugins),
            focused: false,
            destroyed: false,
        }
    }

    fn state(&self) -> &EditorState {
        &self.state
    }

    fn dispatch(&mut self, tr: &Transaction) -> Result<(), TransactionError> {
        if self.destroyed {
            return Err(TransactionError::Destroyed);
        }
        self.state = self.state.apply(tr)?;
        Ok(())
    }

    fn focus(&mut self) {
        if !self.destroyed {
            self.focused = true;
        }
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn destroy(&mut self) {
        self.focused = false;
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
