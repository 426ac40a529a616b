//! The editor facade: composition, a surface and the public document
//! operations.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::action::{ActionRegistry, InputRule, KeyCombo, Keymap};
use crate::config::{ChangeCallback, EditorConfig};
use crate::error::EditorError;
use crate::extension::Extension;
use crate::extensions::{DOCUMENT, Document};
use crate::log::{LogLevel, LogSink};
use crate::markdown::{MarkdownParser, MarkdownSerializer};
use crate::model::Node;
use crate::registry::{ComposeOptions, Composition, compose};
use crate::schema::Schema;
use crate::selection::{CursorTarget, Selection};
use crate::state::EditorState;
use crate::surface::{EditingSurface, HeadlessSurface};
use crate::transaction::{META_REPLACE, Transaction};
use crate::transform::find_textblock;
use crate::view::ViewRegistry;

/// Placeholder character for inline leaves when matching input rules.
const LEAF_CHAR: char = '\u{fffc}';

pub struct Editor<S: EditingSurface = HeadlessSurface> {
    composition: Composition,
    surface: S,
    on_change: Option<ChangeCallback>,
    on_doc_change: Option<ChangeCallback>,
    log: Arc<dyn LogSink>,
}

impl Editor<HeadlessSurface> {
    pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
        Self::with_surface(config)
    }
}

impl<S: EditingSurface> Editor<S> {
    /// Compose the configured extensions, parse the initial value and
    /// create the surface.
    pub fn with_surface(config: EditorConfig) -> Result<Self, EditorError> {
        let EditorConfig {
            initial_value,
            extensions: configured,
            markdown,
            transformers,
            escape,
            on_change,
            on_doc_change,
            modifiers,
            log_sink,
        } = config;

        let mut extensions: Vec<Arc<dyn Extension>> = Vec::with_capacity(configured.len() + 1);
        if !configured.iter().any(|e| e.name() == DOCUMENT) {
            extensions.push(Arc::new(Document));
        }
        extensions.extend(configured);

        let options = ComposeOptions {
            parser: markdown.resolve()?,
            escape,
            transformers,
        };
        let composition = compose(&extensions, &modifiers, options)?;
        let doc = parse_reported(&composition.parser, &initial_value, log_sink.as_ref());
        let surface = S::create(composition.schema.clone(), doc, composition.plugins.clone());

        Ok(Self {
            composition,
            surface,
            on_change,
            on_doc_change,
            log: log_sink,
        })
    }

    pub fn state(&self) -> &EditorState {
        self.surface.state()
    }

    pub fn doc(&self) -> &Node {
        self.surface.state().doc()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.composition.schema
    }

    pub fn parser(&self) -> &MarkdownParser {
        &self.composition.parser
    }

    pub fn serializer(&self) -> &MarkdownSerializer {
        &self.composition.serializer
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.composition.actions
    }

    pub fn keymap(&self) -> &Keymap {
        &self.composition.keymap
    }

    pub fn input_rules(&self) -> &[InputRule] {
        &self.composition.input_rules
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.composition.views
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn ensure_alive(&self) -> Result<(), EditorError> {
        if self.surface.is_destroyed() {
            Err(EditorError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// The current document as markdown.
    pub fn get_value(&self) -> Result<String, EditorError> {
        self.ensure_alive()?;
        Ok(self.composition.serializer.serialize(self.doc())?)
    }

    /// True iff the document is a single childless default block.
    pub fn is_empty(&self) -> bool {
        is_empty_doc(self.doc(), &self.composition.schema)
    }

    pub fn clear(&mut self) -> Result<(), EditorError> {
        self.ensure_alive()?;
        let empty = self.composition.parser.empty_doc().clone();
        self.replace_with(empty)
    }

    /// Replace the whole document with parsed `markdown`.
    pub fn replace(&mut self, markdown: &str) -> Result<(), EditorError> {
        self.ensure_alive()?;
        let doc = self.parse(markdown);
        self.replace_with(doc)
    }

    /// Insert parsed `markdown` before the current content.
    pub fn prepend(&mut self, markdown: &str) -> Result<(), EditorError> {
        self.insert_markdown(markdown, false)
    }

    /// Insert parsed `markdown` after the current content.
    pub fn append(&mut self, markdown: &str) -> Result<(), EditorError> {
        self.insert_markdown(markdown, true)
    }

    fn insert_markdown(&mut self, markdown: &str, at_end: bool) -> Result<(), EditorError> {
        self.ensure_alive()?;
        if self.is_empty() {
            return self.replace(markdown);
        }
        let parsed = self.parse(markdown);
        if is_empty_doc(&parsed, &self.composition.schema) {
            return Ok(());
        }
        let index = if at_end { self.doc().child_count() } else { 0 };
        let mut tr = self.state().tr();
        tr.insert_blocks(index, parsed.children().to_vec())?
            .set_meta(META_REPLACE, true);
        self.dispatch(tr)
    }

    fn replace_with(&mut self, doc: Node) -> Result<(), EditorError> {
        let mut tr = self.state().tr();
        tr.replace_doc(doc);
        self.dispatch(tr)
    }

    pub fn move_cursor(&mut self, target: CursorTarget) -> Result<(), EditorError> {
        self.ensure_alive()?;
        let mut tr = self.state().tr();
        tr.set_selection(Selection::at(self.doc(), target));
        self.dispatch(tr)
    }

    /// Apply `tr` through the surface, then run the change callbacks.
    ///
    /// Callback failures are logged and never undo the transaction.
    pub fn dispatch(&mut self, tr: Transaction) -> Result<(), EditorError> {
        self.ensure_alive()?;
        self.surface.dispatch(&tr)?;

        let state = self.surface.state();
        if let Some(callback) = &self.on_change {
            run_callback(self.log.as_ref(), "on_change", callback, state, &tr);
        }
        if tr.doc_changed()
            && let Some(callback) = &self.on_doc_change
        {
            run_callback(self.log.as_ref(), "on_doc_change", callback, state, &tr);
        }
        Ok(())
    }

    /// Run a named action. Returns whether it applied.
    pub fn run_action(&mut self, name: &str) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match self.composition.actions.run(name, self.state()) {
            Some(tr) => {
                self.dispatch(tr)?;
                Ok(true)
            }
            None => {
                tracing::debug!(target: "tapestry::editor", action = name, "action did not apply");
                Ok(false)
            }
        }
    }

    /// Run the action bound to a key press. Returns whether one applied.
    pub fn handle_key(&mut self, combo: &KeyCombo, is_mac: bool) -> Result<bool, EditorError> {
        let Some(action) = self.composition.keymap.lookup(combo, is_mac).cloned() else {
            return Ok(false);
        };
        self.run_action(&action)
    }

    /// Type `text` at the selection, giving input rules the first chance to
    /// handle it.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditorError> {
        self.ensure_alive()?;
        if let Some(tr) = self.try_input_rules(text) {
            return self.dispatch(tr);
        }
        let selection = self.state().selection();
        let mut tr = self.state().tr();
        if !selection.is_collapsed() {
            tr.delete(selection.start(), selection.end())?;
        }
        tr.insert_text_at_selection(text)?;
        self.dispatch(tr)
    }

    fn try_input_rules(&self, text: &str) -> Option<Transaction> {
        let state = self.state();
        let selection = state.selection();
        if !selection.is_collapsed() || self.composition.input_rules.is_empty() {
            return None;
        }
        let (block, start) = find_textblock(state.doc(), selection.head)?;
        let content_start = start + 1;
        let mut before = text_before(&block, selection.head - content_start);
        before.push_str(text);
        self.composition
            .input_rules
            .iter()
            .find_map(|rule| rule.apply(state, &before, text, content_start))
    }

    pub fn focus(&mut self) -> Result<(), EditorError> {
        self.ensure_alive()?;
        self.surface.focus();
        Ok(())
    }

    pub fn has_focus(&self) -> bool {
        self.surface.has_focus()
    }

    /// Tear down the surface. Every later operation fails with
    /// [`EditorError::Destroyed`].
    pub fn destroy(&mut self) {
        if !self.surface.is_destroyed() {
            self.surface.destroy();
            tracing::debug!(target: "tapestry::editor", "editor destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.surface.is_destroyed()
    }

    fn parse(&self, markdown: &str) -> Node {
        parse_reported(&self.composition.parser, markdown, self.log.as_ref())
    }
}

impl<S: EditingSurface> std::fmt::Debug for Editor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", self.surface.state())
            .field("destroyed", &self.surface.is_destroyed())
            .finish_non_exhaustive()
    }
}

fn parse_reported(parser: &MarkdownParser, markdown: &str, log: &dyn LogSink) -> Node {
    let output = parser.parse(markdown);
    for anomaly in &output.anomalies {
        log.log(LogLevel::Warn, "parse", &anomaly.to_string());
    }
    output.doc
}

fn is_empty_doc(doc: &Node, schema: &Schema) -> bool {
    doc.child_count() == 1
        && doc.first_child().is_some_and(|block| {
            block.node_type().name() == schema.default_block().name() && block.child_count() == 0
        })
}

/// Inline text of `block` up to `offset`, inline leaves as one placeholder
/// character each.
fn text_before(block: &Node, offset: usize) -> String {
    let mut out = String::new();
    let mut pos = 0;
    for child in block.children() {
        if pos >= offset {
            break;
        }
        match child.text() {
            Some(text) => out.extend(text.chars().take(offset - pos)),
            None => out.push(LEAF_CHAR),
        }
        pos += child.node_size();
    }
    out
}

fn run_callback(
    log: &dyn LogSink,
    name: &str,
    callback: &ChangeCallback,
    state: &EditorState,
    tr: &Transaction,
) {
    match catch_unwind(AssertUnwindSafe(|| callback(state, tr))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log.log(LogLevel::Error, "callback", &format!("{name} failed: {err}")),
        Err(payload) => log.log(
            LogLevel::Error,
            "callback",
            &format!("{name} panicked: {}", panic_message(payload.as_ref())),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::standard_kit;
    use crate::log::MemorySink;

    fn editor(initial: &str) -> Editor {
        Editor::new(
            EditorConfig::new()
                .initial_value(initial)
                .extensions(standard_kit()),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_lifecycle() {
        let mut ed = editor("");
        assert!(ed.is_empty());
        assert_eq!(ed.get_value().unwrap(), "");
        ed.append("x").unwrap();
        assert!(!ed.is_empty());
        assert_eq!(ed.get_value().unwrap(), "x\n");
        ed.clear().unwrap();
        assert!(ed.is_empty());
    }

    #[test]
    fn test_prepend_and_append() {
        let mut ed = editor("middle");
        ed.move_cursor(CursorTarget::End).unwrap();
        assert_eq!(ed.state().selection(), Selection::collapsed(7));
        ed.prepend("# top").unwrap();
        ed.append("- end").unwrap();
        assert_eq!(ed.get_value().unwrap(), "# top\n\nmiddle\n\n- end\n");
        // the cursor moved with the content it was in
        assert_eq!(ed.state().selection(), Selection::collapsed(7 + 5));
        ed.append("").unwrap();
        assert_eq!(ed.state().version(), 3);
    }

    #[test]
    fn test_move_cursor() {
        let mut ed = editor("one\n\ntwo");
        ed.move_cursor(CursorTarget::End).unwrap();
        assert_eq!(ed.state().selection(), Selection::collapsed(9));
        ed.move_cursor(CursorTarget::Start).unwrap();
        assert_eq!(ed.state().selection(), Selection::collapsed(1));
    }

    #[test]
    fn test_insert_text_runs_input_rules() {
        let mut ed = editor("");
        ed.insert_text("#").unwrap();
        ed.insert_text(" ").unwrap();
        ed.insert_text("Title").unwrap();
        assert_eq!(ed.get_value().unwrap(), "# Title\n");
    }

    #[test]
    fn test_destroyed_editor_rejects_operations() {
        let mut ed = editor("x");
        ed.focus().unwrap();
        assert!(ed.has_focus());
        ed.destroy();
        assert!(!ed.has_focus());
        assert!(matches!(ed.get_value(), Err(EditorError::Destroyed)));
        assert!(matches!(ed.append("y"), Err(EditorError::Destroyed)));
        assert!(matches!(ed.focus(), Err(EditorError::Destroyed)));
    }

    #[test]
    fn test_parse_anomalies_reach_sink() {
        let sink = MemorySink::new();
        let config = EditorConfig::new()
            .initial_value("> quoted\n")
            .log_sink(Arc::new(sink.clone()));
        let ed = Editor::new(config).unwrap();
        assert_eq!(ed.get_value().unwrap(), "quoted\n");
        let warnings = sink.at_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|e| e.scope == "parse"));
    }
}
