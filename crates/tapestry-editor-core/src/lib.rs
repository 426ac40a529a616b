//! tapestry-editor-core: extension composition and the markdown/tree
//! pipeline for a rich-text editor.
//!
//! This crate provides:
//! - `Extension` and `compose`: ordered extensions (plus `DynamicModifier`
//!   patches) resolved into a `Schema`, `MarkdownParser`, `MarkdownSerializer`
//!   and plugin list, with conflicts reported by name
//! - `markdown`: token stream to tree and tree to markdown
//! - `EditorState`, `Transaction` and the `Plugin` observer contract, with
//!   `DecorationSet` remapping and reconciliation
//! - `Editor`: whole-document operations over an `EditingSurface`
//! - `extensions`: the standard CommonMark/GFM kit

pub mod action;
pub mod config;
pub mod content;
pub mod decoration;
pub mod editor;
pub mod error;
pub mod extension;
pub mod extensions;
pub mod log;
pub mod mapping;
pub mod markdown;
pub mod model;
pub mod modifier;
pub mod plugin;
pub mod registry;
pub mod schema;
pub mod selection;
pub mod state;
pub mod surface;
pub mod transaction;
pub mod transform;
pub mod view;

pub use action::{Action, ActionRegistry, InputRule, Key, KeyCombo, Keymap, Modifiers};
pub use config::{CallbackError, ChangeCallback, EditorConfig, EditorSettings};
pub use decoration::{Decoration, DecorationDiff, DecorationKind, DecorationSet, DecorationSpec};
pub use editor::Editor;
pub use error::{
    ComposeError, ConfigError, EditorError, SchemaError, SerializeError, TransactionError,
    TransformError,
};
pub use extension::{ConflictPolicy, Extension, ExtensionBuilder, ExtensionContext, FactoryContext};
pub use log::{LogLevel, LogSink, MemorySink, TracingSink};
pub use mapping::{Assoc, Mapping, StepMap};
pub use markdown::{
    EscapeConfig, MarkdownOptions, MarkdownParser, MarkdownSerializer, ParseRule, Preset,
};
pub use model::{Mark, Node};
pub use modifier::DynamicModifier;
pub use plugin::{Plugin, PluginState, Priority, StatePlugin};
pub use registry::{ComposeOptions, Composition, compose};
pub use schema::{AttrSpec, AttrValue, Attrs, MarkSpec, NodeSpec, Schema};
pub use selection::{CursorTarget, Selection};
pub use smol_str::SmolStr;
pub use state::{DocState, EditorState};
pub use surface::{EditingSurface, HeadlessSurface};
pub use transaction::Transaction;
pub use view::{MarkView, NodeView, ViewRegistry};
