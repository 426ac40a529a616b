//! Error types for the editor core.
//!
//! Composition and configuration problems are fatal and surface while the
//! editor is being built. Parse anomalies are not errors at all: they are
//! collected as [`crate::markdown::ParseAnomaly`] values and logged.

use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::content::ContentExprError;

/// Main error type for editor construction and operation.
#[derive(Error, Debug, Diagnostic)]
pub enum EditorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transaction(#[from] TransactionError),

    /// Operation attempted after `destroy()`.
    #[error("editor has been destroyed")]
    #[diagnostic(code(tapestry::editor::destroyed))]
    Destroyed,
}

/// Errors raised while building a [`crate::Schema`] or nodes inside it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("type name {0:?} is used by both a node and a mark")]
    #[diagnostic(code(tapestry::schema::duplicate_name))]
    DuplicateName(SmolStr),

    #[error("invalid content expression {expr:?} on node {node:?}: {source}")]
    #[diagnostic(code(tapestry::schema::content_expr))]
    InvalidContentExpr {
        node: SmolStr,
        expr: SmolStr,
        #[source]
        source: ContentExprError,
    },

    #[error("schema is missing required {0}")]
    #[diagnostic(
        code(tapestry::schema::missing_required),
        help("the base document extension provides `doc`, `paragraph` and `text`")
    )]
    MissingRequired(SmolStr),

    #[error("unknown node type {0:?}")]
    #[diagnostic(code(tapestry::schema::unknown_node))]
    UnknownNodeType(SmolStr),

    #[error("unknown mark type {0:?}")]
    #[diagnostic(code(tapestry::schema::unknown_mark))]
    UnknownMarkType(SmolStr),

    #[error("{owner:?} requires attribute {attr:?}")]
    #[diagnostic(code(tapestry::schema::missing_attr))]
    MissingAttr { owner: SmolStr, attr: SmolStr },

    #[error("invalid content for {node:?}: [{children}]")]
    #[diagnostic(code(tapestry::schema::invalid_content))]
    InvalidContent { node: SmolStr, children: String },

    #[error("node {0:?} does not allow marks")]
    #[diagnostic(code(tapestry::schema::marks_not_allowed))]
    MarksNotAllowed(SmolStr),

    #[error("text nodes must be created with `Schema::text` and may not be empty")]
    #[diagnostic(code(tapestry::schema::text))]
    InvalidText,
}

/// Fatal problems detected while composing extensions.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ComposeError {
    #[error("{kind} {key:?} is defined by both {first:?} and {second:?}")]
    #[diagnostic(
        code(tapestry::compose::conflict),
        help("mark the later extension with `ConflictPolicy::Override` to replace the earlier definition")
    )]
    Conflict {
        kind: &'static str,
        key: SmolStr,
        first: SmolStr,
        second: SmolStr,
    },

    #[error("extension {0:?} appears more than once")]
    #[diagnostic(code(tapestry::compose::duplicate_extension))]
    DuplicateExtension(SmolStr),

    #[error("{kind} {key:?} from {extension:?} targets unknown type {target:?}")]
    #[diagnostic(code(tapestry::compose::unknown_target))]
    UnknownTarget {
        kind: &'static str,
        key: SmolStr,
        extension: SmolStr,
        target: SmolStr,
    },

    #[error("extension {extension:?} failed to register: {message}")]
    #[diagnostic(code(tapestry::compose::extension))]
    Extension { extension: SmolStr, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}

/// Invalid construction options.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unknown markdown preset {0:?}")]
    #[diagnostic(
        code(tapestry::config::preset),
        help("known presets are `default`, `commonmark` and `gfm`")
    )]
    UnknownPreset(SmolStr),

    #[error("invalid {which} escape pattern: {source}")]
    #[diagnostic(code(tapestry::config::escape))]
    InvalidPattern {
        which: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Fatal serialization failures: a composition defect or a tree too deep
/// to walk.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum SerializeError {
    #[error("no serializer rule for node type {0:?}")]
    #[diagnostic(code(tapestry::serialize::missing_node_rule))]
    MissingNodeRule(SmolStr),

    #[error("no serializer rule for mark type {0:?}")]
    #[diagnostic(code(tapestry::serialize::missing_mark_rule))]
    MissingMarkRule(SmolStr),

    #[error("document nests deeper than {limit} levels")]
    #[diagnostic(code(tapestry::serialize::too_deep))]
    TooDeep { limit: usize },
}

/// Errors from tree transforms used to build transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum TransformError {
    #[error("position {pos} does not point into a textblock")]
    #[diagnostic(code(tapestry::transform::position))]
    InvalidPosition { pos: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors raised when a surface applies a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum TransactionError {
    #[error("transaction was built against version {built} but the state is at {current}")]
    #[diagnostic(
        code(tapestry::transaction::stale),
        help("build transactions from the current state right before dispatching")
    )]
    Stale { built: u64, current: u64 },

    #[error("surface has been destroyed")]
    #[diagnostic(code(tapestry::transaction::destroyed))]
    Destroyed,
}
