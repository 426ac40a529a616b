//! Markdown on both sides of the document tree.
//!
//! Parsing is two-staged: [`Tokenizer`] flattens `pulldown-cmark` events into
//! [`Token`]s, and [`TreeBuilder`] reduces them into a schema-valid tree
//! through the per-token handlers an extension set registers.
//! [`MarkdownSerializer`] walks a tree back into text through per-type node
//! and mark serializers.

mod builder;
pub mod escape;
pub mod options;
mod parser;
mod rules;
mod serializer;
mod token;
mod tokenizer;
mod writer;

pub use builder::{MAX_NESTING, TreeBuilder};
pub use escape::{EscapeConfig, EscapeSettings};
pub use options::{MarkdownOptions, ParserOptions, Preset, TldList};
pub use parser::{MarkdownParser, ParseAnomaly, ParseOutput, TreeTransformer};
pub use rules::{AttrsFn, ParseRule, TokenHandler};
pub(crate) use rules::builtin_rules;
pub use serializer::{MarkDelim, MarkDelimFn, MarkSerializer, MarkdownSerializer, NodeSerializer};
pub use token::{Token, TokenKind};
pub use tokenizer::{Linkifier, Tokenizer};
pub use writer::{MAX_RENDER_DEPTH, MarkdownWriter, backticks_for, code_fence};

#[cfg(test)]
mod tests;
