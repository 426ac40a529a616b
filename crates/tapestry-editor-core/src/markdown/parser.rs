use std::sync::Arc;

use indexmap::IndexMap;
use miette::Diagnostic;
use smol_str::SmolStr;
use tapestry_common::TimingGuard;
use thiserror::Error;

use super::builder::TreeBuilder;
use super::options::ParserOptions;
use super::rules::TokenHandler;
use super::token::Token;
use super::tokenizer::Tokenizer;
use crate::error::SchemaError;
use crate::model::Node;
use crate::schema::Schema;

/// A recoverable problem met while reducing tokens. The offending token is
/// dropped and parsing carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum ParseAnomaly {
    #[error("no parse rule for token {name:?}")]
    #[diagnostic(code(tapestry::parse::unknown_token), severity(Warning))]
    UnknownToken { name: SmolStr },

    #[error("close token {name:?} has no matching open")]
    #[diagnostic(code(tapestry::parse::unmatched_close), severity(Warning))]
    UnmatchedClose { name: SmolStr },

    #[error("{node:?} is not allowed inside {parent:?}")]
    #[diagnostic(code(tapestry::parse::rejected), severity(Warning))]
    Rejected { node: SmolStr, parent: SmolStr },

    #[error("{node:?} was never closed")]
    #[diagnostic(code(tapestry::parse::unclosed), severity(Warning))]
    Unclosed { node: SmolStr },

    #[error("{node:?} nests deeper than {limit} levels and was flattened")]
    #[diagnostic(code(tapestry::parse::too_deep), severity(Warning))]
    TooDeep { node: SmolStr, limit: usize },

    #[error("could not build {node:?}: {reason}")]
    #[diagnostic(code(tapestry::parse::invalid_node), severity(Warning))]
    InvalidNode { node: SmolStr, reason: String },
}

/// Post-processing step applied to a freshly built tree.
pub type TreeTransformer = Arc<dyn Fn(Node, &Schema) -> Node + Send + Sync>;

/// Result of [`MarkdownParser::parse`].
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub doc: Node,
    pub anomalies: Vec<ParseAnomaly>,
}

/// Markdown text to document tree.
#[derive(Clone)]
pub struct MarkdownParser {
    schema: Arc<Schema>,
    tokenizer: Tokenizer,
    handlers: IndexMap<SmolStr, TokenHandler>,
    transformers: Vec<TreeTransformer>,
    empty_doc: Node,
}

impl MarkdownParser {
    pub fn new(
        schema: Arc<Schema>,
        options: ParserOptions,
        handlers: IndexMap<SmolStr, TokenHandler>,
        transformers: Vec<TreeTransformer>,
    ) -> Result<Self, SchemaError> {
        let empty_doc = schema.empty_doc()?;
        Ok(Self {
            schema,
            tokenizer: Tokenizer::new(options),
            handlers,
            transformers,
            empty_doc,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn options(&self) -> &ParserOptions {
        self.tokenizer.options()
    }

    /// Handler registered for a token name.
    pub fn handler(&self, token: &str) -> Option<&TokenHandler> {
        self.handlers.get(token)
    }

    pub fn token_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.handlers.keys()
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenizer.tokenize(text)
    }

    /// Parse `text`. Never fails: problems are reported as anomalies and
    /// the result is always a valid document.
    pub fn parse(&self, text: &str) -> ParseOutput {
        let _timing = TimingGuard::new("markdown parse");
        let tokens = self.tokenizer.tokenize(text);
        let mut builder = TreeBuilder::new(&self.schema);
        for token in &tokens {
            match self.handlers.get(&token.name) {
                Some(handler) => handler(&mut builder, token),
                None => builder.report(ParseAnomaly::UnknownToken {
                    name: token.name.clone(),
                }),
            }
        }

        let (doc, anomalies) = builder.finish();
        let mut doc = doc.unwrap_or_else(|| self.empty_doc.clone());
        for transform in &self.transformers {
            doc = transform(doc, &self.schema);
        }
        if !anomalies.is_empty() {
            tracing::debug!(
                target: "tapestry::parse",
                count = anomalies.len(),
                tokens = tokens.len(),
                "parse finished with anomalies"
            );
        }
        ParseOutput { doc, anomalies }
    }

    /// Parse and discard anomalies.
    pub fn parse_doc(&self, text: &str) -> Node {
        self.parse(text).doc
    }

    pub fn empty_doc(&self) -> &Node {
        &self.empty_doc
    }
}

impl std::fmt::Debug for MarkdownParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownParser")
            .field("options", self.tokenizer.options())
            .field("tokens", &self.handlers.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.len())
            .finish()
    }
}
