//! Parse rules: how a token name turns into tree-builder calls.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use super::builder::TreeBuilder;
use super::token::{Token, TokenKind};
use crate::schema::Attrs;

/// A resolved token handler. Modifiers wrap these.
pub type TokenHandler = Arc<dyn Fn(&mut TreeBuilder<'_>, &Token) + Send + Sync>;

/// Computes node or mark attributes from a token.
pub type AttrsFn = Arc<dyn Fn(&Token) -> Attrs + Send + Sync>;

#[derive(Clone)]
enum RuleKind {
    Block,
    LeafBlock,
    Node,
    Mark,
    Ignore,
    Custom(TokenHandler),
}

/// What an extension registers for one token name.
#[derive(Clone)]
pub struct ParseRule {
    kind: RuleKind,
    target: Option<SmolStr>,
    attrs: Option<AttrsFn>,
}

impl ParseRule {
    /// Open/close tokens map to a container node.
    pub fn block(node: impl Into<SmolStr>) -> Self {
        Self::with_kind(RuleKind::Block, Some(node.into()))
    }

    /// A leaf token whose content becomes the text of a textblock, minus
    /// one trailing newline (fenced and indented code).
    pub fn leaf_block(node: impl Into<SmolStr>) -> Self {
        Self::with_kind(RuleKind::LeafBlock, Some(node.into()))
    }

    /// A leaf token maps to a leaf node.
    pub fn node(node: impl Into<SmolStr>) -> Self {
        Self::with_kind(RuleKind::Node, Some(node.into()))
    }

    /// Open/close tokens toggle a mark. A leaf token applies the mark to its
    /// content.
    pub fn mark(mark: impl Into<SmolStr>) -> Self {
        Self::with_kind(RuleKind::Mark, Some(mark.into()))
    }

    /// Accept the token and do nothing.
    pub fn ignore() -> Self {
        Self::with_kind(RuleKind::Ignore, None)
    }

    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&mut TreeBuilder<'_>, &Token) + Send + Sync + 'static,
    {
        Self::with_kind(RuleKind::Custom(Arc::new(handler)), None)
    }

    /// Compute attributes with `f` instead of copying the token's.
    pub fn with_attrs<F>(mut self, f: F) -> Self
    where
        F: Fn(&Token) -> Attrs + Send + Sync + 'static,
    {
        self.attrs = Some(Arc::new(f));
        self
    }

    fn with_kind(kind: RuleKind, target: Option<SmolStr>) -> Self {
        Self {
            kind,
            target,
            attrs: None,
        }
    }

    /// Schema type the rule builds, if any.
    pub fn target(&self) -> Option<&SmolStr> {
        self.target.as_ref()
    }

    /// Whether [`ParseRule::target`] names a mark rather than a node.
    pub fn targets_mark(&self) -> bool {
        matches!(self.kind, RuleKind::Mark)
    }

    pub fn into_handler(self) -> TokenHandler {
        let ParseRule {
            kind,
            target,
            attrs,
        } = self;
        let target = target.unwrap_or_default();
        let attrs_of = move |token: &Token| match &attrs {
            Some(f) => f(token),
            None => token.attrs.clone(),
        };

        match kind {
            RuleKind::Custom(handler) => handler,
            RuleKind::Ignore => Arc::new(|_: &mut TreeBuilder<'_>, _: &Token| {}),
            RuleKind::Block => Arc::new(move |b: &mut TreeBuilder<'_>, token: &Token| match token.kind {
                TokenKind::Open => {
                    b.open_node(&target, &attrs_of(token));
                }
                TokenKind::Close => {
                    b.close_node(&target);
                }
                TokenKind::Leaf | TokenKind::Text => {
                    if b.open_node(&target, &attrs_of(token)) {
                        b.add_text(&token.content);
                        b.close_node(&target);
                    }
                }
            }),
            RuleKind::LeafBlock => Arc::new(move |b: &mut TreeBuilder<'_>, token: &Token| {
                if token.kind == TokenKind::Close {
                    return;
                }
                if b.open_node(&target, &attrs_of(token)) {
                    let content = token.content.strip_suffix('\n').unwrap_or(&token.content);
                    b.add_text(content);
                    b.close_node(&target);
                }
            }),
            RuleKind::Node => Arc::new(move |b: &mut TreeBuilder<'_>, token: &Token| {
                if token.kind != TokenKind::Close {
                    b.add_node(&target, &attrs_of(token));
                }
            }),
            RuleKind::Mark => Arc::new(move |b: &mut TreeBuilder<'_>, token: &Token| match token.kind {
                TokenKind::Open => b.open_mark(&target, &attrs_of(token)),
                TokenKind::Close => b.close_mark(&target),
                TokenKind::Leaf | TokenKind::Text => {
                    b.open_mark(&target, &attrs_of(token));
                    b.add_text(&token.content);
                    b.close_mark(&target);
                }
            }),
        }
    }
}

impl fmt::Debug for ParseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RuleKind::Block => "block",
            RuleKind::LeafBlock => "leaf_block",
            RuleKind::Node => "node",
            RuleKind::Mark => "mark",
            RuleKind::Ignore => "ignore",
            RuleKind::Custom(_) => "custom",
        };
        f.debug_struct("ParseRule")
            .field("kind", &kind)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Rules every parser starts with. Extensions may replace them.
pub(crate) fn builtin_rules() -> Vec<(SmolStr, ParseRule)> {
    vec![
        (
            SmolStr::new_static("text"),
            ParseRule::custom(|b: &mut TreeBuilder<'_>, token: &Token| b.add_text(&token.content)),
        ),
        (
            SmolStr::new_static("softbreak"),
            ParseRule::custom(|b: &mut TreeBuilder<'_>, _: &Token| b.add_text(" ")),
        ),
    ]
}
