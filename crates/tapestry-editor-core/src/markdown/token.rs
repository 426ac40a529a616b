use smol_str::SmolStr;

use crate::schema::{AttrValue, Attrs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Start of a container (`paragraph`, `em`, `link`, ...).
    Open,
    /// End of the container opened by the matching `Open`.
    Close,
    /// Self-contained token, possibly carrying text (`code_block`, `image`).
    Leaf,
    /// A run of plain text.
    Text,
}

/// One entry of the flat token stream fed to the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub name: SmolStr,
    pub attrs: Attrs,
    pub content: String,
    /// Source markup that produced the token (`**`, `#`, ...), informational.
    pub markup: SmolStr,
}

impl Token {
    fn new(kind: TokenKind, name: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            name: name.into(),
            attrs: Attrs::new(),
            content: String::new(),
            markup: SmolStr::default(),
        }
    }

    pub fn open(name: impl Into<SmolStr>) -> Self {
        Self::new(TokenKind::Open, name)
    }

    pub fn close(name: impl Into<SmolStr>) -> Self {
        Self::new(TokenKind::Close, name)
    }

    pub fn leaf(name: impl Into<SmolStr>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(TokenKind::Leaf, name)
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(TokenKind::Text, "text")
        }
    }

    pub fn with_attr(mut self, name: impl Into<SmolStr>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_markup(mut self, markup: impl Into<SmolStr>) -> Self {
        self.markup = markup.into();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }
}
