//! Markdown text to token stream, on top of `pulldown-cmark`.
//!
//! The event stream is flattened into [`Token`]s whose names match the parse
//! rules extensions register. Containers become `Open`/`Close` pairs; code
//! blocks, raw HTML blocks, inline code and images are folded into single
//! `Leaf` tokens.

use std::sync::LazyLock;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;
use smol_str::SmolStr;

use super::options::ParserOptions;
use super::token::Token;
use crate::schema::AttrValue;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?P<scheme>https?://|mailto:)|(?P<www>www\.))?(?P<host>(?:[a-z0-9._%+-]+@)?[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*)(?P<rest>[/?#][^\s<>]*)?",
    )
    .expect("url pattern")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', ')', ']'];

/// Finds bare URLs in text.
#[derive(Debug, Clone)]
pub struct Linkifier {
    tlds: Vec<SmolStr>,
}

impl Linkifier {
    pub fn new(tlds: Vec<SmolStr>) -> Self {
        Self { tlds }
    }

    fn accepts_tld(&self, host: &str) -> bool {
        let Some((_, tld)) = host.rsplit_once('.') else {
            return false;
        };
        let tld = tld.to_ascii_lowercase();
        (tld.len() == 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
            || self.tlds.iter().any(|t| *t == tld)
    }

    /// Byte ranges and targets of the links in `text`.
    pub fn find(&self, text: &str) -> Vec<(std::ops::Range<usize>, String)> {
        let mut links = Vec::new();
        for caps in URL_PATTERN.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let start = whole.start();
            if text[..start].ends_with(['@', '.', '/']) {
                continue;
            }
            let host = caps.name("host").map_or("", |m| m.as_str());
            let scheme = caps.name("scheme").map(|m| m.as_str().to_ascii_lowercase());
            match scheme.as_deref() {
                Some("mailto:") if !host.contains('@') => continue,
                Some(_) => {}
                None if host.contains('@') => continue,
                None if caps.name("www").is_some() || self.accepts_tld(host) => {}
                None => continue,
            }
            let mut end = whole.end();
            while let Some(c) = text[start..end].chars().next_back() {
                if !TRAILING_PUNCTUATION.contains(&c) {
                    break;
                }
                if c == ')' && balanced_parens(&text[start..end]) {
                    break;
                }
                end -= c.len_utf8();
            }
            let literal = &text[start..end];
            let href = if scheme.is_some() {
                literal.to_string()
            } else {
                format!("http://{literal}")
            };
            links.push((start..end, href));
        }
        links
    }
}

fn balanced_parens(s: &str) -> bool {
    s.matches('(').count() >= s.matches(')').count()
}

struct Frame {
    closers: Vec<Token>,
    /// A list item whose inline content gets an implicit paragraph.
    item: bool,
    para_open: bool,
}

/// Turns markdown text into a token stream.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    options: ParserOptions,
    linkifier: Option<Linkifier>,
}

impl Tokenizer {
    pub fn new(options: ParserOptions) -> Self {
        let linkifier = options.linkify.then(|| Linkifier::new(options.tlds.clone()));
        Self { options, linkifier }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let events = coalesce_text(Parser::new_ext(text, self.options.preset.cmark_options()));
        let mut state = State {
            tokens: Vec::with_capacity(events.len()),
            stack: Vec::new(),
            link_depth: 0,
            alignments: Vec::new(),
            cell: 0,
            in_head: false,
        };

        let mut i = 0;
        while i < events.len() {
            match &events[i] {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let (content, next) = collect_text(&events, i + 1);
                    i = next;
                    let (info, fenced) = match kind {
                        CodeBlockKind::Fenced(info) => (info.to_string(), true),
                        CodeBlockKind::Indented => (String::new(), false),
                    };
                    state.block_start();
                    state.tokens.push(
                        Token::leaf("code_block", content)
                            .with_attr("info", info)
                            .with_attr("fenced", fenced)
                            .with_markup(if fenced { "```" } else { "    " }),
                    );
                }
                Event::Start(Tag::HtmlBlock) => {
                    let (content, next) = collect_text(&events, i + 1);
                    i = next;
                    state.block_start();
                    if self.options.html {
                        state.tokens.push(Token::leaf("html_block", content));
                    } else {
                        state.tokens.push(Token::open("paragraph"));
                        state.tokens.push(Token::text(content.trim_end_matches('\n')));
                        state.tokens.push(Token::close("paragraph"));
                    }
                }
                Event::Start(Tag::Image {
                    dest_url, title, ..
                }) => {
                    let (alt, next) = collect_text(&events, i + 1);
                    i = next;
                    state.inline_start();
                    state.tokens.push(
                        Token::leaf("image", "")
                            .with_attr("src", dest_url.to_string())
                            .with_attr("alt", alt)
                            .with_attr("title", non_empty(title)),
                    );
                }
                Event::Start(Tag::List(first)) => {
                    let tight = list_is_tight(&events, i);
                    let (name, token) = match first {
                        Some(order) => (
                            "ordered_list",
                            Token::open("ordered_list")
                                .with_attr("order", i64::try_from(*order).unwrap_or(1)),
                        ),
                        None => ("bullet_list", Token::open("bullet_list")),
                    };
                    state.block_start();
                    state.tokens.push(token.with_attr("tight", tight));
                    state.push(vec![Token::close(name)], false);
                    i += 1;
                }
                Event::Start(tag) => {
                    self.open_tag(&mut state, tag);
                    i += 1;
                }
                Event::End(tag) => {
                    state.end(tag);
                    i += 1;
                }
                Event::Text(text) => {
                    state.inline_start();
                    self.push_text(&mut state, text);
                    i += 1;
                }
                Event::Code(code) => {
                    state.inline_start();
                    state
                        .tokens
                        .push(Token::leaf("code_inline", code.to_string()).with_markup("`"));
                    i += 1;
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    state.inline_start();
                    if self.options.html {
                        state.tokens.push(Token::leaf("html_inline", html.to_string()));
                    } else {
                        state.tokens.push(Token::text(html.to_string()));
                    }
                    i += 1;
                }
                Event::SoftBreak => {
                    state.inline_start();
                    let name = if self.options.breaks { "hardbreak" } else { "softbreak" };
                    state.tokens.push(Token::leaf(name, "\n"));
                    i += 1;
                }
                Event::HardBreak => {
                    state.inline_start();
                    state.tokens.push(Token::leaf("hardbreak", "\n"));
                    i += 1;
                }
                Event::Rule => {
                    state.block_start();
                    state.tokens.push(Token::leaf("hr", "").with_markup("---"));
                    i += 1;
                }
                Event::TaskListMarker(checked) => {
                    state
                        .tokens
                        .push(Token::leaf("task_marker", "").with_attr("checked", *checked));
                    i += 1;
                }
                other => {
                    tracing::trace!(target: "tapestry::markdown", event = ?other, "event ignored");
                    i += 1;
                }
            }
        }

        while let Some(frame) = state.stack.pop() {
            state.tokens.extend(frame.closers);
        }
        state.tokens
    }

    fn open_tag(&self, state: &mut State, tag: &Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                state.block_start();
                state.tokens.push(Token::open("paragraph"));
                state.push(vec![Token::close("paragraph")], false);
            }
            Tag::Heading { level, .. } => {
                state.block_start();
                let level = *level as usize;
                state.tokens.push(
                    Token::open("heading")
                        .with_attr("level", level)
                        .with_markup("#".repeat(level)),
                );
                state.push(vec![Token::close("heading")], false);
            }
            Tag::BlockQuote(..) => {
                state.block_start();
                state.tokens.push(Token::open("blockquote").with_markup(">"));
                state.push(vec![Token::close("blockquote")], false);
            }
            Tag::Item => {
                state.block_start();
                state.tokens.push(Token::open("list_item"));
                state.push(vec![Token::close("list_item")], true);
            }
            Tag::Table(alignments) => {
                state.block_start();
                state.alignments = alignments.clone();
                state.tokens.push(Token::open("table"));
                state.push(vec![Token::close("table")], false);
            }
            Tag::TableHead => {
                state.in_head = true;
                state.cell = 0;
                state.tokens.push(Token::open("table_head"));
                state
                    .tokens
                    .push(Token::open("table_row").with_attr("header", true));
                state.push(vec![Token::close("table_row"), Token::close("table_head")], false);
            }
            Tag::TableRow => {
                state.in_head = false;
                state.cell = 0;
                state.tokens.push(Token::open("table_row"));
                state.push(vec![Token::close("table_row")], false);
            }
            Tag::TableCell => {
                let align = match state.alignments.get(state.cell) {
                    Some(Alignment::Left) => AttrValue::from("left"),
                    Some(Alignment::Center) => AttrValue::from("center"),
                    Some(Alignment::Right) => AttrValue::from("right"),
                    _ => AttrValue::Null,
                };
                state.cell += 1;
                state.tokens.push(
                    Token::open("table_cell")
                        .with_attr("align", align)
                        .with_attr("header", state.in_head),
                );
                state.push(vec![Token::close("table_cell")], false);
            }
            Tag::Emphasis => state.open_inline(Token::open("em").with_markup("*"), "em"),
            Tag::Strong => state.open_inline(Token::open("strong").with_markup("**"), "strong"),
            Tag::Strikethrough => state.open_inline(Token::open("s").with_markup("~~"), "s"),
            Tag::Link {
                dest_url, title, ..
            } => {
                state.link_depth += 1;
                state.open_inline(
                    Token::open("link")
                        .with_attr("href", dest_url.to_string())
                        .with_attr("title", non_empty(title)),
                    "link",
                );
            }
            other => {
                tracing::trace!(target: "tapestry::markdown", tag = ?other, "tag ignored");
                state.push(Vec::new(), false);
            }
        }
    }

    fn push_text(&self, state: &mut State, text: &str) {
        let links = match &self.linkifier {
            Some(linkifier) if state.link_depth == 0 => linkifier.find(text),
            _ => Vec::new(),
        };
        let mut last = 0;
        for (range, href) in links {
            if range.start > last {
                state.tokens.push(Token::text(&text[last..range.start]));
            }
            state.tokens.push(
                Token::open("link")
                    .with_attr("href", href)
                    .with_attr("title", AttrValue::Null)
                    .with_markup("linkify"),
            );
            state.tokens.push(Token::text(&text[range.clone()]));
            state.tokens.push(Token::close("link"));
            last = range.end;
        }
        if last < text.len() {
            state.tokens.push(Token::text(&text[last..]));
        }
    }
}

struct State {
    tokens: Vec<Token>,
    stack: Vec<Frame>,
    link_depth: usize,
    alignments: Vec<Alignment>,
    cell: usize,
    in_head: bool,
}

impl State {
    fn push(&mut self, closers: Vec<Token>, item: bool) {
        self.stack.push(Frame {
            closers,
            item,
            para_open: false,
        });
    }

    fn open_inline(&mut self, token: Token, name: &'static str) {
        self.inline_start();
        self.tokens.push(token);
        self.push(vec![Token::close(name)], false);
    }

    /// Inline content directly inside a list item opens a paragraph.
    fn inline_start(&mut self) {
        if let Some(frame) = self.stack.last_mut()
            && frame.item
            && !frame.para_open
        {
            frame.para_open = true;
            self.tokens.push(Token::open("paragraph"));
        }
    }

    /// Block content directly inside a list item closes its paragraph.
    fn block_start(&mut self) {
        if let Some(frame) = self.stack.last_mut()
            && frame.para_open
        {
            frame.para_open = false;
            self.tokens.push(Token::close("paragraph"));
        }
    }

    fn end(&mut self, tag: &TagEnd) {
        if matches!(tag, TagEnd::Link) {
            self.link_depth = self.link_depth.saturating_sub(1);
        }
        self.block_start();
        if let Some(frame) = self.stack.pop() {
            self.tokens.extend(frame.closers);
        }
    }
}

/// Merge runs of adjacent text events so links are never split.
fn coalesce_text<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::new();
    for event in events {
        if let (Event::Text(next), Some(Event::Text(prev))) = (&event, out.last_mut()) {
            *prev = format!("{prev}{next}").into();
            continue;
        }
        out.push(event);
    }
    out
}

/// Concatenated text up to the end of the container starting before
/// `start`. Returns the text and the index after the closing event.
fn collect_text(events: &[Event<'_>], start: usize) -> (String, usize) {
    let mut depth = 0usize;
    let mut text = String::new();
    let mut i = start;
    while i < events.len() {
        match &events[i] {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return (text, i + 1),
            Event::End(_) => depth -= 1,
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                text.push_str(t)
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
        i += 1;
    }
    (text, i)
}

/// A list is tight unless one of its items holds a paragraph.
fn list_is_tight(events: &[Event<'_>], start: usize) -> bool {
    let mut depth = 0usize;
    for event in &events[start..] {
        match event {
            Event::Start(Tag::Paragraph) if depth == 2 => return false,
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    true
}

fn non_empty(s: &str) -> AttrValue {
    if s.is_empty() {
        AttrValue::Null
    } else {
        AttrValue::from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::options::Preset;
    use crate::markdown::token::TokenKind;

    fn names(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match t.kind {
                TokenKind::Open => format!("{}_open", t.name),
                TokenKind::Close => format!("{}_close", t.name),
                TokenKind::Leaf => t.name.to_string(),
                TokenKind::Text => format!("text:{}", t.content),
            })
            .collect()
    }

    #[test]
    fn test_heading_and_emphasis() {
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("# Title\n\nSome *text*.\n");
        assert_eq!(
            names(&tokens),
            vec![
                "heading_open",
                "text:Title",
                "heading_close",
                "paragraph_open",
                "text:Some ",
                "em_open",
                "text:text",
                "em_close",
                "text:.",
                "paragraph_close",
            ]
        );
        assert_eq!(tokens[0].attr("level"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn test_tight_list_gets_paragraphs() {
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("- a\n- b\n");
        assert_eq!(
            names(&tokens),
            vec![
                "bullet_list_open",
                "list_item_open",
                "paragraph_open",
                "text:a",
                "paragraph_close",
                "list_item_close",
                "list_item_open",
                "paragraph_open",
                "text:b",
                "paragraph_close",
                "list_item_close",
                "bullet_list_close",
            ]
        );
        assert_eq!(tokens[0].attr("tight"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn test_loose_list() {
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("1. a\n\n2. b\n");
        assert_eq!(tokens[0].name, "ordered_list");
        assert_eq!(tokens[0].attr("tight"), Some(&AttrValue::Bool(false)));
        assert_eq!(tokens[0].attr("order"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn test_code_block_is_leaf() {
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("```rust\nfn x() {}\n```\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "code_block");
        assert_eq!(tokens[0].content, "fn x() {}\n");
        assert_eq!(tokens[0].attr("info"), Some(&AttrValue::from("rust")));
    }

    #[test]
    fn test_html_disabled_becomes_text() {
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("a <b>x</b>\n");
        assert!(tokens.iter().all(|t| t.name != "html_inline"));
        let html = ParserOptions {
            html: true,
            ..Default::default()
        };
        let tokens = Tokenizer::new(html).tokenize("a <b>x</b>\n");
        assert!(tokens.iter().any(|t| t.name == "html_inline"));
    }

    #[test]
    fn test_strikethrough_depends_on_preset() {
        let strict = ParserOptions {
            preset: Preset::CommonMark,
            ..Default::default()
        };
        let text = "~~gone~~";
        let tokens = Tokenizer::new(strict).tokenize(text);
        assert!(tokens.iter().all(|t| t.name != "s"));
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize(text);
        assert!(tokens.iter().any(|t| t.name == "s"));
    }

    #[test]
    fn test_breaks_turn_softbreaks_hard() {
        let options = ParserOptions {
            breaks: true,
            ..Default::default()
        };
        let tokens = Tokenizer::new(options).tokenize("a\nb");
        assert!(tokens.iter().any(|t| t.name == "hardbreak"));
        let tokens = Tokenizer::new(ParserOptions::default()).tokenize("a\nb");
        assert!(tokens.iter().any(|t| t.name == "softbreak"));
    }

    #[test]
    fn test_linkify() {
        let linkifier = Linkifier::new(vec!["com".into()]);
        let found = linkifier
            .find("see https://a.example/x. or example.com, mail me@host.com or mailto:me@host.com");
        let hrefs: Vec<&str> = found.iter().map(|(_, href)| href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["https://a.example/x", "http://example.com", "mailto:me@host.com"]
        );
    }

    #[test]
    fn test_linkify_tlds() {
        let linkifier = Linkifier::new(vec!["social".into()]);
        assert_eq!(linkifier.find("pds.example.social").len(), 1);
        assert_eq!(linkifier.find("site.de").len(), 1);
        assert!(linkifier.find("file.txt").is_empty());
        assert!(linkifier.find("plain words").is_empty());
    }

    #[test]
    fn test_linkify_skips_links() {
        let options = ParserOptions {
            linkify: true,
            breaks: true,
            ..Default::default()
        };
        let tokens = Tokenizer::new(options).tokenize("[www.a.com](http://b.com) www.c.com");
        let links: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Open && t.name == "link")
            .filter_map(|t| t.attr("href").and_then(AttrValue::as_str))
            .collect();
        assert_eq!(links, vec!["http://b.com", "http://www.c.com"]);
    }

    #[test]
    fn test_task_list_marker() {
        let gfm = ParserOptions {
            preset: Preset::Gfm,
            ..Default::default()
        };
        let tokens = Tokenizer::new(gfm).tokenize("- [x] done\n");
        let marker = tokens.iter().find(|t| t.name == "task_marker").unwrap();
        assert_eq!(marker.attr("checked"), Some(&AttrValue::Bool(true)));
    }
}
