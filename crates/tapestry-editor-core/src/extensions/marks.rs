//! Inline marks. Registration order here is rank order in the kit.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::{MarkSerializer, ParseRule, backticks_for};
use crate::model::{Mark, Node};
use crate::schema::{AttrSpec, AttrValue, MarkSpec};

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+:").expect("url scheme pattern"));

fn str_attr<'a>(mark: &'a Mark, name: &str) -> &'a str {
    mark.attr(name).and_then(AttrValue::as_str).unwrap_or("")
}

/// Whether `link` can be written as `<href>`: untitled, absolute, and
/// covering exactly its own href as text.
fn is_plain_url(link: &Mark, parent: &Node, index: usize) -> bool {
    let href = str_attr(link, "href");
    if !str_attr(link, "title").is_empty() || !URL_SCHEME.is_match(href) {
        return false;
    }
    let Some(content) = parent.child(index) else {
        return false;
    };
    if content.text() != Some(href) || content.marks().last() != Some(link) {
        return false;
    }
    parent
        .child(index + 1)
        .is_none_or(|next| !link.is_in_set(next.marks()))
}

/// Write `href` as a link destination. Hrefs with whitespace or angle
/// brackets only survive inside `<...>`.
fn link_destination(href: &str) -> String {
    let pointy = href.chars().any(|c| c.is_whitespace() || c == '<' || c == '>');
    let mut out = String::with_capacity(href.len() + 2);
    if pointy {
        out.push('<');
    }
    for c in href.chars() {
        let escape = if pointy {
            matches!(c, '<' | '>')
        } else {
            matches!(c, '(' | ')' | '"')
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    if pointy {
        out.push('>');
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Link;

impl Extension for Link {
    fn name(&self) -> &str {
        "link"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.mark(
            MarkSpec::new("link")
                .attr("href", AttrSpec::required())
                .attr("title", AttrSpec::optional())
                .exclusive(),
        )
        .parse_rule("link", ParseRule::mark("link"))
        .mark_serializer(
            "link",
            MarkSerializer::dynamic(
                |w, mark, parent, index| {
                    let autolink = is_plain_url(mark, parent, index);
                    w.set_in_autolink(autolink);
                    if autolink { "<" } else { "[" }.to_string()
                },
                |w, mark, _, _| {
                    if w.in_autolink() {
                        w.set_in_autolink(false);
                        return ">".to_string();
                    }
                    let href = link_destination(str_attr(mark, "href"));
                    let title = match str_attr(mark, "title") {
                        "" => String::new(),
                        title => format!(" \"{}\"", title.replace('"', "\\\"")),
                    };
                    format!("]({href}{title})")
                },
            )
            .mixable(),
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Emphasis;

impl Extension for Emphasis {
    fn name(&self) -> &str {
        "emphasis"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.mark(MarkSpec::new("em"))
            .parse_rule("em", ParseRule::mark("em"))
            .mark_serializer("em", MarkSerializer::new("*", "*").mixable().expel_whitespace());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Strong;

impl Extension for Strong {
    fn name(&self) -> &str {
        "strong"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.mark(MarkSpec::new("strong"))
            .parse_rule("strong", ParseRule::mark("strong"))
            .mark_serializer("strong", MarkSerializer::new("**", "**").mixable().expel_whitespace());
        Ok(())
    }
}

/// GFM strikethrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strike;

impl Extension for Strike {
    fn name(&self) -> &str {
        "strike"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.mark(MarkSpec::new("strike"))
            .parse_rule("s", ParseRule::mark("strike"))
            .mark_serializer("strike", MarkSerializer::new("~~", "~~").mixable().expel_whitespace());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineCode;

impl Extension for InlineCode {
    fn name(&self) -> &str {
        "inline_code"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.mark(MarkSpec::new("code").exclusive())
            .parse_rule("code_inline", ParseRule::mark("code"))
            .mark_serializer(
                "code",
                MarkSerializer::dynamic(
                    |_, _, parent, index| backticks_for(parent.child(index), true),
                    |_, _, parent, index| {
                        let prev = index.checked_sub(1).and_then(|i| parent.child(i));
                        backticks_for(prev, false)
                    },
                )
                .no_escape(),
            );
        Ok(())
    }
}
