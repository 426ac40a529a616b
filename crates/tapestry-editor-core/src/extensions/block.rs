//! Block nodes: headings, quotes, code and rules.

use std::sync::LazyLock;

use regex::Regex;

use super::set_block_action;
use crate::action::InputRule;
use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::{ParseRule, code_fence};
use crate::model::Node;
use crate::schema::{AttrSpec, AttrValue, Attrs, NodeSpec};

static HEADING_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s$").expect("heading input pattern"));

const MAX_HEADING_LEVEL: usize = 6;

fn level_attrs(level: usize) -> Attrs {
    Attrs::from([("level".into(), AttrValue::from(level))])
}

fn heading_level(node: &Node) -> usize {
    node.attr("level")
        .and_then(AttrValue::as_int)
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(1)
        .clamp(1, MAX_HEADING_LEVEL)
}

/// ATX headings, levels 1 to 6.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heading;

impl Extension for Heading {
    fn name(&self) -> &str {
        "heading"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(
            NodeSpec::new("heading")
                .content("inline*")
                .group("block")
                .attr("level", AttrSpec::with_default(1)),
        )
        .parse_rule("heading", ParseRule::block("heading"))
        .node_serializer("heading", |w, node, _, _| {
            w.write(&format!("{} ", "#".repeat(heading_level(node))));
            w.render_inline(node, false)?;
            w.close_block(node);
            Ok(())
        })
        .input_rule(InputRule::new(
            "heading",
            HEADING_INPUT.clone(),
            |state, caps, range| {
                let level = caps.get(1)?.as_str().len();
                let mut tr = state.tr();
                tr.delete(range.start, range.end).ok()?;
                tr.set_block_type(range.start, "heading", &level_attrs(level))
                    .ok()?;
                Some(tr)
            },
        ));

        for level in 1..=MAX_HEADING_LEVEL {
            let action = format!("heading_{level}");
            b.action(action.as_str(), set_block_action("heading", level_attrs(level)))
                .key_binding(&format!("Mod-Alt-{level}"), action.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blockquote;

impl Extension for Blockquote {
    fn name(&self) -> &str {
        "blockquote"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("blockquote").content("block+").group("block"))
            .parse_rule("blockquote", ParseRule::block("blockquote"))
            .node_serializer("blockquote", |w, node, _, _| {
                w.wrap_block("> ", None, node, |w| w.render_content(node))
            });
        Ok(())
    }
}

/// Fenced and indented code. Both serialize as fenced blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeBlock;

impl Extension for CodeBlock {
    fn name(&self) -> &str {
        "code_block"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(
            NodeSpec::new("code_block")
                .content("text*")
                .group("block")
                .no_marks()
                .attr("language", AttrSpec::with_default("")),
        )
        .parse_rule(
            "code_block",
            ParseRule::leaf_block("code_block").with_attrs(|token| {
                let info = token.attr("info").and_then(AttrValue::as_str).unwrap_or("");
                let language = info.split_whitespace().next().unwrap_or("");
                Attrs::from([("language".into(), AttrValue::from(language))])
            }),
        )
        .node_serializer("code_block", |w, node, _, _| {
            let text = node.text_content();
            let fence = code_fence(&text);
            let language = node.attr("language").and_then(AttrValue::as_str).unwrap_or("");
            w.write(&format!("{fence}{language}\n"));
            w.text(&text, false);
            w.ensure_new_line();
            w.write(&fence);
            w.close_block(node);
            Ok(())
        })
        .action("set_code_block", set_block_action("code_block", Attrs::new()))
        .key_binding("Mod-Alt-c", "set_code_block")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalRule;

impl Extension for HorizontalRule {
    fn name(&self) -> &str {
        "horizontal_rule"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("horizontal_rule").group("block"))
            .parse_rule("hr", ParseRule::node("horizontal_rule"))
            .node_serializer("horizontal_rule", |w, node, _, _| {
                w.write("---");
                w.close_block(node);
                Ok(())
            });
        Ok(())
    }
}
