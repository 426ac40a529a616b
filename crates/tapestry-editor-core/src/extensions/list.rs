use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::{MarkdownWriter, ParseRule, Token, TreeBuilder};
use crate::schema::{AttrSpec, AttrValue, NodeSpec};

/// Bullet, ordered and task lists.
///
/// A list is tight when none of its items are separated by blank lines.
/// Task items carry `checked`; plain items leave it null. An item may open
/// with any block, so `- # h` keeps its heading on the marker line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lists;

impl Extension for Lists {
    fn name(&self) -> &str {
        "lists"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(
            NodeSpec::new("bullet_list")
                .content("list_item+")
                .group("block")
                .attr("tight", AttrSpec::with_default(false)),
        )
        .node(
            NodeSpec::new("ordered_list")
                .content("list_item+")
                .group("block")
                .attr("order", AttrSpec::with_default(1))
                .attr("tight", AttrSpec::with_default(false)),
        )
        .node(
            NodeSpec::new("list_item")
                .content("block+")
                .attr("checked", AttrSpec::optional()),
        )
        .parse_rule("bullet_list", ParseRule::block("bullet_list"))
        .parse_rule("ordered_list", ParseRule::block("ordered_list"))
        .parse_rule("list_item", ParseRule::block("list_item"))
        .parse_rule(
            "task_marker",
            ParseRule::custom(|b: &mut TreeBuilder<'_>, token: &Token| {
                let checked = token.attr("checked").cloned().unwrap_or(AttrValue::Null);
                b.set_attr("list_item", "checked", checked);
            }),
        )
        .node_serializer("bullet_list", |w, node, _, _| {
            w.render_list(node, "  ", |_| "- ".to_string())
        })
        .node_serializer("ordered_list", |w, node, _, _| {
            let start = node
                .attr("order")
                .and_then(AttrValue::as_int)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(1);
            let width = (start + node.child_count().saturating_sub(1)).to_string().len();
            let space = MarkdownWriter::repeat(" ", width + 2);
            w.render_list(node, &space, |index| {
                let number = (start + index).to_string();
                format!("{}{number}. ", MarkdownWriter::repeat(" ", width - number.len()))
            })
        })
        .node_serializer("list_item", |w, node, _, _| {
            if let Some(checked) = node.attr("checked").and_then(AttrValue::as_bool) {
                w.write(if checked { "[x] " } else { "[ ] " });
            }
            w.render_content(node)
        });
        Ok(())
    }
}
