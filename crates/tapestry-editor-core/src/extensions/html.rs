use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::{ParseRule, Token};
use crate::schema::{AttrSpec, AttrValue, Attrs, NodeSpec};

/// Raw HTML, kept verbatim. Only reached when the parser's `html` option
/// is on; otherwise HTML arrives as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

impl Extension for Html {
    fn name(&self) -> &str {
        "html"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(
            NodeSpec::new("html_block")
                .content("text*")
                .group("block")
                .no_marks(),
        )
        .node(
            NodeSpec::new("html_inline")
                .inline()
                .group("inline")
                .atom()
                .attr("value", AttrSpec::required()),
        )
        .parse_rule("html_block", ParseRule::leaf_block("html_block"))
        .parse_rule(
            "html_inline",
            ParseRule::node("html_inline").with_attrs(|token: &Token| {
                Attrs::from([("value".into(), AttrValue::from(token.content.as_str()))])
            }),
        )
        .node_serializer("html_block", |w, node, _, _| {
            w.text(&node.text_content(), false);
            w.close_block(node);
            Ok(())
        })
        .node_serializer("html_inline", |w, node, _, _| {
            if let Some(value) = node.attr("value").and_then(AttrValue::as_str) {
                w.write(value);
            }
            Ok(())
        });
        Ok(())
    }
}
