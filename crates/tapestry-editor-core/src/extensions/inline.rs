use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::ParseRule;
use crate::schema::{AttrSpec, AttrValue, NodeSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct HardBreak;

impl Extension for HardBreak {
    fn name(&self) -> &str {
        "hard_break"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("hard_break").inline().group("inline"))
            .parse_rule("hardbreak", ParseRule::node("hard_break"))
            .node_serializer("hard_break", |w, node, parent, index| {
                // Trailing breaks have no markdown form.
                let followed = parent.children()[index + 1..]
                    .iter()
                    .any(|sibling| sibling.type_name() != node.type_name());
                if followed {
                    w.write("\\\n");
                }
                Ok(())
            });
        Ok(())
    }
}

/// Inline images. The alt text is stored as an attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct Image;

impl Extension for Image {
    fn name(&self) -> &str {
        "image"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(
            NodeSpec::new("image")
                .inline()
                .group("inline")
                .atom()
                .attr("src", AttrSpec::required())
                .attr("alt", AttrSpec::with_default(""))
                .attr("title", AttrSpec::optional()),
        )
        .parse_rule("image", ParseRule::node("image"))
        .node_serializer("image", |w, node, _, _| {
            let attr = |name: &str| node.attr(name).and_then(AttrValue::as_str).unwrap_or("");
            let alt = w.esc(attr("alt"), false);
            let src = attr("src").replace('(', "\\(").replace(')', "\\)");
            let title = match attr("title") {
                "" => String::new(),
                title => format!(" \"{}\"", title.replace('"', "\\\"")),
            };
            w.write(&format!("![{alt}]({src}{title})"));
            Ok(())
        });
        Ok(())
    }
}
