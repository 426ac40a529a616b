use crate::error::ComposeError;
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::ParseRule;
use crate::schema::{Attrs, NodeSpec};

use super::set_block_action;

pub const DOCUMENT: &str = "document";

/// `doc`, `paragraph` and `text`: the minimum every schema needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Document;

impl Extension for Document {
    fn name(&self) -> &str {
        DOCUMENT
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("doc").content("block+"))
            .node(NodeSpec::new("paragraph").content("inline*").group("block"))
            .node(NodeSpec::new("text").group("inline"))
            .parse_rule("paragraph", ParseRule::block("paragraph"))
            .node_serializer("paragraph", |w, node, _, _| {
                w.render_inline(node, true)?;
                w.close_block(node);
                Ok(())
            })
            .node_serializer("text", |w, node, _, _| {
                if let Some(text) = node.text() {
                    let escape = !w.in_autolink();
                    w.text(text, escape);
                }
                Ok(())
            })
            .action("set_paragraph", set_block_action("paragraph", Attrs::new()))
            .key_binding("Mod-Alt-0", "set_paragraph")?;
        Ok(())
    }
}
