use crate::error::{ComposeError, SerializeError};
use crate::extension::{Extension, ExtensionBuilder};
use crate::markdown::{MarkdownWriter, ParseRule};
use crate::model::Node;
use crate::schema::{AttrSpec, AttrValue, NodeSpec};

/// GFM pipe tables. The first row is the header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Table;

impl Extension for Table {
    fn name(&self) -> &str {
        "table"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("table").content("table_row+").group("block"))
            .node(
                NodeSpec::new("table_row")
                    .content("table_cell+")
                    .attr("header", AttrSpec::with_default(false)),
            )
            .node(
                NodeSpec::new("table_cell")
                    .content("inline*")
                    .attr("align", AttrSpec::optional())
                    .attr("header", AttrSpec::with_default(false)),
            )
            .parse_rule("table", ParseRule::block("table"))
            .parse_rule("table_head", ParseRule::ignore())
            .parse_rule("table_row", ParseRule::block("table_row"))
            .parse_rule("table_cell", ParseRule::block("table_cell"))
            .node_serializer("table", |w, node, _, _| {
                let text = render_table(w, node)?;
                w.text(&text, false);
                w.close_block(node);
                Ok(())
            });
        Ok(())
    }
}

fn render_table(w: &MarkdownWriter<'_>, table: &Node) -> Result<String, SerializeError> {
    let mut lines = Vec::with_capacity(table.child_count() + 1);
    for (index, row) in table.children().iter().enumerate() {
        let mut cells = Vec::with_capacity(row.child_count());
        for cell in row.children() {
            let content = w.render_detached(cell)?;
            cells.push(content.replace('\n', " ").replace('|', "\\|"));
        }
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            let delims: Vec<&str> = row.children().iter().map(align_delim).collect();
            lines.push(format!("| {} |", delims.join(" | ")));
        }
    }
    Ok(lines.join("\n"))
}

fn align_delim(cell: &Node) -> &'static str {
    match cell.attr("align").and_then(AttrValue::as_str) {
        Some("left") => ":---",
        Some("center") => ":---:",
        Some("right") => "---:",
        _ => "---",
    }
}
