//! Parse/serialize tests over the standard extension kit.

use std::sync::Arc;

use super::*;
use crate::error::{ComposeError, SerializeError};
use crate::extension::{Extension, ExtensionBuilder};
use crate::extensions::{Document, standard_kit};
use crate::model::Node;
use crate::registry::{ComposeOptions, Composition, compose};
use crate::schema::{AttrValue, Attrs, NodeSpec, Schema};

fn kit_with(options: ComposeOptions) -> Composition {
    let mut extensions: Vec<Arc<dyn Extension>> = vec![Arc::new(Document)];
    extensions.extend(standard_kit());
    compose(&extensions, &[], options).expect("standard kit composes")
}

fn kit(preset: Preset) -> Composition {
    kit_with(ComposeOptions {
        parser: ParserOptions {
            preset,
            ..Default::default()
        },
        ..Default::default()
    })
}

fn round_trip(c: &Composition, text: &str) -> String {
    c.serializer.serialize(&c.parser.parse_doc(text)).unwrap()
}

// === Round trips ===

#[test]
fn test_title_round_trip() {
    let c = kit(Preset::Default);
    let doc = c.parser.parse_doc("# Title\n\nSome *text*.\n");

    let heading = doc.child(0).unwrap();
    assert_eq!(heading.type_name(), "heading");
    assert_eq!(heading.attr("level"), Some(&AttrValue::Int(1)));
    let paragraph = doc.child(1).unwrap();
    assert_eq!(paragraph.type_name(), "paragraph");
    let emphasised = paragraph.child(1).unwrap();
    assert_eq!(emphasised.text(), Some("text"));
    assert_eq!(emphasised.marks()[0].name(), "em");

    assert_eq!(c.serializer.serialize(&doc).unwrap(), "# Title\n\nSome *text*.\n");
}

#[test]
fn test_canonical_documents_round_trip() {
    let c = kit(Preset::Gfm);
    let cases = [
        "## Subheading\n",
        "###### Deepest\n",
        "> quoted\n",
        "> one\n>\n> two\n",
        "```rust\nfn main() {}\n```\n",
        "```\nplain\n```\n",
        "---\n",
        "- a\n- b\n",
        "- a\n\n- b\n",
        "1. one\n2. two\n",
        "3. three\n4. four\n",
        "- [ ] todo\n- [x] done\n",
        "- outer\n  - inner\n",
        "- # h\n",
        "- ```\n  code\n  ```\n",
        "- # h\n\n  text\n",
        "a\\\nb\n",
        "![alt](pic.png \"Title\")\n",
        "[text](https://example.com)\n",
        "[text](https://example.com \"Home\")\n",
        "[a](<u v>)\n",
        "[a](<u v> \"Home\")\n",
        "[a](<x\\<y>)\n",
        "<https://example.com>\n",
        "**bold** and *em*\n",
        "~~gone~~\n",
        "`code`\n",
        "`` a`b ``\n",
        "a \\* b \\_c\\_ snake_case\n",
        "\\# not a heading\n",
        "1\\. not a list\n",
        "| a | b |\n| --- | :---: |\n| 1 | 2 |\n",
    ];
    for case in cases {
        assert_eq!(round_trip(&c, case), case, "round trip of {case:?}");
    }
}

#[test]
fn test_link_destination_keeps_href() {
    let c = kit(Preset::Gfm);
    let doc = c.parser.parse_doc("[a](<u v>)\n");
    let text = doc.child(0).unwrap().child(0).unwrap();
    assert_eq!(text.marks()[0].attr("href"), Some(&AttrValue::from("u v")));
    assert_eq!(c.parser.parse_doc(&c.serializer.serialize(&doc).unwrap()), doc);
}

#[test]
fn test_list_item_may_open_with_any_block() {
    let c = kit(Preset::Default);
    let doc = c.parser.parse_doc("- # h\n");
    let item = doc.child(0).unwrap().child(0).unwrap();
    assert_eq!(item.type_name(), "list_item");
    assert_eq!(item.child_count(), 1);
    assert_eq!(item.child(0).unwrap().type_name(), "heading");
    assert_eq!(c.parser.parse_doc(&c.serializer.serialize(&doc).unwrap()), doc);
}

#[test]
fn test_serialization_is_deterministic() {
    let c = kit(Preset::Gfm);
    let doc = c
        .parser
        .parse_doc("# A\n\n- x\n- *y*\n\n| h |\n| --- |\n| v |\n");
    let first = c.serializer.serialize(&doc).unwrap();
    let second = c.serializer.serialize(&doc).unwrap();
    assert_eq!(first, second);
    assert_eq!(round_trip(&c, &first), first);
}

#[test]
fn test_non_canonical_input_normalizes() {
    let c = kit(Preset::Default);
    assert_eq!(round_trip(&c, "Title\n=====\n"), "# Title\n");
    assert_eq!(round_trip(&c, "* a\n* b\n"), "- a\n- b\n");
    assert_eq!(round_trip(&c, "__bold__ _em_\n"), "**bold** *em*\n");
    assert_eq!(round_trip(&c, "***\n"), "---\n");
    assert_eq!(round_trip(&c, "    indented\n"), "```\nindented\n```\n");
    assert_eq!(round_trip(&c, "\n\npara\n\n\n"), "para\n");
    assert_eq!(round_trip(&c, "soft\nbreak\n"), "soft break\n");
    assert_eq!(round_trip(&c, ""), "");
}

#[test]
fn test_nested_containers() {
    let c = kit(Preset::Default);
    let out = round_trip(&c, "> quote\n>\n> - nested\n> - list\n\n1. first\n2. second\n");
    insta::assert_snapshot!(out, @r"
    > quote
    >
    > - nested
    > - list

    1. first
    2. second
    ");
}

#[test]
fn test_table_alignment_row() {
    let c = kit(Preset::Gfm);
    let out = round_trip(&c, "|l|c|r|n|\n|:--|:-:|--:|---|\n|1|2|3|4|\n");
    insta::assert_snapshot!(out, @r"
    | l | c | r | n |
    | :--- | :---: | ---: | --- |
    | 1 | 2 | 3 | 4 |
    ");
}

#[test]
fn test_table_cell_pipes_escaped() {
    let c = kit(Preset::Gfm);
    let out = round_trip(&c, "| a |\n| --- |\n| x \\| y |\n");
    assert_eq!(out, "| a |\n| --- |\n| x \\| y |\n");
}

// === Presets and options ===

#[test]
fn test_presets_select_constructs() {
    let strike = "~~x~~\n";
    assert_eq!(round_trip(&kit(Preset::Default), strike), strike);
    assert_eq!(round_trip(&kit(Preset::CommonMark), strike), "\\~\\~x\\~\\~\n");

    let table = "| a |\n| --- |\n| 1 |\n";
    let gfm = kit(Preset::Gfm).parser.parse_doc(table);
    assert_eq!(gfm.child(0).unwrap().type_name(), "table");
    let plain = kit(Preset::Default).parser.parse_doc(table);
    assert_eq!(plain.child(0).unwrap().type_name(), "paragraph");
}

#[test]
fn test_html_option() {
    let html = kit_with(ComposeOptions {
        parser: ParserOptions {
            html: true,
            ..Default::default()
        },
        ..Default::default()
    });
    let doc = html.parser.parse_doc("a <b>x</b>\n\n<div>block</div>\n");
    let paragraph = doc.child(0).unwrap();
    assert_eq!(paragraph.child(1).unwrap().type_name(), "html_inline");
    assert_eq!(doc.child(1).unwrap().type_name(), "html_block");
    assert_eq!(
        html.serializer.serialize(&doc).unwrap(),
        "a <b>x</b>\n\n<div>block</div>\n"
    );

    let plain = kit(Preset::Default);
    let doc = plain.parser.parse_doc("a <b>x</b>\n");
    assert!(doc.child(0).unwrap().children().iter().all(Node::is_text));
}

#[test]
fn test_linkify_and_breaks() {
    let options = MarkdownOptions {
        linkify: true,
        ..Default::default()
    };
    let c = kit_with(ComposeOptions {
        parser: options.resolve().unwrap(),
        ..Default::default()
    });
    assert_eq!(
        round_trip(&c, "see example.com now\n"),
        "see [example.com](http://example.com) now\n"
    );
    assert_eq!(round_trip(&c, "go https://example.com\n"), "go <https://example.com>\n");
    assert_eq!(round_trip(&c, "not example.zzz\n"), "not example.zzz\n");
    assert_eq!(round_trip(&c, "one\ntwo\n"), "one\\\ntwo\n");
}

#[test]
fn test_custom_tlds() {
    let options = MarkdownOptions {
        linkify: true,
        tlds: TldList::One("blog".into()),
        ..Default::default()
    };
    let c = kit_with(ComposeOptions {
        parser: options.resolve().unwrap(),
        ..Default::default()
    });
    assert_eq!(
        round_trip(&c, "read my.blog\n"),
        "read [my.blog](http://my.blog)\n"
    );
    assert_eq!(round_trip(&c, "not example.com\n"), "not example.com\n");
}

// === Escaping ===

#[test]
fn test_escape_config() {
    let c = kit_with(ComposeOptions {
        escape: EscapeSettings {
            common: Some(r"[*]".into()),
            line_start: None,
        }
        .compile()
        .unwrap(),
        ..Default::default()
    });
    let doc = c.parser.parse_doc("\\_x\\_ \\*y\\*\n");
    assert_eq!(c.serializer.serialize(&doc).unwrap(), "_x_ \\*y\\*\n");

    let defaults = EscapeConfig::default();
    assert_eq!(
        c.serializer.serialize_with_escape(&doc, &defaults).unwrap(),
        "\\_x\\_ \\*y\\*\n"
    );
}

#[test]
fn test_autolink_text_is_not_escaped() {
    let c = kit(Preset::Default);
    assert_eq!(
        round_trip(&c, "<https://example.com/a_b_c>\n"),
        "<https://example.com/a_b_c>\n"
    );
}

// === Failure modes ===

#[test]
fn test_unknown_tokens_are_anomalies() {
    let extensions: Vec<Arc<dyn Extension>> = vec![Arc::new(Document)];
    let c = compose(&extensions, &[], ComposeOptions::default()).unwrap();
    let out = c.parser.parse("# Title\n");
    assert!(out.anomalies.contains(&ParseAnomaly::UnknownToken {
        name: "heading".into()
    }));
    assert_eq!(c.serializer.serialize(&out.doc).unwrap(), "Title\n");
}

#[test]
fn test_deep_nesting_is_flattened() {
    let c = kit(Preset::Default);
    let text = format!("{}x\n", "> ".repeat(3000));
    let out = c.parser.parse(&text);
    let too_deep = out
        .anomalies
        .iter()
        .filter(|a| matches!(a, ParseAnomaly::TooDeep { .. }))
        .count();
    assert_eq!(too_deep, 1);
    assert_eq!(
        c.serializer.serialize(&out.doc).unwrap(),
        format!("{}x\n", "> ".repeat(MAX_NESTING))
    );
}

#[test]
fn test_serializer_refuses_runaway_depth() {
    let c = kit(Preset::Default);
    let mut node = c
        .schema
        .node("paragraph", &Attrs::new(), vec![c.schema.text("x", vec![]).unwrap()], vec![])
        .unwrap();
    for _ in 0..MAX_RENDER_DEPTH {
        node = c.schema.node("blockquote", &Attrs::new(), vec![node], vec![]).unwrap();
    }
    let doc = c.schema.node("doc", &Attrs::new(), vec![node], vec![]).unwrap();
    assert_eq!(
        c.serializer.serialize(&doc).unwrap_err(),
        SerializeError::TooDeep {
            limit: MAX_RENDER_DEPTH
        }
    );
}

struct Aside;

impl Extension for Aside {
    fn name(&self) -> &str {
        "aside"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node(NodeSpec::new("aside").group("block"));
        Ok(())
    }
}

#[test]
fn test_missing_node_serializer() {
    let extensions: Vec<Arc<dyn Extension>> = vec![Arc::new(Document), Arc::new(Aside)];
    let c = compose(&extensions, &[], ComposeOptions::default()).unwrap();
    let aside = c.schema.node("aside", &Attrs::new(), vec![], vec![]).unwrap();
    let doc = c.schema.node("doc", &Attrs::new(), vec![aside], vec![]).unwrap();
    let err = c.serializer.serialize(&doc).unwrap_err();
    assert!(matches!(err, SerializeError::MissingNodeRule(name) if name == "aside"));
}

#[test]
fn test_tree_transformer_runs_after_parse() {
    let drop_rules: TreeTransformer = Arc::new(|doc: Node, schema: &Schema| {
        let kept = doc
            .children()
            .iter()
            .filter(|child| child.type_name() != "horizontal_rule")
            .cloned()
            .collect();
        schema.with_content(&doc, kept).unwrap_or(doc)
    });
    let c = kit_with(ComposeOptions {
        transformers: vec![drop_rules],
        ..Default::default()
    });
    assert_eq!(round_trip(&c, "a\n\n---\n\nb\n"), "a\n\nb\n");
}
