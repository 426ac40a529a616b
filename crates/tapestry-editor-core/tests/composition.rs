//! Composition through the public API: conflicts, overrides, modifiers and
//! view registration.

use std::sync::Arc;

use tapestry_editor_core::extensions::{Document, Heading, standard_kit};
use tapestry_editor_core::markdown::{MarkdownWriter, ParseRule};
use tapestry_editor_core::view::NodeView;
use tapestry_editor_core::{
    AttrSpec, Attrs, ComposeError, ComposeOptions, Composition, ConflictPolicy, DynamicModifier,
    EditorConfig, EditorError, Extension, ExtensionBuilder, Node, NodeSpec, compose,
};

/// Contributes a `callout` block.
struct Callout {
    name: &'static str,
    policy: ConflictPolicy,
    marker: &'static str,
}

impl Callout {
    fn new(name: &'static str, marker: &'static str) -> Self {
        Self {
            name,
            policy: ConflictPolicy::Reject,
            marker,
        }
    }

    fn overriding(mut self) -> Self {
        self.policy = ConflictPolicy::Override;
        self
    }
}

impl Extension for Callout {
    fn name(&self) -> &str {
        self.name
    }

    fn conflict_policy(&self) -> ConflictPolicy {
        self.policy
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        let marker = self.marker;
        b.node(NodeSpec::new("callout").content("block+").group("block"))
            .parse_rule("blockquote", ParseRule::block("callout"))
            .node_serializer("callout", move |w: &mut MarkdownWriter<'_>, node: &Node, _: &Node, _: usize| {
                w.wrap_block(marker, None, node, |w| w.render_content(node))
            });
        Ok(())
    }
}

fn ext(extension: impl Extension + 'static) -> Arc<dyn Extension> {
    Arc::new(extension)
}

fn compose_all(extensions: Vec<Arc<dyn Extension>>, modifiers: &[DynamicModifier]) -> Result<Composition, ComposeError> {
    let mut all: Vec<Arc<dyn Extension>> = vec![Arc::new(Document)];
    all.extend(extensions);
    compose(&all, modifiers, ComposeOptions::default())
}

#[test]
fn test_same_node_from_two_extensions_names_both() {
    let err = compose_all(
        vec![ext(Callout::new("callout-a", "> ")), ext(Callout::new("callout-b", "! "))],
        &[],
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("callout-a"), "{message}");
    assert!(message.contains("callout-b"), "{message}");
    assert!(matches!(err, ComposeError::Conflict { kind: "type", .. }));
}

#[test]
fn test_conflict_is_fatal_for_the_editor() {
    let config = EditorConfig::new()
        .extension(Arc::new(Callout::new("callout-a", "> ")))
        .extension(Arc::new(Callout::new("callout-b", "! ")));
    assert!(matches!(
        tapestry_editor_core::Editor::new(config),
        Err(EditorError::Compose(ComposeError::Conflict { .. }))
    ));
}

#[test]
fn test_marked_override_wins() {
    let c = compose_all(
        vec![
            ext(Callout::new("callout-a", "> ")),
            ext(Callout::new("callout-b", "! ").overriding()),
        ],
        &[],
    )
    .unwrap();
    let doc = c.parser.parse_doc("> note\n");
    assert_eq!(doc.child(0).unwrap().type_name(), "callout");
    assert_eq!(c.serializer.serialize(&doc).unwrap(), "! note\n");
}

#[test]
fn test_empty_modifier_changes_nothing() {
    let corpus = "# Head\n\n> quote *em* **strong**\n\n- a\n- b\n\n```js\nx\n```\n";
    let plain = compose_all(standard_kit(), &[]).unwrap();
    let modified = compose_all(standard_kit(), &[DynamicModifier::new(), DynamicModifier::default()]).unwrap();

    assert_eq!(
        plain.schema.node_types().map(|t| t.name().clone()).collect::<Vec<_>>(),
        modified.schema.node_types().map(|t| t.name().clone()).collect::<Vec<_>>()
    );
    assert_eq!(
        plain.parser.token_names().collect::<Vec<_>>(),
        modified.parser.token_names().collect::<Vec<_>>()
    );
    let a = plain.parser.parse_doc(corpus);
    let b = modified.parser.parse_doc(corpus);
    assert_eq!(a, b);
    assert_eq!(
        plain.serializer.serialize(&a).unwrap(),
        modified.serializer.serialize(&b).unwrap()
    );
}

#[test]
fn test_modifier_patches_and_ignores_unknown_keys() {
    let shout = DynamicModifier::new()
        .node_serializer("heading", |base| {
            Arc::new(move |w: &mut MarkdownWriter<'_>, node: &Node, parent: &Node, index: usize| {
                w.write("<!-- h -->\n");
                base(w, node, parent, index)
            })
        })
        .schema_attrs("heading", |mut attrs| {
            attrs.insert("id".into(), AttrSpec::with_default(""));
            attrs
        })
        .parse_rule("no_such_token", |base| base);

    let c = compose_all(vec![ext(Heading)], &[shout]).unwrap();
    let doc = c.parser.parse_doc("# Hi\n");
    let heading = doc.child(0).unwrap();
    assert_eq!(heading.attr("id").and_then(|v| v.as_str()), Some(""));
    assert_eq!(c.serializer.serialize(&doc).unwrap(), "<!-- h -->\n# Hi\n");
    assert!(c.parser.handler("no_such_token").is_none());
}

#[derive(Default)]
struct CountingView {
    updates: usize,
}

impl NodeView for CountingView {
    fn update(&mut self, node: &Node) -> bool {
        self.updates += 1;
        node.type_name() == "heading"
    }
}

struct HeadingView;

impl Extension for HeadingView {
    fn name(&self) -> &str {
        "heading-view"
    }

    fn register(&self, b: &mut ExtensionBuilder<'_>) -> Result<(), ComposeError> {
        b.node_view("heading", |_: &Node| Box::new(CountingView::default()) as Box<dyn NodeView>);
        Ok(())
    }
}

#[test]
fn test_node_views_are_registered_by_type() {
    let c = compose_all(vec![ext(Heading), ext(HeadingView)], &[]).unwrap();
    assert_eq!(c.views.node_types().collect::<Vec<_>>(), vec!["heading"]);

    let heading = c
        .schema
        .node("heading", &Attrs::new(), vec![c.schema.text("x", vec![]).unwrap()], vec![])
        .unwrap();
    let paragraph = c.schema.node("paragraph", &Attrs::new(), vec![], vec![]).unwrap();

    let mut view = c.views.node_view(&heading).expect("heading has a view");
    assert!(view.update(&heading));
    assert!(!view.update(&paragraph));
    assert!(c.views.node_view(&paragraph).is_none());
}

#[test]
fn test_view_for_unknown_type_is_rejected() {
    let err = compose_all(vec![ext(HeadingView)], &[]).unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UnknownTarget { kind: "node view", ref target, .. } if target == "heading"
    ));
}
