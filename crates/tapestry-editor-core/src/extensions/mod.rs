//! The standard extension kit.
//!
//! [`Document`] is the base every editor composes first. The rest cover
//! CommonMark and the GFM additions; [`standard_kit`] returns them in the
//! order their mark ranks assume.

mod block;
mod document;
mod html;
mod inline;
mod list;
mod marks;
mod placeholder;
mod table;

use std::sync::Arc;

pub use block::{Blockquote, CodeBlock, Heading, HorizontalRule};
pub use document::{DOCUMENT, Document};
pub use html::Html;
pub use inline::{HardBreak, Image};
pub use list::Lists;
pub use marks::{Emphasis, InlineCode, Link, Strike, Strong};
pub use placeholder::{PLACEHOLDER_CLASS, Placeholder, PlaceholderPlugin, PlaceholderState};
pub use table::Table;

use crate::extension::Extension;
use crate::schema::Attrs;
use crate::state::EditorState;
use crate::transaction::Transaction;

/// Every standard extension except [`Document`] and [`Placeholder`].
///
/// Mark extensions come in rank order: link, em, strong, strike, code.
/// Code must stay last since it disables escaping.
pub fn standard_kit() -> Vec<Arc<dyn Extension>> {
    vec![
        Arc::new(Heading),
        Arc::new(Blockquote),
        Arc::new(CodeBlock),
        Arc::new(HorizontalRule),
        Arc::new(Lists),
        Arc::new(Table),
        Arc::new(Html),
        Arc::new(HardBreak),
        Arc::new(Image),
        Arc::new(Link),
        Arc::new(Emphasis),
        Arc::new(Strong),
        Arc::new(Strike),
        Arc::new(InlineCode),
    ]
}

/// Action turning the textblock at the cursor into `type_name`.
pub(crate) fn set_block_action(
    type_name: &'static str,
    attrs: Attrs,
) -> impl Fn(&EditorState) -> Option<Transaction> + Send + Sync + 'static {
    move |state| {
        let mut tr = state.tr();
        tr.set_block_type(state.selection().head, type_name, &attrs).ok()?;
        Some(tr)
    }
}
