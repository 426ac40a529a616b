//! Output state threaded through node and mark serializers.
//!
//! Blocks never write their own trailing separator. A finished block is
//! remembered in `closed` and the separator is emitted lazily by the next
//! write, which lets lists decide between tight and loose spacing and lets
//! the document end without dangling blank lines.

use smol_str::SmolStr;

use super::escape::EscapeConfig;
use super::serializer::{MarkDelim, MarkSerializer, MarkdownSerializer};
use crate::error::SerializeError;
use crate::model::{Mark, Node};

/// Node type whose trailing marks are dropped before a mark boundary.
const HARD_BREAK: &str = "hard_break";

/// Deepest node nesting [`MarkdownWriter::render`] descends into.
pub const MAX_RENDER_DEPTH: usize = 128;

pub struct MarkdownWriter<'a> {
    serializer: &'a MarkdownSerializer,
    escape: &'a EscapeConfig,
    out: String,
    /// Prefix written at the start of every line (`"> "`, list indent).
    delim: String,
    closed: Option<Node>,
    in_tight_list: bool,
    in_autolink: bool,
    at_block_start: bool,
    depth: usize,
}

impl<'a> MarkdownWriter<'a> {
    pub fn new(serializer: &'a MarkdownSerializer, escape: &'a EscapeConfig) -> Self {
        Self {
            serializer,
            escape,
            out: String::new(),
            delim: String::new(),
            closed: None,
            in_tight_list: false,
            in_autolink: false,
            at_block_start: false,
            depth: 0,
        }
    }

    pub fn out(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    pub fn delim(&self) -> &str {
        &self.delim
    }

    pub fn in_tight_list(&self) -> bool {
        self.in_tight_list
    }

    pub fn in_autolink(&self) -> bool {
        self.in_autolink
    }

    pub fn set_in_autolink(&mut self, value: bool) {
        self.in_autolink = value;
    }

    /// Output ends at the start of a line.
    pub fn at_blank(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    pub fn ensure_new_line(&mut self) {
        if !self.at_blank() {
            self.out.push('\n');
        }
    }

    /// Emit the separator owed to the last closed block: a line break plus
    /// `size - 1` blank (delimiter-only) lines.
    pub fn flush_close(&mut self, size: usize) {
        if self.closed.is_none() {
            return;
        }
        if !self.at_blank() {
            self.out.push('\n');
        }
        if size > 1 {
            let delim = self.delim.trim_end();
            for _ in 1..size {
                self.out.push_str(delim);
                self.out.push('\n');
            }
        }
        self.closed = None;
    }

    /// Write raw content, preceded by the line delimiter when at a line
    /// start.
    pub fn write(&mut self, content: &str) {
        self.flush_close(2);
        if !self.delim.is_empty() && self.at_blank() {
            self.out.push_str(&self.delim);
        }
        self.out.push_str(content);
    }

    pub fn close_block(&mut self, node: &Node) {
        self.closed = Some(node.clone());
    }

    /// Write text line by line, escaping it when `escape` is set.
    pub fn text(&mut self, text: &str, escape: bool) {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            let fresh = self.at_blank();
            self.write("");
            if !escape && line.starts_with('[') && ends_with_unescaped_bang(&self.out) {
                self.out.pop();
                self.out.push_str("\\!");
            }
            if escape {
                let escaped = self.escape.escape(line, self.at_block_start || fresh);
                self.out.push_str(&escaped);
            } else {
                self.out.push_str(line);
            }
            if lines.peek().is_some() {
                self.out.push('\n');
            }
        }
    }

    /// Escape with the configured patterns without writing.
    pub fn esc(&self, text: &str, line_start: bool) -> String {
        self.escape.escape(text, line_start).into_owned()
    }

    /// Indent the output of `f` with `delim`, using `first_delim` on the
    /// first line.
    pub fn wrap_block<F>(
        &mut self,
        delim: &str,
        first_delim: Option<&str>,
        node: &Node,
        f: F,
    ) -> Result<(), SerializeError>
    where
        F: FnOnce(&mut Self) -> Result<(), SerializeError>,
    {
        let old = self.delim.clone();
        self.write(first_delim.unwrap_or(delim));
        self.delim.push_str(delim);
        let result = f(self);
        self.delim = old;
        self.close_block(node);
        result
    }

    pub fn render(&mut self, node: &Node, parent: &Node, index: usize) -> Result<(), SerializeError> {
        let serializer = self.serializer;
        let rule = serializer
            .node_serializer(node.type_name())
            .ok_or_else(|| SerializeError::MissingNodeRule(node.type_name().clone()))?;
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(SerializeError::TooDeep {
                limit: MAX_RENDER_DEPTH,
            });
        }
        self.depth += 1;
        let result = rule(self, node, parent, index);
        self.depth -= 1;
        result
    }

    pub fn render_content(&mut self, parent: &Node) -> Result<(), SerializeError> {
        for (index, child) in parent.children().iter().enumerate() {
            self.render(child, parent, index)?;
        }
        Ok(())
    }

    /// Render inline children, opening and closing marks around them.
    pub fn render_inline(&mut self, parent: &Node, from_block_start: bool) -> Result<(), SerializeError> {
        self.at_block_start = from_block_start;
        let mut active: Vec<Mark> = Vec::new();
        let mut trailing = String::new();
        for index in 0..=parent.child_count() {
            let node = parent.child(index).cloned();
            self.progress(parent, node, index, &mut active, &mut trailing)?;
        }
        self.at_block_start = false;
        Ok(())
    }

    fn progress(
        &mut self,
        parent: &Node,
        mut node: Option<Node>,
        index: usize,
        active: &mut Vec<Mark>,
        trailing: &mut String,
    ) -> Result<(), SerializeError> {
        let count = parent.child_count();
        let next_marks = parent.child(index + 1).map(|n| n.marks()).unwrap_or(&[]);
        let mut marks: Vec<Mark> = node.as_ref().map(|n| n.marks().to_vec()).unwrap_or_default();

        // Marks ending on a hard break would put the closing delimiter at
        // the start of the next line.
        if let Some(n) = &node
            && n.type_name() == HARD_BREAK
        {
            let next = parent.child(index + 1);
            marks.retain(|m| {
                next.is_some_and(|next| {
                    m.is_in_set(next.marks())
                        && next.text().is_none_or(|t| t.chars().any(|c| !c.is_whitespace()))
                })
            });
        }

        let mut leading = std::mem::take(trailing);

        if let Some(n) = node.clone()
            && let Some(text) = n.text()
            && self.any_mark(&marks, |m, info| info.expel_enclosing_whitespace && !m.is_in_set(active.as_slice()))?
        {
            let rest = text.trim_start();
            let lead = &text[..text.len() - rest.len()];
            if !lead.is_empty() {
                leading.push_str(lead);
                if rest.is_empty() {
                    node = None;
                    marks = active.clone();
                } else {
                    node = Some(n.with_text(rest.to_string()));
                }
            }
        }

        if let Some(n) = node.clone()
            && let Some(text) = n.text()
            && self.any_mark(&marks, |m, info| {
                info.expel_enclosing_whitespace && (index + 1 == count || !m.is_in_set(next_marks))
            })?
        {
            let rest = text.trim_end();
            let trail = &text[rest.len()..];
            if !trail.is_empty() {
                *trailing = trail.to_string();
                if rest.is_empty() {
                    node = None;
                    marks = active.clone();
                } else {
                    node = Some(n.with_text(rest.to_string()));
                }
            }
        }

        let inner = marks.last().cloned();
        let no_escape = match &inner {
            Some(mark) => !self.mark_info(mark)?.escape,
            None => false,
        };
        let len = marks.len() - usize::from(no_escape);

        // Mixable marks may close in a different order than they opened, so
        // line them up with the currently open ones.
        'outer: for i in 0..len {
            if !self.mark_info(&marks[i])?.mixable {
                break;
            }
            for j in 0..active.len() {
                if !self.mark_info(&active[j])?.mixable {
                    break;
                }
                if marks[i] == active[j] {
                    if i > j {
                        let mark = marks.remove(i);
                        marks.insert(j, mark);
                    } else if j > i {
                        let mark = marks.remove(i);
                        marks.insert(j - 1, mark);
                    }
                    continue 'outer;
                }
            }
        }

        let mut keep = 0;
        while keep < active.len().min(len) && marks[keep] == active[keep] {
            keep += 1;
        }

        while keep < active.len() {
            if let Some(mark) = active.pop() {
                let close = self.mark_string(&mark, false, parent, index)?;
                self.text(&close, false);
            }
        }

        if !leading.is_empty() {
            self.text(&leading, true);
        }

        if let Some(node) = node {
            while active.len() < len {
                let add = marks[active.len()].clone();
                let open = self.mark_string(&add, true, parent, index)?;
                active.push(add);
                self.text(&open, false);
                self.at_block_start = false;
            }

            match (&inner, node.text()) {
                (Some(inner), Some(text)) if no_escape => {
                    let open = self.mark_string(inner, true, parent, index)?;
                    let close = self.mark_string(inner, false, parent, index + 1)?;
                    self.text(&format!("{open}{text}{close}"), false);
                }
                _ => self.render(&node, parent, index)?,
            }
            self.at_block_start = false;
        }
        Ok(())
    }

    fn mark_info(&self, mark: &Mark) -> Result<&'a MarkSerializer, SerializeError> {
        let serializer = self.serializer;
        serializer
            .mark_serializer(mark.name())
            .ok_or_else(|| SerializeError::MissingMarkRule(mark.name().clone()))
    }

    fn any_mark<F>(&self, marks: &[Mark], pred: F) -> Result<bool, SerializeError>
    where
        F: Fn(&Mark, &MarkSerializer) -> bool,
    {
        for mark in marks {
            if pred(mark, self.mark_info(mark)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn mark_string(
        &mut self,
        mark: &Mark,
        open: bool,
        parent: &Node,
        index: usize,
    ) -> Result<String, SerializeError> {
        let info = self.mark_info(mark)?;
        let delim = if open { &info.open } else { &info.close };
        Ok(match delim {
            MarkDelim::Static(s) => s.to_string(),
            MarkDelim::Dynamic(f) => f(self, mark, parent, index),
        })
    }

    /// Render list items, each wrapped with `delim` and prefixed with
    /// `first_delim(index)`.
    pub fn render_list<F>(&mut self, node: &Node, delim: &str, first_delim: F) -> Result<(), SerializeError>
    where
        F: Fn(usize) -> String,
    {
        if self
            .closed
            .as_ref()
            .is_some_and(|closed| closed.type_name() == node.type_name())
        {
            self.flush_close(3);
        } else if self.in_tight_list {
            self.flush_close(1);
        }

        let tight = node.attr("tight").and_then(|v| v.as_bool()).unwrap_or(false);
        let prev_tight = self.in_tight_list;
        self.in_tight_list = tight;
        for (index, child) in node.children().iter().enumerate() {
            if index > 0 && tight {
                self.flush_close(1);
            }
            let first = first_delim(index);
            self.wrap_block(delim, Some(&first), node, |w| w.render(child, node, index))?;
        }
        self.in_tight_list = prev_tight;
        Ok(())
    }

    /// Render a node's inline content on its own, for table cells.
    pub fn render_detached(&self, node: &Node) -> Result<String, SerializeError> {
        let mut sub = MarkdownWriter::new(self.serializer, self.escape);
        sub.render_inline(node, false)?;
        Ok(sub.out)
    }

    pub fn repeat(s: &str, n: usize) -> String {
        s.repeat(n)
    }

    /// Wrap a link title in whichever quotes it does not contain.
    pub fn quote(s: &str) -> String {
        let (open, close) = if !s.contains('"') {
            ('"', '"')
        } else if !s.contains('\'') {
            ('\'', '\'')
        } else {
            ('(', ')')
        };
        format!("{open}{s}{close}")
    }
}

fn ends_with_unescaped_bang(out: &str) -> bool {
    let mut chars = out.chars().rev();
    chars.next() == Some('!') && chars.next() != Some('\\')
}

/// Backtick fence for inline code, long enough to contain `node`'s text.
pub fn backticks_for(node: Option<&Node>, opening: bool) -> String {
    let longest = node
        .and_then(Node::text)
        .map(|text| {
            text.split(|c: char| c != '`')
                .map(str::len)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    let ticks = "`".repeat(longest + 1);
    match (longest > 0, opening) {
        (true, true) => format!("{ticks} "),
        (true, false) => format!(" {ticks}"),
        _ => ticks,
    }
}

/// Markdown for a fenced code block's opening and closing fence.
pub fn code_fence(content: &str) -> SmolStr {
    let longest = content
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    SmolStr::new("`".repeat(longest.max(2) + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_picks_free_delimiter() {
        assert_eq!(MarkdownWriter::quote("plain"), "\"plain\"");
        assert_eq!(MarkdownWriter::quote("say \"hi\""), "'say \"hi\"'");
        assert_eq!(MarkdownWriter::quote("it's \"x\""), "(it's \"x\")");
    }

    #[test]
    fn test_fences() {
        assert_eq!(code_fence("plain"), "```");
        assert_eq!(code_fence("has ``` inside"), "````");
        assert!(ends_with_unescaped_bang("look!"));
        assert!(!ends_with_unescaped_bang("look\\!"));
    }
}
