//! Content expressions: which children a node type may hold.
//!
//! An expression is a space separated sequence of terms. A term is a type
//! name, a group name, or a parenthesised alternation `(a | b)`, optionally
//! followed by a quantifier: `*`, `+`, `?`, `{n}`, `{n,}` or `{n,m}`.
//!
//! Matching is greedy and left to right. A child is consumed by the current
//! term while that term still has room; otherwise the matcher moves on once
//! the term's minimum is satisfied.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while parsing a content expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentExprError {
    #[error("unexpected character {ch:?} at byte {at}")]
    UnexpectedChar { ch: char, at: usize },

    #[error("unknown node type or group {0:?}")]
    UnknownName(SmolStr),

    #[error("unclosed parenthesis")]
    UnclosedParen,

    #[error("malformed quantifier at byte {0}")]
    BadQuantifier(usize),
}

/// One term of a content expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTerm {
    /// Node type names this term accepts (groups are already expanded).
    pub types: Vec<SmolStr>,
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

impl ContentTerm {
    fn accepts(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    fn has_room(&self, count: usize) -> bool {
        self.max.is_none_or(|max| count < max)
    }
}

/// A compiled content expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentExpr {
    source: SmolStr,
    terms: Vec<ContentTerm>,
}

impl ContentExpr {
    /// Parse an expression, resolving names through `resolve`.
    ///
    /// `resolve` returns the node type names a name stands for: a single
    /// type, or every member of a group. `None` marks an unknown name.
    pub fn parse<F>(source: &str, resolve: F) -> Result<Self, ContentExprError>
    where
        F: Fn(&str) -> Option<Vec<SmolStr>>,
    {
        let mut terms = Vec::new();
        let bytes: Vec<(usize, char)> = source.char_indices().collect();
        let mut i = 0;

        while i < bytes.len() {
            let (at, ch) = bytes[i];
            if ch.is_whitespace() {
                i += 1;
                continue;
            }

            let mut types = Vec::new();
            if ch == '(' {
                i += 1;
                let mut closed = false;
                while i < bytes.len() {
                    let (at, ch) = bytes[i];
                    if ch.is_whitespace() || ch == '|' {
                        i += 1;
                    } else if ch == ')' {
                        i += 1;
                        closed = true;
                        break;
                    } else if is_name_char(ch) {
                        let (name, next) = read_name(&bytes, i);
                        i = next;
                        push_resolved(&mut types, &name, &resolve)?;
                    } else {
                        return Err(ContentExprError::UnexpectedChar { ch, at });
                    }
                }
                if !closed {
                    return Err(ContentExprError::UnclosedParen);
                }
            } else if is_name_char(ch) {
                let (name, next) = read_name(&bytes, i);
                i = next;
                push_resolved(&mut types, &name, &resolve)?;
            } else {
                return Err(ContentExprError::UnexpectedChar { ch, at });
            }

            let (min, max, next) = read_quantifier(&bytes, i)?;
            i = next;
            terms.push(ContentTerm { types, min, max });
        }

        Ok(Self {
            source: SmolStr::new(source),
            terms,
        })
    }

    /// The expression text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn terms(&self) -> &[ContentTerm] {
        &self.terms
    }

    /// True when the expression accepts no children at all (a leaf).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether any term accepts a type satisfying `pred`.
    pub fn accepts_any(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.terms.iter().flat_map(|t| t.types.iter()).any(|t| pred(t))
    }

    /// Matcher state before any child has been consumed.
    pub fn start(&self) -> ContentMatch {
        ContentMatch { term: 0, count: 0 }
    }

    /// Match a whole child sequence from the start.
    pub fn match_sequence<'a, I>(&self, names: I) -> Option<ContentMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .try_fold(self.start(), |state, name| state.match_type(self, name))
    }
}

/// Matcher position inside a [`ContentExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentMatch {
    term: usize,
    count: usize,
}

impl ContentMatch {
    /// Consume one child of type `name`, or `None` when it does not fit.
    pub fn match_type(self, expr: &ContentExpr, name: &str) -> Option<ContentMatch> {
        let mut term = self.term;
        let mut count = self.count;
        while let Some(current) = expr.terms.get(term) {
            if current.accepts(name) && current.has_room(count) {
                return Some(ContentMatch {
                    term,
                    count: count + 1,
                });
            }
            if count < current.min {
                return None;
            }
            term += 1;
            count = 0;
        }
        None
    }

    /// Types that must be inserted before a child of type `name` can be
    /// matched. Empty when it fits right away, `None` when it never fits.
    pub fn fill_before(self, expr: &ContentExpr, name: &str) -> Option<Vec<SmolStr>> {
        let mut missing = Vec::new();
        let mut count = self.count;
        for term in expr.terms.iter().skip(self.term) {
            if term.accepts(name) && term.has_room(count) {
                return Some(missing);
            }
            if count < term.min {
                let first = term.types.first()?;
                missing.extend(std::iter::repeat_n(first.clone(), term.min - count));
            }
            count = 0;
        }
        None
    }

    /// Whether the sequence matched so far is complete.
    pub fn valid_end(self, expr: &ContentExpr) -> bool {
        self.fill_end(expr).is_some_and(|missing| missing.is_empty())
    }

    /// Types that must be appended to reach a valid end, cheapest first.
    ///
    /// Each unsatisfied term contributes its first accepted type as many
    /// times as it is short of its minimum.
    pub fn fill_end(self, expr: &ContentExpr) -> Option<Vec<SmolStr>> {
        let mut missing = Vec::new();
        for (index, term) in expr.terms.iter().enumerate().skip(self.term) {
            let have = if index == self.term { self.count } else { 0 };
            if have < term.min {
                let first = term.types.first()?;
                missing.extend(std::iter::repeat_n(first.clone(), term.min - have));
            }
        }
        Some(missing)
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn read_name(bytes: &[(usize, char)], mut i: usize) -> (String, usize) {
    let mut name = String::new();
    while let Some(&(_, ch)) = bytes.get(i) {
        if !is_name_char(ch) {
            break;
        }
        name.push(ch);
        i += 1;
    }
    (name, i)
}

fn push_resolved<F>(types: &mut Vec<SmolStr>, name: &str, resolve: &F) -> Result<(), ContentExprError>
where
    F: Fn(&str) -> Option<Vec<SmolStr>>,
{
    let resolved = resolve(name).ok_or_else(|| ContentExprError::UnknownName(name.into()))?;
    for t in resolved {
        if !types.contains(&t) {
            types.push(t);
        }
    }
    Ok(())
}

fn read_number(bytes: &[(usize, char)], mut i: usize) -> (Option<usize>, usize) {
    let mut digits = String::new();
    while let Some(&(_, ch)) = bytes.get(i) {
        if !ch.is_ascii_digit() {
            break;
        }
        digits.push(ch);
        i += 1;
    }
    (digits.parse().ok(), i)
}

fn read_quantifier(
    bytes: &[(usize, char)],
    i: usize,
) -> Result<(usize, Option<usize>, usize), ContentExprError> {
    let Some(&(at, ch)) = bytes.get(i) else {
        return Ok((1, Some(1), i));
    };
    match ch {
        '*' => Ok((0, None, i + 1)),
        '+' => Ok((1, None, i + 1)),
        '?' => Ok((0, Some(1), i + 1)),
        '{' => {
            let (min, mut next) = read_number(bytes, i + 1);
            let min = min.ok_or(ContentExprError::BadQuantifier(at))?;
            let mut max = Some(min);
            if let Some(&(_, ',')) = bytes.get(next) {
                let (upper, after) = read_number(bytes, next + 1);
                max = upper;
                next = after;
            }
            match bytes.get(next) {
                Some(&(_, '}')) => {}
                _ => return Err(ContentExprError::BadQuantifier(at)),
            }
            if max.is_some_and(|max| max < min) {
                return Err(ContentExprError::BadQuantifier(at));
            }
            Ok((min, max, next + 1))
        }
        _ => Ok((1, Some(1), i)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Option<Vec<SmolStr>> {
        match name {
            "block" => Some(vec!["paragraph".into(), "heading".into()]),
            "inline" => Some(vec!["text".into(), "image".into()]),
            "paragraph" | "heading" | "text" | "image" | "list_item" => Some(vec![name.into()]),
            _ => None,
        }
    }

    #[test]
    fn test_block_plus() {
        let expr = ContentExpr::parse("block+", resolve).unwrap();
        assert!(!expr.start().valid_end(&expr));
        let state = expr.match_sequence(["paragraph", "heading"]).unwrap();
        assert!(state.valid_end(&expr));
        assert!(expr.match_sequence(["text"]).is_none());
    }

    #[test]
    fn test_sequence_with_leading_required() {
        let expr = ContentExpr::parse("paragraph block*", resolve).unwrap();
        assert!(expr.match_sequence(["heading"]).is_none());
        let state = expr
            .match_sequence(["paragraph", "paragraph", "heading"])
            .unwrap();
        assert!(state.valid_end(&expr));
    }

    #[test]
    fn test_alternation_and_ranges() {
        let expr = ContentExpr::parse("(paragraph | heading){1,2}", resolve).unwrap();
        assert!(expr.match_sequence(["heading", "paragraph"]).is_some());
        assert!(expr.match_sequence(["heading", "paragraph", "heading"]).is_none());
    }

    #[test]
    fn test_fill_end_reports_missing() {
        let expr = ContentExpr::parse("paragraph block*", resolve).unwrap();
        let missing = expr.start().fill_end(&expr).unwrap();
        assert_eq!(missing, vec![SmolStr::new("paragraph")]);
    }

    #[test]
    fn test_fill_before() {
        let expr = ContentExpr::parse("paragraph block*", resolve).unwrap();
        assert_eq!(
            expr.start().fill_before(&expr, "heading"),
            Some(vec![SmolStr::new("paragraph")])
        );
        assert_eq!(expr.start().fill_before(&expr, "paragraph"), Some(vec![]));
        assert_eq!(expr.start().fill_before(&expr, "text"), None);
    }

    #[test]
    fn test_empty_is_leaf() {
        let expr = ContentExpr::parse("", resolve).unwrap();
        assert!(expr.is_empty());
        assert!(expr.start().valid_end(&expr));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            ContentExpr::parse("nope*", resolve),
            Err(ContentExprError::UnknownName("nope".into()))
        );
        assert_eq!(
            ContentExpr::parse("(paragraph", resolve),
            Err(ContentExprError::UnclosedParen)
        );
        assert!(matches!(
            ContentExpr::parse("paragraph{3,1}", resolve),
            Err(ContentExprError::BadQuantifier(_))
        ));
    }
}
