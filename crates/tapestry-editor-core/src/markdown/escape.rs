//! Text escaping policy for the serializer.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Characters escaped anywhere in text.
pub const DEFAULT_COMMON_PATTERN: &str = r"[`*\\~\[\]_]";
/// Constructs escaped only at the start of a line.
pub const DEFAULT_LINE_START_PATTERN: &str = r"^(?:[#\-*+>]|\d+\.)";

static DEFAULT_COMMON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_COMMON_PATTERN).expect("default common escape pattern"));
static DEFAULT_LINE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_LINE_START_PATTERN).expect("default line-start escape pattern")
});

/// Compiled escape patterns.
#[derive(Debug, Clone)]
pub struct EscapeConfig {
    pub common: Regex,
    pub line_start: Regex,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            common: DEFAULT_COMMON.clone(),
            line_start: DEFAULT_LINE_START.clone(),
        }
    }
}

impl EscapeConfig {
    /// Unset patterns fall back to the defaults.
    pub fn new(common: Option<Regex>, line_start: Option<Regex>) -> Self {
        Self {
            common: common.unwrap_or_else(|| DEFAULT_COMMON.clone()),
            line_start: line_start.unwrap_or_else(|| DEFAULT_LINE_START.clone()),
        }
    }

    /// Escape `text`. `line_start` also applies the line-start pattern.
    pub fn escape<'a>(&self, text: &'a str, line_start: bool) -> Cow<'a, str> {
        let mut out = self.escape_common(text);
        if line_start
            && let Some(m) = self.line_start.find(&out)
            && m.start() == 0
            && let Some(offset) = m.as_str().find(|c: char| c.is_ascii_punctuation())
        {
            let mut escaped = String::with_capacity(out.len() + 1);
            escaped.push_str(&out[..offset]);
            escaped.push('\\');
            escaped.push_str(&out[offset..]);
            out = Cow::Owned(escaped);
        }
        out
    }

    fn escape_common<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = String::new();
        let mut last = 0;
        for m in self.common.find_iter(text) {
            if m.is_empty() || (m.as_str() == "_" && is_intraword(text, m.start(), m.end())) {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            out.push('\\');
            out.push_str(m.as_str());
            last = m.end();
        }
        if last == 0 {
            return Cow::Borrowed(text);
        }
        out.push_str(&text[last..]);
        Cow::Owned(out)
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_intraword(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(is_word) && after.is_some_and(is_word)
}

/// Escape patterns as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeSettings {
    pub common: Option<String>,
    pub line_start: Option<String>,
}

impl EscapeSettings {
    pub fn compile(&self) -> Result<EscapeConfig, ConfigError> {
        let common = self
            .common
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| ConfigError::InvalidPattern {
                which: "common",
                source,
            })?;
        let line_start = self
            .line_start
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| ConfigError::InvalidPattern {
                which: "line-start",
                source,
            })?;
        Ok(EscapeConfig::new(common, line_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_escapes() {
        let config = EscapeConfig::default();
        assert_eq!(config.escape("a *b* [c]", false), r"a \*b\* \[c\]");
        assert_eq!(config.escape("snake_case_name", false), "snake_case_name");
        assert_eq!(config.escape("_lead", false), r"\_lead");
        assert!(matches!(config.escape("plain", false), Cow::Borrowed(_)));
    }

    #[test]
    fn test_line_start_escapes() {
        let config = EscapeConfig::default();
        assert_eq!(config.escape("# not a heading", true), r"\# not a heading");
        assert_eq!(config.escape("1. not a list", true), r"1\. not a list");
        assert_eq!(config.escape("- item", true), r"\- item");
        assert_eq!(config.escape("# mid line", false), "# mid line");
        assert_eq!(config.escape("*x", true), r"\*x");
    }

    #[test]
    fn test_settings_compile() {
        let settings: EscapeSettings = serde_json::from_str(r#"{"common": "[*]"}"#).unwrap();
        let config = settings.compile().unwrap();
        assert_eq!(config.escape("[*]", false), r"[\*]");

        let bad = EscapeSettings {
            line_start: Some("(".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad.compile(),
            Err(ConfigError::InvalidPattern { which: "line-start", .. })
        ));
    }
}
