//! Tokenizer presets and options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ConfigError;

/// Top-level domains recognised for bare-domain links, in addition to every
/// two-letter country code.
pub const DEFAULT_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "info", "biz", "io", "dev", "app",
];

/// Which markdown constructs the tokenizer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    /// CommonMark plus strikethrough.
    #[default]
    Default,
    /// Strict CommonMark.
    CommonMark,
    /// CommonMark plus strikethrough, tables and task lists.
    Gfm,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::CommonMark => "commonmark",
            Preset::Gfm => "gfm",
        }
    }

    pub(crate) fn cmark_options(self) -> pulldown_cmark::Options {
        use pulldown_cmark::Options;
        match self {
            Preset::Default => Options::ENABLE_STRIKETHROUGH,
            Preset::CommonMark => Options::empty(),
            Preset::Gfm => {
                Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS
            }
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "commonmark" => Ok(Preset::CommonMark),
            "gfm" => Ok(Preset::Gfm),
            _ => Err(ConfigError::UnknownPreset(s.into())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One TLD or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TldList {
    One(SmolStr),
    Many(Vec<SmolStr>),
}

impl Default for TldList {
    fn default() -> Self {
        TldList::Many(DEFAULT_TLDS.iter().map(|t| SmolStr::new(t)).collect())
    }
}

impl TldList {
    /// Lowercased entries without leading dots.
    pub fn to_vec(&self) -> Vec<SmolStr> {
        let raw: Vec<&SmolStr> = match self {
            TldList::One(tld) => vec![tld],
            TldList::Many(tlds) => tlds.iter().collect(),
        };
        raw.into_iter()
            .map(|t| SmolStr::new(t.trim_start_matches('.').to_ascii_lowercase()))
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Markdown options as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub preset: SmolStr,
    /// Pass raw HTML through as `html_block` / `html_inline` tokens.
    pub html: bool,
    /// Turn bare URLs into links. Also turns soft breaks into hard breaks.
    pub linkify: bool,
    pub tlds: TldList,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            preset: SmolStr::new_static("default"),
            html: false,
            linkify: false,
            tlds: TldList::default(),
        }
    }
}

impl MarkdownOptions {
    /// Validate into tokenizer options.
    pub fn resolve(&self) -> Result<ParserOptions, ConfigError> {
        Ok(ParserOptions {
            preset: self.preset.parse()?,
            html: self.html,
            linkify: self.linkify,
            breaks: self.linkify,
            tlds: self.tlds.to_vec(),
        })
    }
}

/// Resolved tokenizer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub preset: Preset,
    pub html: bool,
    pub linkify: bool,
    /// Soft line breaks become `hardbreak` tokens.
    pub breaks: bool,
    pub tlds: Vec<SmolStr>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            preset: Preset::Default,
            html: false,
            linkify: false,
            breaks: false,
            tlds: TldList::default().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!("GFM".parse::<Preset>().unwrap(), Preset::Gfm);
        assert_eq!("commonmark".parse::<Preset>().unwrap(), Preset::CommonMark);
        assert!(matches!(
            "zero".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(name)) if name == "zero"
        ));
    }

    #[test]
    fn test_tlds_string_or_list() {
        let one: MarkdownOptions = serde_json::from_str(r#"{"tlds": ".Social"}"#).unwrap();
        assert_eq!(one.tlds.to_vec(), vec![SmolStr::new("social")]);
        let many: MarkdownOptions =
            serde_json::from_str(r#"{"tlds": ["com", "blog"], "linkify": true}"#).unwrap();
        assert_eq!(many.tlds.to_vec().len(), 2);
        assert_eq!(many.preset, "default");
    }

    #[test]
    fn test_linkify_forces_breaks() {
        let options = MarkdownOptions {
            linkify: true,
            ..Default::default()
        };
        let resolved = options.resolve().unwrap();
        assert!(resolved.breaks);
        assert!(!MarkdownOptions::default().resolve().unwrap().breaks);
    }
}
