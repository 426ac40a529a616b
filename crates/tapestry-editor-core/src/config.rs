//! Editor construction options.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extension::Extension;
use crate::log::{LogSink, TracingSink};
use crate::markdown::{EscapeConfig, EscapeSettings, MarkdownOptions, TreeTransformer};
use crate::modifier::DynamicModifier;
use crate::model::Node;
use crate::schema::Schema;
use crate::state::EditorState;
use crate::transaction::Transaction;

pub type CallbackError = Box<dyn StdError + Send + Sync>;

/// Called with the state after a transaction and the transaction itself.
pub type ChangeCallback =
    Arc<dyn Fn(&EditorState, &Transaction) -> Result<(), CallbackError> + Send + Sync>;

#[derive(Clone)]
pub struct EditorConfig {
    pub initial_value: String,
    /// Composed after the base document extension, in order.
    pub extensions: Vec<Arc<dyn Extension>>,
    pub markdown: MarkdownOptions,
    pub transformers: Vec<TreeTransformer>,
    pub escape: EscapeConfig,
    /// Every dispatched transaction.
    pub on_change: Option<ChangeCallback>,
    /// Only transactions that changed the document.
    pub on_doc_change: Option<ChangeCallback>,
    pub modifiers: Vec<DynamicModifier>,
    pub log_sink: Arc<dyn LogSink>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_value: String::new(),
            extensions: Vec::new(),
            markdown: MarkdownOptions::default(),
            transformers: Vec::new(),
            escape: EscapeConfig::default(),
            on_change: None,
            on_doc_change: None,
            modifiers: Vec::new(),
            log_sink: Arc::new(TracingSink),
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from deserialised settings.
    pub fn from_settings(settings: &EditorSettings) -> Result<Self, ConfigError> {
        settings.markdown.resolve()?;
        Ok(Self {
            initial_value: settings.initial_value.clone(),
            markdown: settings.markdown.clone(),
            escape: settings.escape.compile()?,
            ..Self::default()
        })
    }

    pub fn initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = value.into();
        self
    }

    pub fn extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn extensions(mut self, extensions: impl IntoIterator<Item = Arc<dyn Extension>>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    pub fn markdown(mut self, options: MarkdownOptions) -> Self {
        self.markdown = options;
        self
    }

    pub fn transformer<F>(mut self, f: F) -> Self
    where
        F: Fn(Node, &Schema) -> Node + Send + Sync + 'static,
    {
        self.transformers.push(Arc::new(f));
        self
    }

    pub fn escape(mut self, escape: EscapeConfig) -> Self {
        self.escape = escape;
        self
    }

    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&EditorState, &Transaction) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn on_doc_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&EditorState, &Transaction) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_doc_change = Some(Arc::new(f));
        self
    }

    pub fn modifier(mut self, modifier: DynamicModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("initial_value", &self.initial_value)
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("markdown", &self.markdown)
            .field("transformers", &self.transformers.len())
            .field("escape", &self.escape)
            .field("on_change", &self.on_change.is_some())
            .field("on_doc_change", &self.on_doc_change.is_some())
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

/// The serialisable part of [`EditorConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub initial_value: String,
    pub markdown: MarkdownOptions,
    pub escape: EscapeSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings: EditorSettings = serde_json::from_str(
            r#"{
                "initial_value": "hello",
                "markdown": {"preset": "gfm", "linkify": true, "tlds": "blog"},
                "escape": {"line_start": "^[#]"}
            }"#,
        )
        .unwrap();
        let config = EditorConfig::from_settings(&settings).unwrap();
        assert_eq!(config.initial_value, "hello");
        assert_eq!(config.markdown.preset, "gfm");
        assert_eq!(config.escape.line_start.as_str(), "^[#]");
    }

    #[test]
    fn test_from_settings_rejects_unknown_preset() {
        let settings = EditorSettings {
            markdown: MarkdownOptions {
                preset: "zero".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            EditorConfig::from_settings(&settings),
            Err(ConfigError::UnknownPreset(_))
        ));
    }
}
