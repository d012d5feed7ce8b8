//! Client configuration.
//!
//! Loaded from `config.toml`; every field has a default so a missing or
//! partial file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PLACEHOLDER_TITLE: &str = "New Chat";
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// User-selectable search-depth preset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Effort {
    Low,
    #[default]
    Medium,
    High,
}

/// Search parameters sent to the agent for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDepth {
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
}

impl SearchDepth {
    pub const fn new(initial_search_query_count: u32, max_research_loops: u32) -> Self {
        Self {
            initial_search_query_count,
            max_research_loops,
        }
    }
}

/// Effort → search-depth mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortTable {
    pub low: SearchDepth,
    pub medium: SearchDepth,
    pub high: SearchDepth,
}

impl Default for EffortTable {
    fn default() -> Self {
        Self {
            low: SearchDepth::new(1, 1),
            medium: SearchDepth::new(3, 3),
            high: SearchDepth::new(5, 10),
        }
    }
}

impl EffortTable {
    pub fn depth(&self, effort: Effort) -> SearchDepth {
        match effort {
            Effort::Low => self.low,
            Effort::Medium => self.medium,
            Effort::High => self.high,
        }
    }
}

/// A reasoning model the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub default_model: String,
    pub default_effort: Effort,
    pub efforts: EffortTable,
    #[serde(rename = "model")]
    pub models: Vec<ModelOption>,
    /// Title given to new rooms until the first message names them.
    pub placeholder_title: String,
    /// Characters kept when deriving a title from the first message.
    pub title_max_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            default_effort: Effort::default(),
            efforts: EffortTable::default(),
            models: vec![ModelOption {
                value: DEFAULT_MODEL.to_string(),
                label: "Gemini 2.5 Flash".to_string(),
                disabled: false,
            }],
            placeholder_title: DEFAULT_PLACEHOLDER_TITLE.to_string(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

impl ClientConfig {
    /// Returns `requested` when it names an enabled model, else the default model.
    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        let enabled = self
            .models
            .iter()
            .any(|model| model.value == requested && !model.disabled);
        if enabled {
            requested
        } else {
            tracing::warn!(
                "[ClientConfig] Model '{}' is unknown or disabled, using '{}'",
                requested,
                self.default_model
            );
            &self.default_model
        }
    }
}
