//! Activity timeline types.
//!
//! Raw progress updates streamed by the research agent and the display-ready
//! entries they are reduced to.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Category of a timeline entry. The display title doubles as the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ActivityKind {
    #[serde(rename = "Generating Search Queries")]
    #[strum(serialize = "Generating Search Queries")]
    GeneratingQueries,
    #[serde(rename = "Web Research")]
    #[strum(serialize = "Web Research")]
    WebResearch,
    #[serde(rename = "Reflection")]
    #[strum(serialize = "Reflection")]
    Reflection,
    #[serde(rename = "Finalizing Answer")]
    #[strum(serialize = "Finalizing Answer")]
    FinalizingAnswer,
}

/// A classified, display-ready summary of one raw progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub title: ActivityKind,
    pub data: String,
}

impl ProcessedEvent {
    pub fn new(title: ActivityKind, data: impl Into<String>) -> Self {
        Self {
            title,
            data: data.into(),
        }
    }
}

/// Payload of a `generate_query` update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateQueryUpdate {
    #[serde(default)]
    pub search_query: Option<Vec<String>>,
}

/// One source gathered during web research.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Payload of a `web_research` update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebResearchUpdate {
    #[serde(default)]
    pub sources_gathered: Option<Vec<ResearchSource>>,
}

/// One progress update as streamed by the agent backend.
///
/// Exactly one field is expected to be present. `reflection` and
/// `finalize_answer` are markers whose payload is never inspected; a JSON
/// `null` counts as absent. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_query: Option<GenerateQueryUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_research: Option<WebResearchUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize_answer: Option<serde_json::Value>,
}

impl RawEvent {
    pub fn generate_query<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            generate_query: Some(GenerateQueryUpdate {
                search_query: Some(queries.into_iter().map(Into::into).collect()),
            }),
            ..Self::default()
        }
    }

    pub fn web_research(sources: Vec<ResearchSource>) -> Self {
        Self {
            web_research: Some(WebResearchUpdate {
                sources_gathered: Some(sources),
            }),
            ..Self::default()
        }
    }

    pub fn reflection() -> Self {
        Self {
            reflection: Some(serde_json::Value::Object(Default::default())),
            ..Self::default()
        }
    }

    pub fn finalize_answer() -> Self {
        Self {
            finalize_answer: Some(serde_json::Value::Object(Default::default())),
            ..Self::default()
        }
    }

    /// Name of the first recognised field, for logging.
    pub fn event_type(&self) -> &'static str {
        if self.generate_query.is_some() {
            "generate_query"
        } else if self.web_research.is_some() {
            "web_research"
        } else if self.reflection.is_some() {
            "reflection"
        } else if self.finalize_answer.is_some() {
            "finalize_answer"
        } else {
            "unknown"
        }
    }
}
