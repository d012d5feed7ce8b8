//! Reduces raw agent progress updates to timeline entries.

use super::model::{ActivityKind, ProcessedEvent, RawEvent, ResearchSource};

const REFLECTION_DATA: &str = "Analysing Web Research Results";
const FINALIZE_DATA: &str = "Composing and presenting the final answer.";
const NO_LABELS: &str = "N/A";
const MAX_SOURCE_LABELS: usize = 3;

/// Result of classifying one raw event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// The timeline entry, if the event carried a recognised field.
    pub event: Option<ProcessedEvent>,
    /// Set when the event marks the end of the turn (`finalize_answer`).
    pub terminal: bool,
}

/// Classifies one raw event.
///
/// Priority when several fields are present:
/// `generate_query` > `web_research` > `reflection` > `finalize_answer`.
/// Events with none of them yield no entry.
pub fn classify(event: &RawEvent) -> Classification {
    if let Some(update) = &event.generate_query {
        let data = update
            .search_query
            .as_deref()
            .map(|queries| queries.join(", "))
            .unwrap_or_default();
        return entry(ActivityKind::GeneratingQueries, data);
    }

    if let Some(update) = &event.web_research {
        let sources = update.sources_gathered.as_deref().unwrap_or_default();
        return entry(ActivityKind::WebResearch, summarize_sources(sources));
    }

    if event.reflection.is_some() {
        return entry(ActivityKind::Reflection, REFLECTION_DATA);
    }

    if event.finalize_answer.is_some() {
        return Classification {
            event: Some(ProcessedEvent::new(
                ActivityKind::FinalizingAnswer,
                FINALIZE_DATA,
            )),
            terminal: true,
        };
    }

    Classification::default()
}

fn entry(kind: ActivityKind, data: impl Into<String>) -> Classification {
    Classification {
        event: Some(ProcessedEvent::new(kind, data)),
        terminal: false,
    }
}

fn summarize_sources(sources: &[ResearchSource]) -> String {
    let mut labels: Vec<&str> = Vec::with_capacity(MAX_SOURCE_LABELS);
    for label in sources
        .iter()
        .filter_map(|source| source.label.as_deref())
        .filter(|label| !label.is_empty())
    {
        if labels.len() == MAX_SOURCE_LABELS {
            break;
        }
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    let related = if labels.is_empty() {
        NO_LABELS.to_string()
    } else {
        labels.join(", ")
    };

    format!("Gathered {} sources. Related to: {}.", sources.len(), related)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(label: &str) -> ResearchSource {
        ResearchSource {
            label: Some(label.to_string()),
            ..ResearchSource::default()
        }
    }

    #[test]
    fn test_generate_query_joins_queries() {
        let result = classify(&RawEvent::generate_query(["rust async", "tokio mpsc"]));
        let event = result.event.unwrap();
        assert_eq!(event.title, ActivityKind::GeneratingQueries);
        assert_eq!(event.data, "rust async, tokio mpsc");
        assert!(!result.terminal);
    }

    #[test]
    fn test_generate_query_without_queries_is_empty_string() {
        let raw: RawEvent = serde_json::from_str(r#"{"generate_query": {}}"#).unwrap();
        assert_eq!(classify(&raw).event.unwrap().data, "");
    }

    #[test]
    fn test_web_research_dedups_and_caps_labels() {
        let sources = vec![
            source("docs.rs"),
            source(""),
            source("docs.rs"),
            ResearchSource::default(),
            source("tokio.rs"),
            source("github.com"),
            source("crates.io"),
        ];
        let event = classify(&RawEvent::web_research(sources)).event.unwrap();
        assert_eq!(event.title, ActivityKind::WebResearch);
        assert_eq!(
            event.data,
            "Gathered 7 sources. Related to: docs.rs, tokio.rs, github.com."
        );
    }

    #[test]
    fn test_web_research_without_labels_uses_placeholder() {
        let raw: RawEvent = serde_json::from_str(r#"{"web_research": {}}"#).unwrap();
        assert_eq!(
            classify(&raw).event.unwrap().data,
            "Gathered 0 sources. Related to: N/A."
        );
    }

    #[test]
    fn test_finalize_is_terminal() {
        let result = classify(&RawEvent::finalize_answer());
        assert!(result.terminal);
        assert_eq!(result.event.unwrap().title, ActivityKind::FinalizingAnswer);
    }

    #[test]
    fn test_unknown_event_yields_nothing() {
        let raw: RawEvent = serde_json::from_str(r#"{"something_else": {"x": 1}}"#).unwrap();
        assert_eq!(classify(&raw), Classification::default());
    }

    #[test]
    fn test_priority_when_several_fields_present() {
        let mut raw = RawEvent::finalize_answer();
        raw.reflection = RawEvent::reflection().reflection;
        raw.web_research = RawEvent::web_research(vec![]).web_research;
        let result = classify(&raw);
        assert_eq!(result.event.unwrap().title, ActivityKind::WebResearch);
        assert!(!result.terminal);
    }
}
