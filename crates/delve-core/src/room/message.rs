//! Conversation message types.
//!
//! Messages follow the agent thread wire shape: a `type` discriminator
//! (`human`, `ai`, `system`), an optional id and either plain text or a
//! list of typed content parts.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Message typed by the user.
    Human,
    /// Answer produced by the research agent.
    Ai,
    /// System-generated message.
    System,
}

/// Type tag of one content part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPartKind {
    Text,
    Image,
    ToolUse,
    ToolResult,
}

/// One element of a structured message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: ContentPartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,
}

/// Message body: a plain string or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Returns the textual portion of the content.
    ///
    /// Structured content contributes only its `text` parts, joined by newlines.
    pub fn plain_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| part.kind == ContentPartKind::Text)
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// A single message in a room's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Required for human and ai messages; keys copy actions and archived timelines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
}

impl Message {
    /// Creates a human message with the given id.
    pub fn human(id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            kind: MessageKind::Human,
            id: Some(id.into()),
            content: content.into(),
        }
    }

    /// Creates an assistant message with the given id.
    pub fn ai(id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            kind: MessageKind::Ai,
            id: Some(id.into()),
            content: content.into(),
        }
    }

    /// Creates a system message without an id.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self {
            kind: MessageKind::System,
            id: None,
            content: content.into(),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == MessageKind::Ai
    }

    /// Returns the id when this is an assistant message that carries one.
    pub fn ai_id(&self) -> Option<&str> {
        if self.is_ai() { self.id.as_deref() } else { None }
    }
}
