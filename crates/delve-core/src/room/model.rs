//! Room domain model.

use super::message::{Message, MessageContent};
use crate::activity::ProcessedEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current on-disk snapshot version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted conversation with the research agent.
///
/// `historical_activities` is keyed by assistant message id; every key names
/// an `ai` message present in `messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Timeline of the turn in flight (or the last one), kept so a reload
    /// mid-turn still shows progress.
    #[serde(default)]
    pub live_snapshot_timeline: Vec<ProcessedEvent>,
    #[serde(default)]
    pub historical_activities: HashMap<String, Vec<ProcessedEvent>>,
}

impl Room {
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            live_snapshot_timeline: Vec::new(),
            historical_activities: HashMap::new(),
        }
    }

    /// The newest message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages
            .iter()
            .any(|message| message.id.as_deref() == Some(message_id))
    }

    /// Merges messages reported by the transport into this room.
    ///
    /// Messages whose id is already present refresh that message's content in
    /// place; everything else is appended in the given order. Messages without
    /// an id are appended only when they extend the known history. Returns
    /// whether anything changed.
    pub fn merge_messages(&mut self, incoming: &[Message]) -> bool {
        let mut changed = false;
        for (position, message) in incoming.iter().enumerate() {
            match message.id.as_deref() {
                Some(id) => {
                    if let Some(existing) = self
                        .messages
                        .iter_mut()
                        .find(|m| m.id.as_deref() == Some(id))
                    {
                        if existing.content != message.content {
                            existing.content = message.content.clone();
                            changed = true;
                        }
                    } else {
                        self.messages.push(message.clone());
                        changed = true;
                    }
                }
                None => {
                    if position >= self.messages.len() {
                        self.messages.push(message.clone());
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

/// Derives a room title from the first user message.
///
/// Trims surrounding whitespace, then keeps at most `max_chars` characters and
/// appends `...` when truncated.
pub fn derive_title(content: &MessageContent, max_chars: usize) -> String {
    let text = content.plain_text();
    let text = text.trim();
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

/// Shallow patch applied by `RoomStore::update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomUpdate {
    pub title: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub live_snapshot_timeline: Option<Vec<ProcessedEvent>>,
    pub historical_activities: Option<HashMap<String, Vec<ProcessedEvent>>>,
}

impl RoomUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn live_snapshot_timeline(timeline: Vec<ProcessedEvent>) -> Self {
        Self {
            live_snapshot_timeline: Some(timeline),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, room: &mut Room) {
        if let Some(title) = self.title {
            room.title = title;
        }
        if let Some(messages) = self.messages {
            room.messages = messages;
        }
        if let Some(timeline) = self.live_snapshot_timeline {
            room.live_snapshot_timeline = timeline;
        }
        if let Some(activities) = self.historical_activities {
            room.historical_activities = activities;
        }
    }
}

/// Everything the store persists in one write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(default = "default_snapshot_version")]
    pub version: u32,
    #[serde(default)]
    pub current_room_id: Option<String>,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

fn default_snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for RoomSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_room_id: None,
            rooms: Vec::new(),
        }
    }
}

/// Sidebar bucket for a room's last activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecencyGroup {
    Today,
    Yesterday,
    PreviousSevenDays,
    Older,
}

impl RecencyGroup {
    pub const ALL: [RecencyGroup; 4] = [
        RecencyGroup::Today,
        RecencyGroup::Yesterday,
        RecencyGroup::PreviousSevenDays,
        RecencyGroup::Older,
    ];

    /// Buckets `at` relative to the calendar day of `now` (UTC).
    pub fn classify(at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let day = at.date_naive();
        if day >= today {
            RecencyGroup::Today
        } else if day == today - Duration::days(1) {
            RecencyGroup::Yesterday
        } else if day >= today - Duration::days(7) {
            RecencyGroup::PreviousSevenDays
        } else {
            RecencyGroup::Older
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecencyGroup::Today => "Today",
            RecencyGroup::Yesterday => "Yesterday",
            RecencyGroup::PreviousSevenDays => "Previous 7 days",
            RecencyGroup::Older => "Older",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_derive_title_truncates_on_chars() {
        let short = MessageContent::from("  What is Rust?  ");
        assert_eq!(derive_title(&short, 50), "What is Rust?");

        let long = MessageContent::from("é".repeat(60));
        let title = derive_title(&long, 50);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_timestamps_round_trip_as_rfc3339() {
        let room = Room::new("room_1", "New Chat", ts(4, 9));
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["createdAt"], "2025-03-04T09:00:00Z");
        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back.updated_at, ts(4, 9));
    }

    #[test]
    fn test_merge_messages_appends_and_refreshes() {
        let mut room = Room::new("r", "t", ts(1, 0));
        room.messages.push(Message::human("h1", "question"));

        let streamed = vec![
            Message::human("h1", "question"),
            Message::ai("a1", "partial"),
        ];
        assert!(room.merge_messages(&streamed));
        assert_eq!(room.messages.len(), 2);

        let finished = vec![
            Message::human("h1", "question"),
            Message::ai("a1", "full answer"),
        ];
        assert!(room.merge_messages(&finished));
        assert_eq!(room.messages[1].content.plain_text(), "full answer");
        assert!(!room.merge_messages(&finished));
    }

    #[test]
    fn test_recency_groups() {
        let now = ts(10, 12);
        assert_eq!(RecencyGroup::classify(ts(10, 1), now), RecencyGroup::Today);
        assert_eq!(RecencyGroup::classify(ts(9, 23), now), RecencyGroup::Yesterday);
        assert_eq!(
            RecencyGroup::classify(ts(3, 0), now),
            RecencyGroup::PreviousSevenDays
        );
        assert_eq!(RecencyGroup::classify(ts(2, 23), now), RecencyGroup::Older);
    }
}
