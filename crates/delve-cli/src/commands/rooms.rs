use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use delve_core::room::{MessageKind, RecencyGroup, Room, RoomStore, RoomUpdate};
use delve_infrastructure::{ConfigService, DelvePaths, FileRoomRepository};
use std::fmt::Write as _;
use std::sync::Arc;

/// Opens the persisted room collection.
pub async fn open(paths: &DelvePaths) -> Result<RoomStore> {
    let config = ConfigService::new(paths.clone()).get_config();
    let repository =
        FileRoomRepository::from_paths(paths).context("Failed to resolve rooms file")?;
    tracing::debug!("[Cli] Opening rooms at {}", repository.file_path().display());
    Ok(RoomStore::load(Arc::new(repository))
        .await
        .with_placeholder_title(config.placeholder_title))
}

pub async fn list(store: &RoomStore) -> Result<()> {
    let groups = store.grouped_by_recency(Utc::now()).await;
    let current = store.current_room_id().await;
    print!("{}", render_list(&groups, current.as_deref()));
    Ok(())
}

pub async fn show(store: &RoomStore, room_id: &str) -> Result<()> {
    let room = store
        .get(room_id)
        .await
        .with_context(|| format!("Room '{}' not found", room_id))?;
    print!("{}", render_room(&room));
    Ok(())
}

pub async fn rename(store: &RoomStore, room_id: &str, title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("Title must not be blank");
    }
    if !store.update(room_id, RoomUpdate::title(title)).await {
        anyhow::bail!("Room '{}' not found", room_id);
    }
    println!("{}", format!("Renamed {} to \"{}\"", room_id, title).green());
    Ok(())
}

pub async fn delete(store: &RoomStore, room_id: &str) -> Result<()> {
    if !store.delete(room_id).await {
        anyhow::bail!("Room '{}' not found", room_id);
    }
    println!("{}", format!("Deleted {}", room_id).green());
    if let Some(current) = store.current_room_id().await {
        println!("Current room is now {}", current);
    }
    Ok(())
}

pub async fn clear(store: &RoomStore, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to delete every room without --yes");
    }
    let count = store.len().await;
    store.clear().await;
    println!("{}", format!("Deleted {} rooms", count).green());
    Ok(())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn render_list(groups: &[(RecencyGroup, Vec<Room>)], current: Option<&str>) -> String {
    if groups.is_empty() {
        return format!("{}\n", "No rooms yet".bright_black());
    }

    let mut out = String::new();
    for (group, rooms) in groups {
        let _ = writeln!(out, "{}", group.label().bold());
        for room in rooms {
            let marker = if current == Some(room.id.as_str()) {
                "*".green().to_string()
            } else {
                " ".to_string()
            };
            let _ = writeln!(
                out,
                "{} {}  {}  {}",
                marker,
                room.id.bright_black(),
                room.title,
                format!(
                    "({} messages, {})",
                    room.messages.len(),
                    format_time(room.updated_at)
                )
                .bright_black()
            );
        }
    }
    out
}

fn render_room(room: &Room) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", room.title.bold());
    let _ = writeln!(
        out,
        "{}",
        format!(
            "{} · created {} · updated {}",
            room.id,
            format_time(room.created_at),
            format_time(room.updated_at)
        )
        .bright_black()
    );

    for message in &room.messages {
        let _ = writeln!(out);
        let author = match message.kind {
            MessageKind::Human => "[you]".bright_blue(),
            MessageKind::Ai => "[agent]".bright_magenta(),
            MessageKind::System => "[system]".bright_black(),
        };
        let _ = writeln!(out, "{}", author);
        let _ = writeln!(out, "{}", message.content.plain_text());

        if let Some(activity) = message
            .ai_id()
            .and_then(|id| room.historical_activities.get(id))
        {
            for event in activity {
                let _ = writeln!(
                    out,
                    "  {}",
                    format!("- {}: {}", event.title, event.data).yellow()
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::activity::{ActivityKind, ProcessedEvent};
    use delve_core::room::Message;

    #[tokio::test]
    async fn test_rename_and_delete_against_file_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let paths = DelvePaths::new(Some(temp_dir.path().to_path_buf()));
        let store = open(&paths).await.unwrap();
        let room_id = store.create(None, None).await;

        assert!(rename(&store, &room_id, "   ").await.is_err());
        rename(&store, &room_id, " Tokio notes ").await.unwrap();
        assert_eq!(store.get(&room_id).await.unwrap().title, "Tokio notes");

        let reopened = open(&paths).await.unwrap();
        assert_eq!(reopened.get(&room_id).await.unwrap().title, "Tokio notes");

        delete(&reopened, &room_id).await.unwrap();
        assert!(delete(&reopened, &room_id).await.is_err());
        assert!(clear(&reopened, false).await.is_err());
    }

    #[test]
    fn test_render_room_includes_archived_activity() {
        colored::control::set_override(false);
        let mut room = Room::new("room_1", "Rust", Utc::now());
        room.messages.push(Message::human("h1", "What is Rust?"));
        room.messages.push(Message::ai("a1", "A language."));
        room.historical_activities.insert(
            "a1".to_string(),
            vec![ProcessedEvent::new(ActivityKind::Reflection, "thinking")],
        );

        let out = render_room(&room);
        assert!(out.contains("[you]"));
        assert!(out.contains("A language."));
        assert!(out.contains("- Reflection: thinking"));
    }

    #[test]
    fn test_render_list_marks_current() {
        colored::control::set_override(false);
        let room = Room::new("room_1", "Rust", Utc::now());
        let out = render_list(&[(RecencyGroup::Today, vec![room])], Some("room_1"));
        assert!(out.starts_with("Today\n"));
        assert!(out.contains("* room_1  Rust"));

        assert!(render_list(&[], None).contains("No rooms yet"));
    }
}
