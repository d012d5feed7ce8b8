//! End-to-end session flows over a scripted transport and a file-backed store.

use async_trait::async_trait;
use delve_application::{
    SessionCoordinator, SubmitOutcome, Transport, TransportEvent, TransportStream, TurnPayload,
};
use delve_core::Result;
use delve_core::activity::{RawEvent, ResearchSource};
use delve_core::config::{ClientConfig, Effort};
use delve_core::room::{Message, RoomStore, RoomUpdate};
use delve_infrastructure::FileRoomRepository;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const MODEL: &str = "gemini-2.5-flash";

/// What the transport does for one submitted turn.
struct Script {
    events: Vec<TransportEvent>,
    /// Id of the answer to stream after `events`; `None` keeps the stream
    /// open and hands the sender to the test.
    answer: Option<&'static str>,
}

impl Script {
    fn complete(answer: &'static str) -> Self {
        Self {
            events: research_events(),
            answer: Some(answer),
        }
    }

    fn hold(events: Vec<TransportEvent>) -> Self {
        Self {
            events,
            answer: None,
        }
    }
}

#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    held: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    payloads: Mutex<Vec<TurnPayload>>,
}

impl ScriptedTransport {
    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    fn take_held(&self) -> mpsc::UnboundedSender<TransportEvent> {
        self.held.lock().unwrap().remove(0)
    }

    fn last_payload(&self) -> TurnPayload {
        self.payloads.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(
        &self,
        payload: TurnPayload,
        _cancel: CancellationToken,
    ) -> Result<TransportStream> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::hold(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(TransportEvent::Loading(true)).unwrap();
        for event in script.events {
            tx.send(event).unwrap();
        }
        match script.answer {
            Some(answer_id) => {
                for event in answer_events(&payload, answer_id) {
                    tx.send(event).unwrap();
                }
            }
            None => self.held.lock().unwrap().push(tx),
        }

        self.payloads.lock().unwrap().push(payload);
        Ok(rx)
    }
}

fn research_events() -> Vec<TransportEvent> {
    vec![
        TransportEvent::Update(RawEvent::generate_query(["rust async", "tokio runtime"])),
        TransportEvent::Update(RawEvent::web_research(vec![
            ResearchSource {
                label: Some("tokio.rs".to_string()),
                url: Some("https://tokio.rs".to_string()),
                title: None,
            },
            ResearchSource {
                label: Some("docs.rs".to_string()),
                url: None,
                title: None,
            },
        ])),
        TransportEvent::Update(RawEvent::reflection()),
        TransportEvent::Update(RawEvent::finalize_answer()),
    ]
}

fn answer_events(payload: &TurnPayload, answer_id: &str) -> Vec<TransportEvent> {
    let mut messages = payload.messages.clone();
    messages.push(Message::ai(answer_id, "Here is what I found."));
    vec![
        TransportEvent::Messages(messages),
        TransportEvent::Loading(false),
    ]
}

async fn open_store(dir: &Path, config: &ClientConfig) -> Arc<RoomStore> {
    let repository = Arc::new(FileRoomRepository::new(dir.join("rooms.json")));
    Arc::new(
        RoomStore::load(repository)
            .await
            .with_placeholder_title(config.placeholder_title.clone()),
    )
}

async fn setup(dir: &Path) -> (SessionCoordinator, Arc<ScriptedTransport>) {
    let config = ClientConfig::default();
    let store = open_store(dir, &config).await;
    let transport = Arc::new(ScriptedTransport::default());
    let coordinator = SessionCoordinator::new(store, transport.clone(), Arc::new(config));
    (coordinator, transport)
}

#[tokio::test]
async fn test_full_turn_is_archived_and_survives_reload() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::complete("m1"));

    let room_id = coordinator.enter().await.unwrap();
    let outcome = coordinator
        .submit_to_current_room("How does the tokio scheduler work?", Effort::Medium, MODEL)
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Dispatched { .. }));
    coordinator.join_turn(&room_id).await;

    let payload = transport.last_payload();
    assert_eq!(payload.initial_search_query_count, 3);
    assert_eq!(payload.max_research_loops, 3);

    let titles: Vec<String> = coordinator
        .historical_timeline_for("m1")
        .await
        .iter()
        .map(|event| event.title.to_string())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Generating Search Queries",
            "Web Research",
            "Reflection",
            "Finalizing Answer"
        ]
    );
    assert!(!coordinator.is_loading().await);
    assert_eq!(coordinator.activity_for("m1").await.len(), 4);

    let research = &coordinator.historical_timeline_for("m1").await[1];
    assert_eq!(
        research.data,
        "Gathered 2 sources. Related to: tokio.rs, docs.rs."
    );

    // A fresh store reads back the same rooms, timelines and current room.
    let reloaded = open_store(temp_dir.path(), &ClientConfig::default()).await;
    let room = reloaded.get(&room_id).await.unwrap();
    assert_eq!(room.title, "How does the tokio scheduler work?");
    assert_eq!(room.messages.len(), 2);
    assert_eq!(room.historical_activities["m1"].len(), 4);
    assert_eq!(room.live_snapshot_timeline.len(), 4);
    assert_eq!(reloaded.current_room_id().await.as_deref(), Some(room_id.as_str()));
    assert_eq!(
        room.updated_at,
        coordinator.store().get(&room_id).await.unwrap().updated_at
    );
}

#[tokio::test]
async fn test_next_submit_clears_live_timeline() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::complete("m1"));
    transport.push(Script::hold(Vec::new()));

    let room_id = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("first question", Effort::Low, MODEL)
        .await
        .unwrap();
    coordinator.join_turn(&room_id).await;
    assert_eq!(coordinator.live_timeline().await.len(), 4);

    coordinator
        .submit_to_current_room("second question", Effort::Low, MODEL)
        .await
        .unwrap();

    assert!(coordinator.live_timeline().await.is_empty());
    let room = coordinator.store().get(&room_id).await.unwrap();
    assert!(room.live_snapshot_timeline.is_empty());
    assert_eq!(room.historical_activities["m1"].len(), 4);
    assert_eq!(room.title, "first question");
    assert_eq!(transport.last_payload().messages.len(), 3);
}

#[tokio::test]
async fn test_switching_mid_turn_keeps_events_in_their_room() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    let mut events = research_events();
    let tail = events.split_off(2);
    transport.push(Script::hold(events));

    let room_a = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("question for A", Effort::High, MODEL)
        .await
        .unwrap();
    let payload_a = transport.last_payload();

    let room_b = coordinator.new_room().await;
    let room_b_before = coordinator.store().get(&room_b).await.unwrap();
    assert_eq!(
        coordinator.store().current_room_id().await.as_deref(),
        Some(room_b.as_str())
    );

    let tx = transport.take_held();
    for event in tail {
        tx.send(event).unwrap();
    }
    for event in answer_events(&payload_a, "a1") {
        tx.send(event).unwrap();
    }
    drop(tx);
    coordinator.join_turn(&room_a).await;

    let room_b_after = coordinator.store().get(&room_b).await.unwrap();
    assert_eq!(room_b_after, room_b_before);
    assert!(coordinator.live_timeline().await.is_empty());
    assert!(coordinator.display_messages().await.is_empty());

    let room = coordinator.store().get(&room_a).await.unwrap();
    assert_eq!(room.historical_activities["a1"].len(), 4);
    assert_eq!(room.messages.len(), 2);

    coordinator.switch_room(&room_a).await.unwrap();
    assert_eq!(coordinator.activity_for("a1").await.len(), 4);
    assert_eq!(coordinator.display_messages().await.len(), 2);
}

#[tokio::test]
async fn test_busy_room_rejects_but_other_rooms_submit() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::hold(Vec::new()));
    transport.push(Script::hold(Vec::new()));

    let room_a = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("first", Effort::Medium, MODEL)
        .await
        .unwrap();
    let busy = coordinator
        .submit_to_current_room("second", Effort::Medium, MODEL)
        .await
        .unwrap();
    assert_eq!(busy, SubmitOutcome::Busy);
    assert_eq!(coordinator.store().get(&room_a).await.unwrap().messages.len(), 1);

    coordinator.new_room().await;
    let other = coordinator
        .submit_to_current_room("elsewhere", Effort::Medium, MODEL)
        .await
        .unwrap();
    assert!(matches!(other, SubmitOutcome::Dispatched { .. }));
}

#[tokio::test]
async fn test_cancel_leaves_room_as_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::hold(Vec::new()));
    transport.push(Script::complete("m2"));

    let room_id = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("question", Effort::Medium, MODEL)
        .await
        .unwrap();
    assert!(coordinator.cancel_current_turn().await);

    let tx = transport.take_held();
    for event in research_events() {
        let _ = tx.send(event);
    }
    drop(tx);
    coordinator.join_turn(&room_id).await;

    let room = coordinator.store().get(&room_id).await.unwrap();
    assert_eq!(room.messages.len(), 1);
    assert!(room.live_snapshot_timeline.is_empty());
    assert!(room.historical_activities.is_empty());
    assert!(!coordinator.is_loading().await);

    // The room accepts a new turn right away.
    coordinator
        .submit_to_current_room("again", Effort::Medium, MODEL)
        .await
        .unwrap();
    coordinator.join_turn(&room_id).await;
    let room = coordinator.store().get(&room_id).await.unwrap();
    assert_eq!(room.historical_activities["m2"].len(), 4);
}

#[tokio::test]
async fn test_deleting_room_mid_turn_never_resurrects_it() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::hold(Vec::new()));

    let room_a = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("doomed", Effort::Medium, MODEL)
        .await
        .unwrap();
    let room_b = coordinator.new_room().await;

    assert!(coordinator.delete_room(&room_a).await);
    let tx = transport.take_held();
    for event in research_events() {
        let _ = tx.send(event);
    }
    drop(tx);

    assert!(!coordinator.store().contains(&room_a).await);
    assert!(
        !coordinator
            .store()
            .update(&room_a, RoomUpdate::title("late"))
            .await
    );
    assert!(!coordinator.store().contains(&room_a).await);
    assert_eq!(
        coordinator.store().current_room_id().await.as_deref(),
        Some(room_b.as_str())
    );
}

#[tokio::test]
async fn test_late_finalize_for_room_deleted_behind_the_turn_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, transport) = setup(temp_dir.path()).await;
    transport.push(Script::hold(Vec::new()));

    let room_a = coordinator.enter().await.unwrap();
    coordinator
        .submit_to_current_room("doomed", Effort::Medium, MODEL)
        .await
        .unwrap();
    let payload = transport.last_payload();

    // Removed straight from the store, so the turn keeps streaming.
    assert!(coordinator.store().delete(&room_a).await);
    let tx = transport.take_held();
    for event in research_events()
        .into_iter()
        .chain(answer_events(&payload, "m1"))
    {
        let _ = tx.send(event);
    }
    drop(tx);
    coordinator.join_turn(&room_a).await;

    assert!(!coordinator.store().contains(&room_a).await);
    let reloaded = open_store(temp_dir.path(), &ClientConfig::default()).await;
    assert!(!reloaded.contains(&room_a).await);
    assert!(reloaded.is_empty().await);
}

#[tokio::test]
async fn test_delete_current_room_moves_to_most_recent() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, _) = setup(temp_dir.path()).await;

    let r1 = coordinator.new_room().await;
    let r2 = coordinator.new_room().await;
    let r3 = coordinator.new_room().await;
    assert!(coordinator.rename_room(&r1, "renamed").await);

    assert!(coordinator.delete_room(&r3).await);
    assert_eq!(
        coordinator.store().current_room_id().await.as_deref(),
        Some(r1.as_str())
    );

    assert!(coordinator.delete_room(&r1).await);
    assert_eq!(
        coordinator.store().current_room_id().await.as_deref(),
        Some(r2.as_str())
    );

    assert!(coordinator.delete_room(&r2).await);
    assert!(coordinator.store().current_room_id().await.is_none());
}

#[tokio::test]
async fn test_open_room_creates_and_clear_all_persists_empty() {
    let temp_dir = TempDir::new().unwrap();
    let (coordinator, _) = setup(temp_dir.path()).await;

    coordinator.open_room("room_from_link").await.unwrap();
    coordinator.open_room("room_from_link").await.unwrap();
    assert_eq!(coordinator.store().len().await, 1);

    coordinator.clear_all_rooms().await;

    let reloaded = open_store(temp_dir.path(), &ClientConfig::default()).await;
    assert!(reloaded.is_empty().await);
    assert!(reloaded.current_room_id().await.is_none());
}

#[tokio::test]
async fn test_corrupt_storage_starts_empty_and_keeps_a_copy() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("rooms.json"), "[{ broken").unwrap();

    let (coordinator, _) = setup(temp_dir.path()).await;
    assert!(coordinator.store().is_empty().await);
    assert!(temp_dir.path().join("rooms.json.corrupt").exists());

    let room_id = coordinator.enter().await.unwrap();
    let reloaded = open_store(temp_dir.path(), &ClientConfig::default()).await;
    assert!(reloaded.contains(&room_id).await);
    assert_eq!(reloaded.get(&room_id).await.unwrap().title, "New Chat");
}
