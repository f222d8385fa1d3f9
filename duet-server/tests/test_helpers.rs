use duet_core::{QuestionBank, QuestionProvider};
use duet_persistence::{MemoryStore, RoomRepository};
use duet_server::config::{SessionConfig, SessionTimings};
use duet_server::session::SessionCoordinator;
use duet_server::websocket::connection::{ConnectionId, ConnectionManager};
use duet_types::{AnswerChoices, Question, QuestionText, Room, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const CATEGORY: &str = "pets";

/// Creates a fixed-choice question in the test category
pub fn choice_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: QuestionText::Plain(format!("Favourite pet? ({})", id)),
        category: CATEGORY.to_string(),
        have_answers: true,
        answers: Some(AnswerChoices {
            en: vec!["Cat".to_string(), "Dog".to_string()],
            tr: vec!["Kedi".to_string(), "Köpek".to_string()],
            es: vec!["Gato".to_string(), "Perro".to_string()],
        }),
    }
}

fn test_question_bank() -> Arc<dyn QuestionProvider> {
    let questions = (1..=5).map(|i| choice_question(&format!("q{}", i))).collect();
    Arc::new(QuestionBank::from_questions(questions))
}

/// Timings long enough that no timer fires during a test
pub fn idle_timings() -> SessionTimings {
    SessionTimings {
        answer_duration: Duration::from_secs(600),
        answer_grace: Duration::from_secs(0),
        result_display: Duration::from_secs(600),
        finish_delay: Duration::from_secs(600),
        auto_reset: Duration::from_secs(600),
    }
}

/// Every delay after a round set to `ms` milliseconds. The answer window
/// stays long so tests can answer without racing the timeout.
pub fn fast_timings(ms: u64) -> SessionTimings {
    let delay = Duration::from_millis(ms);
    SessionTimings {
        answer_duration: Duration::from_secs(600),
        answer_grace: Duration::from_millis(0),
        result_display: delay,
        finish_delay: delay,
        auto_reset: delay,
    }
}

/// A connected test client and the events sent to it
pub struct TestClient {
    pub id: String,
    pub connection_id: ConnectionId,
    receiver: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    /// Everything received so far
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    pub fn drain_events(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerMessage::event_name).collect()
    }

    pub async fn next_message(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(2), self.receiver.recv())
            .await
            .expect("Timed out waiting for a server message")
            .expect("Connection channel closed")
    }

    /// Skips messages until one with the given event name arrives
    pub async fn wait_for(&mut self, event: &str) -> ServerMessage {
        loop {
            let message = self.next_message().await;
            if message.event_name() == event {
                return message;
            }
        }
    }
}

/// Test setup that provides all necessary components
pub struct TestSessionSetup {
    pub connection_manager: Arc<ConnectionManager>,
    pub store: Arc<MemoryStore>,
    pub coordinator: Arc<SessionCoordinator>,
}

impl TestSessionSetup {
    pub fn new() -> Self {
        Self::with_timings(idle_timings())
    }

    pub fn with_timings(timings: SessionTimings) -> Self {
        Self::with_config(SessionConfig {
            timings,
            total_questions: 3,
            chat_min_interval: Duration::from_millis(0),
            ..SessionConfig::default()
        })
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let store = Arc::new(MemoryStore::new());
        let repository = RoomRepository::new(store.clone(), Duration::from_secs(60));
        let coordinator = SessionCoordinator::new(
            connection_manager.clone(),
            repository,
            test_question_bank(),
            config,
        );

        Self {
            connection_manager,
            store,
            coordinator,
        }
    }

    pub async fn connect(&self) -> TestClient {
        let connection_id = ConnectionId::new();
        let receiver = self
            .connection_manager
            .create_connection(connection_id)
            .await;

        TestClient {
            id: connection_id.to_string(),
            connection_id,
            receiver,
        }
    }

    /// Host creates a room and a guest joins it. Setup events are drained.
    pub async fn create_full_room(&self) -> (TestClient, TestClient, Room) {
        let mut host = self.connect().await;
        let mut guest = self.connect().await;

        let room = self
            .coordinator
            .create_room(&host.id, "Alice", "fox", CATEGORY)
            .await
            .expect("room is created");
        let room = self
            .coordinator
            .join_room(&guest.id, &room.room_code, "Bob", "owl")
            .await
            .expect("guest joins");

        host.drain();
        guest.drain();
        (host, guest, room)
    }

    /// Full room with the game started. Setup events are drained.
    pub async fn create_started_room(&self) -> (TestClient, TestClient, Room) {
        let (mut host, mut guest, room) = self.create_full_room().await;
        let room = self
            .coordinator
            .start_game(&host.id, &room.room_code)
            .await
            .expect("game starts");

        host.drain();
        guest.drain();
        (host, guest, room)
    }

    pub async fn stored_room(&self, code: &str) -> Option<Room> {
        self.coordinator
            .room_snapshot(code)
            .await
            .expect("store is reachable")
    }
}

/// Current question id of a started room
pub fn current_question_id(room: &Room) -> String {
    room.current_round
        .as_ref()
        .expect("round is active")
        .question
        .id
        .clone()
}
