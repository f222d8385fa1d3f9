use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Player, PlayerId, Question, QuestionRound, Room, RoomCode, SubmittedAnswer};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[ts(export)]
pub enum ClientMessage {
    CreateRoom {
        name: String,
        avatar: String,
        category: String,
    },
    JoinRoom {
        code: String,
        name: String,
        avatar: String,
    },
    GetRoom {
        code: String,
    },
    StartGame {
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        question_id: String,
        answer: String,
    },
    #[serde(rename_all = "camelCase")]
    KickPlayer {
        code: String,
        target_id: PlayerId,
    },
    LeaveRoom {
        code: String,
    },
    SendMessage {
        code: String,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    RegisterUser {
        external_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[ts(export)]
pub enum ServerMessage {
    RoomCreated {
        room: Room,
        player: Player,
    },
    RoomJoined {
        room: Room,
        player: Player,
    },
    PlayerJoined {
        room: Room,
        player: Player,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
        room: Room,
    },
    RoomData {
        room: Room,
    },
    RoomError {
        message: String,
    },
    CriticalError {
        message: String,
    },
    RoomLeft {
        code: RoomCode,
    },
    #[serde(rename_all = "camelCase")]
    GameStarted {
        room: Room,
        question: Question,
        question_index: usize,
        total_questions: usize,
        #[ts(type = "number")]
        server_time: u64,
        #[ts(type = "number")]
        answer_duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    PlayerAnswered {
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    RoundCompleted {
        question_id: String,
        answers: BTreeMap<PlayerId, Option<SubmittedAnswer>>,
        is_matched: bool,
        match_score: u32,
        total_questions_answered: u32,
        percentage: u32,
        timed_out: bool,
        is_last_question: bool,
    },
    #[serde(rename_all = "camelCase")]
    GameFinished {
        match_score: u32,
        total_questions: usize,
        percentage: u32,
        completed_rounds: Vec<QuestionRound>,
    },
    #[serde(rename_all = "camelCase")]
    NextQuestion {
        room: Room,
        question: Question,
        question_index: usize,
        total_questions: usize,
        #[ts(type = "number")]
        server_time: u64,
        #[ts(type = "number")]
        answer_duration_ms: u64,
    },
    KickedFromRoom {
        code: RoomCode,
    },
    #[serde(rename_all = "camelCase")]
    PlayerKicked {
        player_id: PlayerId,
        room: Room,
    },
    GameCancelled {
        reason: String,
        room: Room,
    },
    ChatMessage(ChatMessage),
    CreditsUpdated {
        credits: u32,
    },
}

impl ServerMessage {
    /// Wire name of the event, matching the serialized `event` tag
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::RoomCreated { .. } => "room-created",
            ServerMessage::RoomJoined { .. } => "room-joined",
            ServerMessage::PlayerJoined { .. } => "player-joined",
            ServerMessage::PlayerLeft { .. } => "player-left",
            ServerMessage::RoomData { .. } => "room-data",
            ServerMessage::RoomError { .. } => "room-error",
            ServerMessage::CriticalError { .. } => "critical-error",
            ServerMessage::RoomLeft { .. } => "room-left",
            ServerMessage::GameStarted { .. } => "game-started",
            ServerMessage::PlayerAnswered { .. } => "player-answered",
            ServerMessage::RoundCompleted { .. } => "round-completed",
            ServerMessage::GameFinished { .. } => "game-finished",
            ServerMessage::NextQuestion { .. } => "next-question",
            ServerMessage::KickedFromRoom { .. } => "kicked-from-room",
            ServerMessage::PlayerKicked { .. } => "player-kicked",
            ServerMessage::GameCancelled { .. } => "game-cancelled",
            ServerMessage::ChatMessage(_) => "chat-message",
            ServerMessage::CreditsUpdated { .. } => "credits-updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub text: String,
    pub timestamp: String, // ISO 8601 string
}
