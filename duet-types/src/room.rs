use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Question, SubmittedAnswer};

pub type PlayerId = String;
pub type RoomCode = String;

/// Rooms never hold more than two players
pub const MAX_PLAYERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Room {
    pub room_code: RoomCode,
    pub created_at: String, // ISO 8601 string
    pub status: RoomStatus,
    pub players: Vec<Player>,
    pub settings: RoomSettings,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub current_round: Option<QuestionRound>,
    #[serde(default)]
    pub completed_rounds: Vec<QuestionRound>,
    #[serde(default)]
    pub match_score: u32,
    #[serde(default)]
    pub total_questions_answered: u32,
}

impl Room {
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| p.is_host)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Returns a description of the first structural problem, if any.
    ///
    /// Serde already rejects missing fields and wrong basic types; this
    /// covers the constraints a well-typed document can still violate.
    pub fn structural_issue(&self) -> Option<String> {
        if self.room_code.trim().is_empty() {
            return Some("empty room code".to_string());
        }
        if self.settings.max_players == 0 || self.settings.max_players > MAX_PLAYERS {
            return Some(format!("invalid max players {}", self.settings.max_players));
        }
        if self.players.len() > self.settings.max_players {
            return Some(format!("{} players exceed capacity", self.players.len()));
        }
        if self.players.iter().any(|p| p.id.is_empty()) {
            return Some("player with empty id".to_string());
        }
        if self.status == RoomStatus::Playing && self.questions.is_empty() {
            return Some("playing room without questions".to_string());
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Fixed at room creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoomSettings {
    pub max_players: usize,
    pub total_questions: usize,
    pub category: String,
    #[ts(type = "number")]
    pub answer_duration_ms: u64,
    #[ts(type = "number")]
    pub result_display_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub is_host: bool,
    #[serde(default)]
    pub has_answered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuestionRound {
    pub question: Question,
    pub answers: BTreeMap<PlayerId, Option<SubmittedAnswer>>,
    pub is_matched: Option<bool>,
    pub status: RoundStatus,
    #[serde(default)]
    pub timed_out: bool,
}

impl QuestionRound {
    /// True once every player slot holds an answer
    pub fn all_answered(&self) -> bool {
        !self.answers.is_empty() && self.answers.values().all(Option::is_some)
    }

    pub fn submitted_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RoundStatus {
    WaitingAnswers,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_room() -> Room {
        Room {
            room_code: "AB12".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            status: RoomStatus::Waiting,
            players: vec![Player {
                id: "p1".to_string(),
                name: "Alice".to_string(),
                avatar: "cat".to_string(),
                is_host: true,
                has_answered: false,
            }],
            settings: RoomSettings {
                max_players: MAX_PLAYERS,
                total_questions: 10,
                category: "general".to_string(),
                answer_duration_ms: 30_000,
                result_display_ms: 3_000,
            },
            questions: Vec::new(),
            current_question_index: 0,
            current_round: None,
            completed_rounds: Vec::new(),
            match_score: 0,
            total_questions_answered: 0,
        }
    }

    #[test]
    fn test_room_uses_camel_case_fields() {
        let json = serde_json::to_value(sample_room()).unwrap();
        assert_eq!(json["roomCode"], "AB12");
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["players"][0]["isHost"], true);
        assert_eq!(json["settings"]["maxPlayers"], 2);
        assert!(json["currentRound"].is_null());
    }

    #[test]
    fn test_room_rejects_missing_required_fields() {
        let result = serde_json::from_str::<Room>(r#"{"roomCode":"AB12","status":"waiting"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_structural_issue_detects_overfull_room() {
        let mut room = sample_room();
        assert!(room.structural_issue().is_none());

        for id in ["p2", "p3"] {
            room.players.push(Player {
                id: id.to_string(),
                name: id.to_string(),
                avatar: String::new(),
                is_host: false,
                has_answered: false,
            });
        }
        assert!(room.structural_issue().is_some());
    }

    #[test]
    fn test_round_all_answered() {
        let mut answers = BTreeMap::new();
        answers.insert("p1".to_string(), Some(SubmittedAnswer::Raw("yes".to_string())));
        answers.insert("p2".to_string(), None);

        let mut round = QuestionRound {
            question: crate::Question {
                id: "q1".to_string(),
                text: crate::QuestionText::Plain("?".to_string()),
                category: "general".to_string(),
                have_answers: false,
                answers: None,
            },
            answers,
            is_matched: None,
            status: RoundStatus::WaitingAnswers,
            timed_out: false,
        };
        assert!(!round.all_answered());
        assert_eq!(round.submitted_count(), 1);

        round
            .answers
            .insert("p2".to_string(), Some(SubmittedAnswer::Raw("no".to_string())));
        assert!(round.all_answered());
    }
}
