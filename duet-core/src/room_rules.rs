use duet_types::{Player, Room, RoomError, RoomSettings, RoomStatus};
use tracing::info;

const MAX_NAME_CHARS: usize = 24;
const MAX_AVATAR_CHARS: usize = 64;
const DEFAULT_NAME: &str = "Player";

/// Structural room mutations shared by the repository and the coordinator.
/// Nothing here touches the store.
pub struct RoomRules;

impl RoomRules {
    pub fn new_room(code: String, host: Player, settings: RoomSettings) -> Room {
        let mut host = host;
        host.is_host = true;
        host.has_answered = false;

        Room {
            room_code: code,
            created_at: chrono::Utc::now().to_rfc3339(),
            status: RoomStatus::Waiting,
            players: vec![host],
            settings,
            questions: Vec::new(),
            current_question_index: 0,
            current_round: None,
            completed_rounds: Vec::new(),
            match_score: 0,
            total_questions_answered: 0,
        }
    }

    /// Builds a non-host player, trimming display metadata to a sane shape
    pub fn new_player(id: &str, name: &str, avatar: &str) -> Player {
        let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
        let avatar: String = avatar.trim().chars().take(MAX_AVATAR_CHARS).collect();

        Player {
            id: id.to_string(),
            name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name
            },
            avatar,
            is_host: false,
            has_answered: false,
        }
    }

    /// Appends a player to a waiting room. A player already present is
    /// returned as-is rather than added twice.
    pub fn add_player(room: &mut Room, player: Player) -> Result<Player, RoomError> {
        if room.status != RoomStatus::Waiting {
            return Err(RoomError::RoomAlreadyStarted);
        }
        if let Some(existing) = room.player(&player.id) {
            return Ok(existing.clone());
        }
        if room.is_full() {
            return Err(RoomError::RoomFull);
        }

        let mut player = player;
        player.is_host = room.players.is_empty();
        player.has_answered = false;
        room.players.push(player.clone());
        Ok(player)
    }

    /// Removes a player and hands the host role to the earliest-joined
    /// remaining player when the host leaves.
    pub fn remove_player(room: &mut Room, player_id: &str) -> Option<Player> {
        let index = room.players.iter().position(|p| p.id == player_id)?;
        let removed = room.players.remove(index);

        if removed.is_host {
            if let Some(next_host) = room.players.first_mut() {
                next_host.is_host = true;
                info!(
                    room_code = %room.room_code,
                    new_host = %next_host.id,
                    "Host left, promoted next player"
                );
            }
        }

        if let Some(round) = room.current_round.as_mut() {
            round.answers.remove(player_id);
        }

        Some(removed)
    }

    /// Returns the room to `waiting` for a replay, keeping code, players and
    /// settings.
    pub fn reset(room: &mut Room) {
        room.status = RoomStatus::Waiting;
        room.questions.clear();
        room.current_question_index = 0;
        room.current_round = None;
        room.completed_rounds.clear();
        room.match_score = 0;
        room.total_questions_answered = 0;
        for player in &mut room.players {
            player.has_answered = false;
        }
    }
}
