use std::sync::Arc;
use std::time::Duration;

use duet_core::{MAX_CODE_ATTEMPTS, RoomRules, generate_room_code};
use duet_types::{Player, Room, RoomCode, RoomError, RoomSettings};
use tracing::{debug, info, warn};

use crate::keys::StoreKeys;
use crate::store::{StateStore, StoreError};

/// Outcome of taking a player out of their room
#[derive(Debug, Clone)]
pub struct PlayerRemoval {
    pub code: RoomCode,
    pub player: Option<Player>,
    /// The room after removal, or `None` when it was deleted or gone
    pub room: Option<Room>,
}

impl PlayerRemoval {
    pub fn room_deleted(&self) -> bool {
        self.room.is_none()
    }
}

/// Validated access to room records and the player index
pub struct RoomRepository {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl RoomRepository {
    pub fn new(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Allocates a free code and stores a waiting room with the owner as
    /// host. Uniqueness is best-effort: the existence check and the write
    /// are not atomic.
    pub async fn create_room(
        &self,
        owner: Player,
        settings: RoomSettings,
    ) -> Result<Room, RoomError> {
        let mut allocated = None;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_room_code(&mut rand::thread_rng());
            if !self.store.exists(&StoreKeys::room(&code)).await? {
                allocated = Some(code);
                break;
            }
            debug!(code = %code, attempt, "Room code collision, retrying");
        }
        let Some(code) = allocated else {
            warn!("Could not allocate a free room code");
            return Err(RoomError::CodeGenerationExhausted {
                attempts: MAX_CODE_ATTEMPTS,
            });
        };

        let room = RoomRules::new_room(code, owner, settings);
        self.update_room(&room).await?;

        info!(
            room_code = %room.room_code,
            host = %room.players[0].id,
            category = %room.settings.category,
            "Room created"
        );
        Ok(room)
    }

    pub async fn join_room(&self, code: &str, player: Player) -> Result<(Player, Room), RoomError> {
        let mut room = self.load_room(code).await.map_err(|err| match err {
            RoomError::RoomCorrupted { code } => RoomError::RoomNotFound { code },
            other => other,
        })?;

        let player = RoomRules::add_player(&mut room, player)?;
        self.update_room(&room).await?;

        info!(room_code = %room.room_code, player_id = %player.id, "Player joined room");
        Ok((player, room))
    }

    /// Loads a room, telling apart a missing record, a corrupted one and a
    /// store failure.
    pub async fn load_room(&self, code: &str) -> Result<Room, RoomError> {
        let raw = self
            .store
            .get(&StoreKeys::room(code))
            .await?
            .ok_or_else(|| RoomError::RoomNotFound {
                code: code.to_string(),
            })?;

        Self::decode_room(code, &raw)
    }

    /// Like `load_room`, but a missing or corrupted record is `None`
    pub async fn get_room(&self, code: &str) -> Result<Option<Room>, RoomError> {
        match self.load_room(code).await {
            Ok(room) => Ok(Some(room)),
            Err(RoomError::RoomNotFound { .. }) | Err(RoomError::RoomCorrupted { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn decode_room(code: &str, raw: &str) -> Result<Room, RoomError> {
        let corrupted = || RoomError::RoomCorrupted {
            code: code.to_string(),
        };

        let room: Room = serde_json::from_str(raw).map_err(|err| {
            warn!(room_code = %code, error = %err, "Skipping corrupted room record");
            corrupted()
        })?;

        if let Some(issue) = room.structural_issue() {
            warn!(room_code = %code, issue = %issue, "Skipping structurally invalid room record");
            return Err(corrupted());
        }
        if room.room_code != code {
            warn!(
                room_code = %code,
                stored_code = %room.room_code,
                "Room record stored under the wrong key"
            );
            return Err(corrupted());
        }
        Ok(room)
    }

    pub async fn get_player_room(&self, player_id: &str) -> Result<Option<RoomCode>, RoomError> {
        Ok(self.store.get(&StoreKeys::player(player_id)).await?)
    }

    /// Removes a player from whichever room the index points at. The index
    /// entry is deleted even when the room is already gone.
    pub async fn remove_player(&self, player_id: &str) -> Result<Option<PlayerRemoval>, RoomError> {
        let Some(code) = self.get_player_room(player_id).await? else {
            return Ok(None);
        };
        self.remove_player_from(&code, player_id).await.map(Some)
    }

    /// Removes a player from a specific room, deleting the room once it is
    /// empty and promoting a new host otherwise.
    pub async fn remove_player_from(
        &self,
        code: &str,
        player_id: &str,
    ) -> Result<PlayerRemoval, RoomError> {
        let room = self.get_room(code).await?;
        self.clear_index_if_points_at(player_id, code).await?;

        let Some(mut room) = room else {
            return Ok(PlayerRemoval {
                code: code.to_string(),
                player: None,
                room: None,
            });
        };

        let player = RoomRules::remove_player(&mut room, player_id);
        if player.is_some() {
            info!(room_code = %code, player_id = %player_id, "Player left room");
        }

        if room.players.is_empty() {
            self.delete_room(code).await?;
            return Ok(PlayerRemoval {
                code: code.to_string(),
                player,
                room: None,
            });
        }

        self.update_room(&room).await?;
        Ok(PlayerRemoval {
            code: code.to_string(),
            player,
            room: Some(room),
        })
    }

    pub async fn delete_room(&self, code: &str) -> Result<(), RoomError> {
        if let Some(room) = self.get_room(code).await? {
            for player in &room.players {
                self.clear_index_if_points_at(&player.id, code).await?;
            }
        }
        self.store.delete(&StoreKeys::room(code)).await?;

        info!(room_code = %code, "Room deleted");
        Ok(())
    }

    pub async fn reset_room(&self, code: &str) -> Result<Option<Room>, RoomError> {
        let Some(mut room) = self.get_room(code).await? else {
            return Ok(None);
        };

        RoomRules::reset(&mut room);
        self.update_room(&room).await?;

        info!(room_code = %code, "Room reset to waiting");
        Ok(Some(room))
    }

    /// Overwrites the room record and refreshes the expiry of the room and
    /// of every occupant's index entry.
    pub async fn update_room(&self, room: &Room) -> Result<(), RoomError> {
        let payload = serde_json::to_string(room)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        self.store
            .set_with_ttl(&StoreKeys::room(&room.room_code), &payload, self.ttl)
            .await?;
        for player in &room.players {
            self.store
                .set_with_ttl(&StoreKeys::player(&player.id), &room.room_code, self.ttl)
                .await?;
        }
        Ok(())
    }

    /// Every live, valid room. Corrupted records are logged and skipped.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, RoomError> {
        let keys = self.store.keys_with_prefix(StoreKeys::ROOM_PREFIX).await?;

        let mut rooms = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(code) = StoreKeys::room_code_from_key(&key) else {
                continue;
            };
            if let Some(room) = self.get_room(&code).await? {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }

    /// Drops a player's index entry if it still points at `code`
    pub async fn clear_player_index(&self, player_id: &str, code: &str) -> Result<(), RoomError> {
        self.clear_index_if_points_at(player_id, code).await
    }

    async fn clear_index_if_points_at(&self, player_id: &str, code: &str) -> Result<(), RoomError> {
        let key = StoreKeys::player(player_id);
        // The player may already be indexed to a newer room
        match self.store.get(&key).await? {
            Some(indexed) if indexed != code => Ok(()),
            _ => Ok(self.store.delete(&key).await?),
        }
    }
}
