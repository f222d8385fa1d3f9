use duet_types::RoomCode;

/// Key scheme shared by every store back end
pub struct StoreKeys;

impl StoreKeys {
    pub const ROOM_PREFIX: &'static str = "room:";
    pub const PLAYER_PREFIX: &'static str = "player:";

    pub fn room(code: &str) -> String {
        format!("{}{}", Self::ROOM_PREFIX, code)
    }

    /// Reverse index from a player id to the code of the room they are in
    pub fn player(player_id: &str) -> String {
        format!("{}{}", Self::PLAYER_PREFIX, player_id)
    }

    pub fn room_code_from_key(key: &str) -> Option<RoomCode> {
        key.strip_prefix(Self::ROOM_PREFIX).map(str::to_string)
    }
}
