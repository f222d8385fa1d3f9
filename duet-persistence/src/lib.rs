pub mod connection;
pub mod keys;
pub mod repositories;
pub mod store;

pub use connection::{connect_to_memory_store, connect_to_store};
pub use keys::StoreKeys;
pub use repositories::room_repository::{PlayerRemoval, RoomRepository};
pub use store::{MemoryStore, RedisStore, StateStore, StoreError};
