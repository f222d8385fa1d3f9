pub mod chat;
pub mod question_bank;
pub mod room_code;
pub mod room_rules;
pub mod round_engine;
pub mod scoring;

// Re-export main components
pub use chat::*;
pub use question_bank::*;
pub use room_code::*;
pub use room_rules::*;
pub use round_engine::*;
pub use scoring::*;
