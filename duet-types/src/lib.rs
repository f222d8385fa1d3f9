pub mod errors;
pub mod messages;
pub mod question;
pub mod room;

// Re-export all types
pub use errors::*;
pub use messages::*;
pub use question::*;
pub use room::*;
