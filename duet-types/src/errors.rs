use thiserror::Error;

/// How an error is reported back to the acting client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A guard rejected the command; room state is unchanged.
    Validation,
    /// The caller's view of the game diverged from the server's.
    Desync,
    /// The room is missing or its record failed validation.
    NotFound,
    /// The store or the content provider could not be reached.
    Infrastructure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {code} not found")]
    RoomNotFound { code: String },

    #[error("room {code} has a corrupted record")]
    RoomCorrupted { code: String },

    #[error("game already started")]
    RoomAlreadyStarted,

    #[error("room is full")]
    RoomFull,

    #[error("could not allocate a unique room code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: usize },

    #[error("player is not in this room")]
    PlayerNotInRoom,

    #[error("only the host can do that")]
    NotHost,

    #[error("you cannot kick yourself")]
    CannotKickSelf,

    #[error("cannot kick players while a game is in progress")]
    KickDuringGame,

    #[error("need another player to start the game")]
    InsufficientPlayers,

    #[error("answer already recorded for this round")]
    AlreadyAnswered,

    #[error("no active round")]
    StaleRound,

    #[error("answer is for question {submitted}, but the active question is {expected}")]
    QuestionMismatch { expected: String, submitted: String },

    #[error("round has {count} answers, expected 2")]
    InvalidAnswerCount { count: usize },

    #[error("no questions available for category {category}")]
    NoQuestionsAvailable { category: String },

    #[error("message rejected: {reason}")]
    ChatRejected { reason: String },

    #[error("service temporarily unavailable: {0}")]
    StoreUnavailable(String),
}

impl RoomError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RoomError::StaleRound
            | RoomError::QuestionMismatch { .. }
            | RoomError::InvalidAnswerCount { .. } => ErrorClass::Desync,
            RoomError::RoomNotFound { .. } | RoomError::RoomCorrupted { .. } => {
                ErrorClass::NotFound
            }
            RoomError::StoreUnavailable(_)
            | RoomError::NoQuestionsAvailable { .. }
            | RoomError::CodeGenerationExhausted { .. } => ErrorClass::Infrastructure,
            _ => ErrorClass::Validation,
        }
    }

    /// Critical errors tell the client to drop its local room state
    pub fn is_critical(&self) -> bool {
        self.class() == ErrorClass::Desync
    }

    /// Message safe to show to clients. Corruption is reported as not found
    /// and infrastructure details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            RoomError::RoomCorrupted { code } => RoomError::RoomNotFound { code: code.clone() }.to_string(),
            RoomError::StoreUnavailable(_) | RoomError::CodeGenerationExhausted { .. } => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}
