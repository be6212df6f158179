use thiserror::Error;

/// Failures of the message store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures of a client hub invocation. The display text is what the client
/// sees in the completion frame.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Malformed hub frame")]
    MalformedFrame,

    #[error("Unknown hub method: {0}")]
    UnknownMethod(String),

    #[error("Invalid arguments for {0}")]
    InvalidArguments(String),

    #[error("You cannot message yourself")]
    SelfMessage,

    #[error("Message content cannot be empty")]
    EmptyContent,

    #[error("Cannot send message at this time")]
    Store(#[from] StoreError),
}
