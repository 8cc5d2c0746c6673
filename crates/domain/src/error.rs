use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("you are not a participant of this chat")]
    NotParticipant,
    #[error("you are not a member of this trip")]
    NotTripMember,
    #[error("chat not found")]
    ChatNotFound,
    #[error("trip not found")]
    TripNotFound,
    #[error("cannot create chat with yourself")]
    SelfChat,
    #[error("already a member of this trip")]
    AlreadyMember,
    #[error("conflict")]
    Conflict,
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    /// Stable machine-readable code used by the HTTP envelope and realtime logs.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::Unauthenticated => "unauthenticated",
            DomainError::NotParticipant => "not_participant",
            DomainError::NotTripMember => "not_trip_member",
            DomainError::ChatNotFound => "chat_not_found",
            DomainError::TripNotFound => "trip_not_found",
            DomainError::SelfChat => "self_chat",
            DomainError::AlreadyMember => "already_member",
            DomainError::Conflict => "conflict",
            DomainError::Storage(_) => "storage_error",
        }
    }
}
