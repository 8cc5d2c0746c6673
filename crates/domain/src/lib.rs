pub mod chat;
pub mod error;
pub mod identity;
pub mod messages;
pub mod ports;
pub mod profiles;
pub mod realtime;
pub mod trips;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
