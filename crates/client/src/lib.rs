pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod link;
pub mod reconnect;

pub use controller::{ChatController, ChatViewState};
pub use error::{ClientError, ClientResult};
