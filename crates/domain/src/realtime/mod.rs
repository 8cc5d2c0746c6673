//! Live connection model: wire protocol, room membership and the session manager
//! that routes chat events between connected users.

pub mod protocol;
pub mod rooms;
pub mod session;

pub use protocol::{ClientEvent, ServerEvent};
pub use rooms::{RoomId, SessionId};
pub use session::{RoomJoinPolicy, SessionConnection, SessionManager};
