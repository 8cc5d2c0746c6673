use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::mpsc;

use crate::identity::ActorIdentity;
use crate::realtime::protocol::ServerEvent;

pub type SessionId = u64;
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Broadcast group: a user's personal room or a chat room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomId {
    User(String),
    Chat(String),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::User(user_id) => write!(f, "user:{user_id}"),
            RoomId::Chat(chat_id) => write!(f, "chat:{chat_id}"),
        }
    }
}

struct SessionEntry {
    identity: ActorIdentity,
    sender: EventSender,
    rooms: HashSet<RoomId>,
}

/// Session and room membership tables. Both directions are kept in sync so
/// removing a session never leaves it referenced by a room.
#[derive(Default)]
pub(crate) struct RoomRegistry {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<RoomId, HashSet<SessionId>>,
}

impl RoomRegistry {
    /// Registers the session and places it in its personal room.
    pub(crate) fn register(
        &mut self,
        session_id: SessionId,
        identity: ActorIdentity,
        sender: EventSender,
    ) {
        let personal = RoomId::User(identity.user_id.clone());
        self.sessions.insert(
            session_id,
            SessionEntry {
                identity,
                sender,
                rooms: HashSet::new(),
            },
        );
        self.join(session_id, personal);
    }

    pub(crate) fn identity(&self, session_id: SessionId) -> Option<&ActorIdentity> {
        self.sessions.get(&session_id).map(|entry| &entry.identity)
    }

    pub(crate) fn join(&mut self, session_id: SessionId, room: RoomId) -> bool {
        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if !entry.rooms.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(session_id);
        true
    }

    pub(crate) fn leave(&mut self, session_id: SessionId, room: &RoomId) -> bool {
        let Some(entry) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        self.detach(session_id, room);
        true
    }

    pub(crate) fn remove(&mut self, session_id: SessionId) -> Option<ActorIdentity> {
        let entry = self.sessions.remove(&session_id)?;
        for room in &entry.rooms {
            self.detach(session_id, room);
        }
        Some(entry.identity)
    }

    fn detach(&mut self, session_id: SessionId, room: &RoomId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    pub(crate) fn rooms_of(&self, session_id: SessionId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .sessions
            .get(&session_id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub(crate) fn room_size(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(HashSet::len).unwrap_or(0)
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn send_to(&self, session_id: SessionId, event: ServerEvent) -> bool {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.sender.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Delivers `event` to every session in `room` except `except`. Returns the
    /// number of sessions the event was queued for.
    pub(crate) fn broadcast(
        &self,
        room: &RoomId,
        event: &ServerEvent,
        except: Option<SessionId>,
    ) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|session_id| Some(**session_id) != except)
            .filter_map(|session_id| self.sessions.get(session_id))
            .filter(|entry| entry.sender.send(event.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: &str) -> ActorIdentity {
        ActorIdentity::new(user_id, user_id.to_uppercase())
    }

    #[test]
    fn room_ids_render_with_prefix() {
        assert_eq!(RoomId::User("a".into()).to_string(), "user:a");
        assert_eq!(RoomId::Chat("c-1".into()).to_string(), "chat:c-1");
    }

    #[test]
    fn register_joins_personal_room() {
        let mut registry = RoomRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, identity("a"), tx);
        assert_eq!(registry.rooms_of(1), vec![RoomId::User("a".into())]);
        assert_eq!(registry.room_size(&RoomId::User("a".into())), 1);
    }

    #[test]
    fn broadcast_skips_excluded_session() {
        let mut registry = RoomRegistry::default();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(1, identity("a"), tx_a);
        registry.register(2, identity("b"), tx_b);
        let room = RoomId::Chat("c-1".into());
        assert!(registry.join(1, room.clone()));
        assert!(registry.join(2, room.clone()));
        assert!(!registry.join(2, room.clone()));

        let delivered = registry.broadcast(&room, &ServerEvent::error("x"), Some(1));
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().ok(), Some(ServerEvent::error("x")));
    }

    #[test]
    fn remove_clears_every_membership() {
        let mut registry = RoomRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(7, identity("a"), tx);
        let room = RoomId::Chat("c-1".into());
        registry.join(7, room.clone());

        assert_eq!(registry.remove(7).map(|i| i.user_id), Some("a".to_string()));
        assert_eq!(registry.room_size(&room), 0);
        assert_eq!(registry.room_size(&RoomId::User("a".into())), 0);
        assert_eq!(registry.session_count(), 0);
        assert!(!registry.leave(7, &room));
    }
}
