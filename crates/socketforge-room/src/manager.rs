//! The bidirectional room index.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::RoomError;

/// Both directions of the membership relation, always updated together.
///
/// Invariant: `sockets[s]` contains `r` exactly when `rooms[r]` contains
/// `s`, and neither map holds an empty set.
#[derive(Debug, Default)]
struct RoomIndex {
    /// Room name → socket ids in it.
    rooms: HashMap<String, HashSet<String>>,
    /// Socket id → rooms it joined.
    sockets: HashMap<String, HashSet<String>>,
}

impl RoomIndex {
    fn insert(&mut self, socket_id: &str, room: &str) -> bool {
        let added = self
            .rooms
            .entry(room.to_owned())
            .or_default()
            .insert(socket_id.to_owned());
        self.sockets
            .entry(socket_id.to_owned())
            .or_default()
            .insert(room.to_owned());
        added
    }

    fn remove(&mut self, socket_id: &str, room: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        if !members.remove(socket_id) {
            return false;
        }
        if members.is_empty() {
            self.rooms.remove(room);
        }

        if let Some(joined) = self.sockets.get_mut(socket_id) {
            joined.remove(room);
            if joined.is_empty() {
                self.sockets.remove(socket_id);
            }
        }
        true
    }
}

/// Thread-safe room membership index.
///
/// Every operation takes the same lock, so a reader can never see one
/// direction of an update without the other. Queries return owned
/// snapshots; later changes don't affect them.
#[derive(Debug, Default)]
pub struct RoomManager {
    index: Mutex<RoomIndex>,
}

impl RoomManager {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `socket_id` to `room`. Joining a room twice is a no-op.
    ///
    /// # Errors
    /// [`RoomError::EmptyIdentifier`] if either argument is empty.
    pub fn join(&self, socket_id: &str, room: &str) -> Result<(), RoomError> {
        validate(socket_id, room)?;
        if self.lock().insert(socket_id, room) {
            tracing::debug!(socket_id, room, "joined room");
        }
        Ok(())
    }

    /// Adds `socket_id` to every room in `rooms` under one lock.
    ///
    /// Nothing is joined if any room name is empty.
    pub fn join_many<I, S>(&self, socket_id: &str, rooms: I) -> Result<(), RoomError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rooms: Vec<S> = rooms.into_iter().collect();
        for room in &rooms {
            validate(socket_id, room.as_ref())?;
        }

        let mut index = self.lock();
        for room in &rooms {
            if index.insert(socket_id, room.as_ref()) {
                tracing::debug!(socket_id, room = room.as_ref(), "joined room");
            }
        }
        Ok(())
    }

    /// Removes `socket_id` from `room`. Returns `false` if it wasn't a
    /// member. The room disappears once its last socket leaves.
    pub fn leave(&self, socket_id: &str, room: &str) -> bool {
        let removed = self.lock().remove(socket_id, room);
        if removed {
            tracing::debug!(socket_id, room, "left room");
        }
        removed
    }

    /// Removes `socket_id` from every room, returning the rooms it left.
    pub fn leave_all(&self, socket_id: &str) -> Vec<String> {
        let mut index = self.lock();
        let Some(joined) = index.sockets.remove(socket_id) else {
            return Vec::new();
        };

        for room in &joined {
            if let Some(members) = index.rooms.get_mut(room) {
                members.remove(socket_id);
                if members.is_empty() {
                    index.rooms.remove(room);
                }
            }
        }
        drop(index);

        tracing::debug!(socket_id, rooms = joined.len(), "left all rooms");
        joined.into_iter().collect()
    }

    /// Snapshot of the rooms `socket_id` is in.
    pub fn rooms(&self, socket_id: &str) -> HashSet<String> {
        self.lock().sockets.get(socket_id).cloned().unwrap_or_default()
    }

    /// Snapshot of the socket ids in `room`.
    pub fn socket_ids(&self, room: &str) -> HashSet<String> {
        self.lock().rooms.get(room).cloned().unwrap_or_default()
    }

    pub fn contains(&self, socket_id: &str, room: &str) -> bool {
        self.lock()
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(socket_id))
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    /// Number of sockets in at least one room.
    pub fn socket_count(&self) -> usize {
        self.lock().sockets.len()
    }

    /// Names of all non-empty rooms, in no particular order.
    pub fn room_names(&self) -> Vec<String> {
        self.lock().rooms.keys().cloned().collect()
    }

    // A panic while holding the lock can't leave the maps half-updated:
    // every mutation completes before anything that could panic.
    fn lock(&self) -> MutexGuard<'_, RoomIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(socket_id: &str, room: &str) -> Result<(), RoomError> {
    if socket_id.is_empty() {
        return Err(RoomError::EmptyIdentifier("socket id"));
    }
    if room.is_empty() {
        return Err(RoomError::EmptyIdentifier("room name"));
    }
    Ok(())
}
