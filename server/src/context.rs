//! Application context wiring the hall and rooms together.

use std::sync::Arc;

use barrage_shared::ids::{RoomID, UserID};

use crate::config::ServerConfig;
use crate::hall::Hall;
use crate::room::Room;
use crate::tiggler;
use crate::user::User;

/// Explicit replacement for a process-wide hall singleton: built once at
/// startup and handed to every collaborator that needs hall access.
pub struct AppContext {
    config: ServerConfig,
    hall: Arc<Hall>,
}

impl AppContext {
    /// Create the hall and open its event loop.
    pub fn new(config: ServerConfig) -> Self {
        let hall = Arc::new(Hall::new());
        tiggler::open(Arc::clone(&hall), config.hall_tick());
        AppContext { config, hall }
    }

    pub fn hall(&self) -> &Arc<Hall> {
        &self.hall
    }

    /// Bring a user online: register with the hall and bind their traffic
    /// to it.
    pub fn join_hall(&self, user: Arc<dyn User>) {
        self.hall.user_join(user);
    }

    /// Take a user fully offline.
    pub fn left_hall(&self, uid: UserID) {
        self.hall.user_left(uid);
    }

    /// Create, open and register one game room.
    pub fn open_room(&self, rid: RoomID) -> Arc<Room> {
        let room = Arc::new(Room::new(rid, self.config.room_capacity));
        tiggler::open(Arc::clone(&room), self.config.room_tick());
        self.hall.register_room(Arc::clone(&room));
        room
    }

    /// Tear a room down: stop routing to it, then stop its loop.
    pub fn close_room(&self, rid: RoomID) {
        if let Some(room) = self.hall.remove_room(rid) {
            tiggler::close(&*room);
        }
    }

    /// Close every room and the hall itself.
    pub fn shutdown(&self) {
        for room in self.hall.drain_rooms() {
            tiggler::close(&*room);
        }
        tiggler::close(&*self.hall);
    }
}
