//! Hall: the room users idle in before joining a game room.
//!
//! The hall has no playground; its job is routing connect requests to their
//! destination rooms and keeping the registry of online users. Lock order is
//! `users` before `rooms` whenever both are taken.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use barrage_shared::ids::{RoomID, UserID, HALL_ID};
use barrage_shared::message::{ConnectInfo, InfoPkg};

use crate::room::{JoinError, Room};
use crate::tiggler::{Inbox, StatusCell, Tiggler};
use crate::user::User;

pub struct Hall {
    status: StatusCell,
    inbox: Inbox,
    users: RwLock<HashMap<UserID, Arc<dyn User>>>,
    rooms: RwLock<HashMap<RoomID, Arc<Room>>>,
}

impl Hall {
    pub fn new() -> Self {
        Hall {
            status: StatusCell::new(),
            inbox: Inbox::new(),
            users: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    fn users_read(&self) -> RwLockReadGuard<'_, HashMap<UserID, Arc<dyn User>>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn users_write(&self) -> RwLockWriteGuard<'_, HashMap<UserID, Arc<dyn User>>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }

    fn rooms_read(&self) -> RwLockReadGuard<'_, HashMap<RoomID, Arc<Room>>> {
        self.rooms.read().unwrap_or_else(|e| e.into_inner())
    }

    fn rooms_write(&self) -> RwLockWriteGuard<'_, HashMap<RoomID, Arc<Room>>> {
        self.rooms.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `user` and point their traffic at the hall. The rebind
    /// happens even for users already registered, so re-entry after leaving
    /// a room is redirected here.
    pub fn user_join(&self, user: Arc<dyn User>) {
        let mut users = self.users_write();
        users.entry(user.id()).or_insert_with(|| Arc::clone(&user));
        user.bind_room(HALL_ID, self.inbox.sender());
    }

    /// Remove `uid` from every room and from the hall registry. Membership is
    /// not tracked per user, so every room is checked.
    pub fn user_left(&self, uid: UserID) {
        let mut users = self.users_write();
        let rooms = self.rooms_read();
        for room in rooms.values() {
            room.user_left(uid);
        }
        users.remove(&uid);
    }

    /// Hook for the room-management collaborator.
    pub fn register_room(&self, room: Arc<Room>) {
        self.rooms_write().insert(room.id(), room);
    }

    pub fn remove_room(&self, rid: RoomID) -> Option<Arc<Room>> {
        self.rooms_write().remove(&rid)
    }

    /// Unregister and return every room, for shutdown.
    pub fn drain_rooms(&self) -> Vec<Arc<Room>> {
        self.rooms_write().drain().map(|(_, room)| room).collect()
    }

    pub fn user_count(&self) -> usize {
        self.users_read().len()
    }

    fn handle_connect(&self, ci: ConnectInfo) {
        let users = self.users_read();
        let Some(user) = users.get(&ci.uid) else {
            tracing::warn!(uid = ci.uid, "connect from unregistered user");
            return;
        };

        let rooms = self.rooms_read();
        let Some(room) = rooms.get(&ci.rid) else {
            user.send_error(&format!("Room {} does not exist!", ci.rid));
            return;
        };

        match room.user_join(Arc::clone(user), &ci.nickname) {
            Ok(()) => {}
            Err(JoinError::RoomFull(rid)) => {
                user.send_error(&format!("Room {} is full!", rid));
            }
            Err(JoinError::AlreadyJoined(_, rid)) => {
                user.send_error(&format!("You have already joined room {}!", rid));
            }
        }
    }
}

impl Default for Hall {
    fn default() -> Self {
        Self::new()
    }
}

impl Tiggler for Hall {
    fn id(&self) -> RoomID {
        HALL_ID
    }

    fn status_cell(&self) -> &StatusCell {
        &self.status
    }

    fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    fn handle_pkg(&self, pkg: InfoPkg) {
        match pkg {
            InfoPkg::Connect(ci) => self.handle_connect(ci),
            other => {
                tracing::error!(kind = ?other.kind(), "invalid info package for hall");
            }
        }
    }

    // the hall broadcasts nothing
    fn tick(&self) {}
}
