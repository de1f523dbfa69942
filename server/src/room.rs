//! Game room: membership plus the playground it synchronizes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use barrage_shared::ids::{RoomID, UserID};
use barrage_shared::message::InfoPkg;

use crate::playground::Playground;
use crate::tiggler::{Inbox, StatusCell, Tiggler};
use crate::user::User;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room {0} is full")]
    RoomFull(RoomID),
    #[error("user {0} has already joined room {1}")]
    AlreadyJoined(UserID, RoomID),
}

struct Member {
    user: Arc<dyn User>,
    nickname: String,
}

/// Membership boundary owning one playground, a status word and an inbound
/// event queue.
pub struct Room {
    id: RoomID,
    capacity: usize,
    status: StatusCell,
    inbox: Inbox,
    playground: Playground,
    members: RwLock<HashMap<UserID, Member>>,
}

impl Room {
    pub fn new(id: RoomID, capacity: usize) -> Self {
        Room {
            id,
            capacity,
            status: StatusCell::new(),
            inbox: Inbox::new(),
            playground: Playground::new(),
            members: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> RoomID {
        self.id
    }

    fn members_read(&self) -> RwLockReadGuard<'_, HashMap<UserID, Member>> {
        self.members.read().unwrap_or_else(|e| e.into_inner())
    }

    fn members_write(&self) -> RwLockWriteGuard<'_, HashMap<UserID, Member>> {
        self.members.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `user` to the room and rebind their event target here.
    pub fn user_join(&self, user: Arc<dyn User>, nickname: &str) -> Result<(), JoinError> {
        let mut members = self.members_write();
        let uid = user.id();
        if members.contains_key(&uid) {
            return Err(JoinError::AlreadyJoined(uid, self.id));
        }
        if members.len() >= self.capacity {
            return Err(JoinError::RoomFull(self.id));
        }

        self.playground.add_user(uid);
        user.bind_room(self.id, self.inbox.sender());
        members.insert(
            uid,
            Member {
                user,
                nickname: nickname.to_string(),
            },
        );
        tracing::info!(room = self.id, uid, nickname, "user joined");
        Ok(())
    }

    /// Drop `uid`'s membership; their surviving balls turn into system
    /// collisions on the next tick. Returns whether the user was present.
    pub fn user_left(&self, uid: UserID) -> bool {
        let mut members = self.members_write();
        if members.remove(&uid).is_none() {
            return false;
        }
        drop(members);

        self.playground.delete_user(uid);
        tracing::info!(room = self.id, uid, "user left");
        true
    }

    pub fn user_count(&self) -> usize {
        self.members_read().len()
    }
}

impl Tiggler for Room {
    fn id(&self) -> RoomID {
        self.id
    }

    fn status_cell(&self) -> &StatusCell {
        &self.status
    }

    fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    fn handle_pkg(&self, pkg: InfoPkg) {
        match pkg {
            InfoPkg::Playground(pi) => {
                if let Err(err) = self.playground.put_pkg(&pi) {
                    tracing::warn!(room = self.id, error = %err, "update package dropped");
                }
            }
            InfoPkg::Disconnect(di) => {
                self.user_left(di.uid);
            }
            other => {
                tracing::error!(room = self.id, kind = ?other.kind(), "invalid info package");
            }
        }
    }

    fn tick(&self) {
        let pkgs = self.playground.pkgs_for_each_user();
        if pkgs.is_empty() {
            return;
        }

        let members = self.members_read();
        for pkg in pkgs {
            let Some(member) = members.get(&pkg.receiver) else {
                continue;
            };
            let receiver = pkg.receiver;
            if member.user.send_pkg(pkg).is_err() {
                tracing::warn!(room = self.id, uid = receiver, "session closed, package dropped");
            }
        }
    }
}
