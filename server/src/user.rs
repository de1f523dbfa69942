//! Session-facing user seam.

use thiserror::Error;
use tokio::sync::mpsc::Sender;

use barrage_shared::ids::{RoomID, UserID};
use barrage_shared::message::{InfoPkg, PlaygroundInfo};

/// The user's session is gone; nothing more can be delivered.
#[derive(Debug, Error)]
#[error("user session closed")]
pub struct SessionClosed;

/// Server-side handle to one connected user, implemented by the session
/// layer. The core only routes packages and error text through it.
pub trait User: Send + Sync {
    fn id(&self) -> UserID;
    /// Point the user's inbound traffic at `room`'s event queue.
    fn bind_room(&self, room: RoomID, inbox: Sender<InfoPkg>);
    /// Surface a human-readable failure to the user.
    fn send_error(&self, text: &str);
    /// Deliver one compiled package to the user's session.
    fn send_pkg(&self, pkg: PlaygroundInfo) -> Result<(), SessionClosed>;
}
