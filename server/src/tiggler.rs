//! Generic open/close driver for room-like components.
//!
//! Anything with a status word, a bounded inbound queue, an event handler
//! and a periodic operation can be driven here: the driver spawns one task
//! per open room that multiplexes the broadcast timer, the inbound queue
//! and the close signal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use barrage_shared::ids::RoomID;
use barrage_shared::message::InfoPkg;

/// Inbound queue capacity for every room-like component. A full queue blocks
/// the producer, throttling sessions that outrun the loop.
pub const INBOX_CAPACITY: usize = 10;

/// Lifecycle status of a room-like component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Closed,
    Open,
}

/// Status word plus close signal; the sole synchronization point between
/// callers and a room's background task.
pub struct StatusCell {
    status: Mutex<RoomStatus>,
    closed: Notify,
}

impl StatusCell {
    pub fn new() -> Self {
        StatusCell {
            status: Mutex::new(RoomStatus::Closed),
            closed: Notify::new(),
        }
    }

    pub fn status(&self) -> RoomStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set `new` iff the current status equals `old`. Returns whether the
    /// transition happened.
    pub fn compare_and_set(&self, old: RoomStatus, new: RoomStatus) -> bool {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *status == old {
            *status = new;
            true
        } else {
            false
        }
    }

    fn signal_close(&self) {
        self.closed.notify_one();
    }

    async fn close_signalled(&self) {
        self.closed.notified().await;
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded inbound event queue owned by a room-like component. The receiver
/// side is taken by the room's loop for as long as it runs.
pub struct Inbox {
    tx: Sender<InfoPkg>,
    rx: tokio::sync::Mutex<Receiver<InfoPkg>>,
}

impl Inbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        Inbox {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Producer handle for sessions feeding this room.
    pub fn sender(&self) -> Sender<InfoPkg> {
        self.tx.clone()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal capability set consumed by [`open`] and [`close`].
pub trait Tiggler: Send + Sync + 'static {
    fn id(&self) -> RoomID;
    fn status_cell(&self) -> &StatusCell;
    fn inbox(&self) -> &Inbox;
    /// Dispatch one inbound package.
    fn handle_pkg(&self, pkg: InfoPkg);
    /// Periodic broadcast operation, invoked once per tick interval.
    fn tick(&self);
}

/// Transition `room` Closed -> Open and spawn its event/tick loop. No-op when
/// the room is already open.
pub fn open<T: Tiggler>(room: Arc<T>, tick_interval: Duration) {
    if !room
        .status_cell()
        .compare_and_set(RoomStatus::Closed, RoomStatus::Open)
    {
        return;
    }

    tokio::spawn(async move {
        let mut broadcast = interval_at(Instant::now() + tick_interval, tick_interval);
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inbox = room.inbox().rx.lock().await;

        loop {
            tokio::select! {
                _ = room.status_cell().close_signalled() => {
                    // A reopen may already have flipped the status back; only
                    // a still-closed room stops the loop.
                    if room.status_cell().status() != RoomStatus::Open {
                        break;
                    }
                }
                _ = broadcast.tick() => room.tick(),
                pkg = inbox.recv() => match pkg {
                    Some(pkg) => room.handle_pkg(pkg),
                    None => break,
                },
            }
        }

        tracing::info!(room = room.id(), "room event loop stopped");
    });
}

/// Transition `room` Open -> Closed and wake its loop. Fire-and-forget: the
/// task exits on its own once it observes the closed status.
pub fn close<T: Tiggler + ?Sized>(room: &T) {
    if room
        .status_cell()
        .compare_and_set(RoomStatus::Open, RoomStatus::Closed)
    {
        room.status_cell().signal_close();
    }
}
