//! Barrage server synchronization core.
//!
//! Tracks each connected user's live balls, aggregates collision traffic,
//! and compiles one personalized binary update per user on every broadcast
//! tick. Wire transport and sessions live outside this crate; they talk to
//! the core through [`user::User`] handles and room inboxes.

pub mod config;
pub mod context;
pub mod hall;
pub mod playground;
pub mod room;
pub mod tiggler;
pub mod user;
