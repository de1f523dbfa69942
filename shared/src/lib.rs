//! Shared wire types for the barrage server.
//!
//! Everything the server core and a client session agree on lives here:
//! identifiers, the ball entity, collision events, the message packages
//! carried on room event queues, and the binary list framing.

pub mod ball;
pub mod ids;
pub mod message;
pub mod wire;
