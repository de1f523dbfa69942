//! Message packages exchanged between sessions and rooms.

use bytes::{Buf, BufMut, BytesMut};

use crate::ball::{Ball, BallState};
use crate::ids::{BallID, Damage, FullBallID, RoomID, UserID};
use crate::wire::{decode_list, encode_list, ensure, WireCodec, WireError};

/// Contact between two balls and its per-participant outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionInfo {
    pub ids: [FullBallID; 2],
    pub damages: [Damage; 2],
    pub states: [BallState; 2],
}

impl WireCodec for CollisionInfo {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        for id in &self.ids {
            id.encode(buf)?;
        }
        for damage in self.damages {
            buf.put_u16(damage);
        }
        for state in self.states {
            buf.put_u8(state as u8);
        }
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        ensure(buf, 18)?;
        Ok(CollisionInfo {
            ids: [FullBallID::decode(buf)?, FullBallID::decode(buf)?],
            damages: [buf.get_u16(), buf.get_u16()],
            states: [
                BallState::from_tag(buf.get_u8())?,
                BallState::from_tag(buf.get_u8())?,
            ],
        })
    }
}

/// One user's update package.
///
/// Inbound packages (session to room) carry the typed lists. Outbound
/// packages produced by the per-tick compiler carry the pre-serialized body
/// in `payload` and leave the lists empty.
#[derive(Debug, Clone, Default)]
pub struct PlaygroundInfo {
    pub sender: UserID,
    pub receiver: UserID,
    pub new_balls: Vec<Ball>,
    pub displacements: Vec<Ball>,
    pub collisions: Vec<CollisionInfo>,
    pub disappears: Vec<BallID>,
    pub payload: Vec<u8>,
}

impl PlaygroundInfo {
    /// Serialize the four body sections in wire order:
    /// new balls, displacements, collisions, disappearances.
    pub fn encode_body(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        encode_list(&self.new_balls, buf)?;
        encode_list(&self.displacements, buf)?;
        encode_list(&self.collisions, buf)?;
        encode_list(&self.disappears, buf)
    }

    /// Parse a body serialized by [`encode_body`]. The per-tick compiler
    /// manufactures exactly this layout, so compiled payloads decode here too.
    pub fn decode_body(
        sender: UserID,
        receiver: UserID,
        buf: &mut impl Buf,
    ) -> Result<Self, WireError> {
        Ok(PlaygroundInfo {
            sender,
            receiver,
            new_balls: decode_list(buf)?,
            displacements: decode_list(buf)?,
            collisions: decode_list(buf)?,
            disappears: decode_list(buf)?,
            payload: Vec::new(),
        })
    }
}

/// Request to join a room.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub uid: UserID,
    pub rid: RoomID,
    pub nickname: String,
}

/// Notice that a user's session ended.
#[derive(Debug, Clone)]
pub struct DisconnectInfo {
    pub uid: UserID,
}

/// Type tag of an [`InfoPkg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    Playground,
    Connect,
    Disconnect,
}

/// Typed event carried on a room's inbound queue.
#[derive(Debug, Clone)]
pub enum InfoPkg {
    Playground(PlaygroundInfo),
    Connect(ConnectInfo),
    Disconnect(DisconnectInfo),
}

impl InfoPkg {
    pub fn kind(&self) -> InfoType {
        match self {
            InfoPkg::Playground(_) => InfoType::Playground,
            InfoPkg::Connect(_) => InfoType::Connect,
            InfoPkg::Disconnect(_) => InfoType::Disconnect,
        }
    }
}
