//! Ball entity and its liveness state.

use bytes::{Buf, BufMut, BytesMut};

use crate::ids::BallID;
use crate::wire::{ensure, WireCodec, WireError};

/// Liveness of a ball as reported in collision outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BallState {
    Alive = 0,
    Dead = 1,
    Disappear = 2,
}

impl BallState {
    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(BallState::Alive),
            1 => Ok(BallState::Dead),
            2 => Ok(BallState::Disappear),
            other => Err(WireError::BadStateTag(other)),
        }
    }
}

/// A movable entity owned by one user.
///
/// Movement is computed by the owning client; the server only tracks
/// identity, liveness and the last reported placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub id: BallID,
    pub state: BallState,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hp: u16,
}

impl WireCodec for Ball {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u16(self.id);
        buf.put_u8(self.state as u8);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_f32(self.radius);
        buf.put_u16(self.hp);
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        ensure(buf, 17)?;
        Ok(Ball {
            id: buf.get_u16(),
            state: BallState::from_tag(buf.get_u8())?,
            x: buf.get_f32(),
            y: buf.get_f32(),
            radius: buf.get_f32(),
            hp: buf.get_u16(),
        })
    }
}
