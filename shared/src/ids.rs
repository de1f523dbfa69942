//! Identifier types used across the protocol.

use bytes::{Buf, BufMut, BytesMut};

use crate::wire::{ensure, WireCodec, WireError};

/// Owner of balls, member of rooms, receiver of packages.
pub type UserID = u32;
/// Ball identifier, unique within its owner.
pub type BallID = u16;
/// Room identifier.
pub type RoomID = u32;
/// Damage dealt to one collision participant.
pub type Damage = u16;

/// Reserved pseudo-user owning environment and orphaned balls. Present in
/// every playground, never deleted, receives no packages.
pub const SYS_ID: UserID = 0;

/// The hall's reserved room id.
pub const HALL_ID: RoomID = 0;

/// Globally unique ball address: owner plus per-owner ball id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullBallID {
    pub uid: UserID,
    pub id: BallID,
}

impl FullBallID {
    /// First participant of every synthesized system collision.
    pub const SYS: FullBallID = FullBallID { uid: SYS_ID, id: 0 };
}

impl WireCodec for FullBallID {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(self.uid);
        buf.put_u16(self.id);
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        ensure(buf, 6)?;
        Ok(FullBallID {
            uid: buf.get_u32(),
            id: buf.get_u16(),
        })
    }
}
