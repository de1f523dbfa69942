//! Binary list framing.
//!
//! Every list on the wire is a 4-byte big-endian item count followed by the
//! concatenation of each item's encoding. Items are self-terminating, so a
//! decoder walks a list without any per-item length prefix.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Decode-side cap on list preallocation; counts above this grow the vector
/// incrementally instead of reserving up front.
const MAX_PREALLOC: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("short buffer: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },
    #[error("unknown ball state tag {0}")]
    BadStateTag(u8),
}

/// Objects that can marshal themselves into wire bytes and back.
///
/// `encode` appends to the buffer; `decode` consumes exactly the bytes
/// `encode` produced.
pub trait WireCodec: Sized {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError>;
    fn decode(buf: &mut impl Buf) -> Result<Self, WireError>;
}

/// Check that `buf` still holds at least `need` bytes.
pub fn ensure(buf: &impl Buf, need: usize) -> Result<(), WireError> {
    if buf.remaining() < need {
        return Err(WireError::ShortBuffer {
            need,
            have: buf.remaining(),
        });
    }
    Ok(())
}

/// Append `items` as a framed list: big-endian `u32` count, then each item.
pub fn encode_list<T: WireCodec>(items: &[T], buf: &mut BytesMut) -> Result<(), WireError> {
    buf.put_u32(items.len() as u32);
    for item in items {
        item.encode(buf)?;
    }
    Ok(())
}

/// Decode a framed list written by [`encode_list`].
pub fn decode_list<T: WireCodec>(buf: &mut impl Buf) -> Result<Vec<T>, WireError> {
    ensure(buf, 4)?;
    let count = buf.get_u32() as usize;
    let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        items.push(T::decode(buf)?);
    }
    Ok(items)
}

// Disappearance sections are plain lists of ball ids.
impl WireCodec for u16 {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u16(*self);
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        ensure(buf, 2)?;
        Ok(buf.get_u16())
    }
}
