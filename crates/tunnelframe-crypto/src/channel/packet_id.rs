//! Outbound packet id assignment.

use crate::error::CryptoError;

/// Per-direction packet id source.
///
/// Ids start at 1 and increase by one per packet. They never wrap: once the
/// id space of the configured width is used up, [`next_id`](Self::next_id)
/// fails until the session rekeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIdCounter {
    width: usize,
    /// Next id to hand out, `None` once exhausted
    next: Option<u64>,
}

impl PacketIdCounter {
    /// Counter producing ids `width` bytes wide (4 or 8).
    pub fn new(width: usize) -> Result<Self, CryptoError> {
        if width != 4 && width != 8 {
            return Err(CryptoError::InvalidPacketIdLength { expected: 4, actual: width });
        }

        Ok(Self { width, next: Some(1) })
    }

    /// Id width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Largest id representable at this width.
    pub fn max_id(&self) -> u64 {
        if self.width == 8 { u64::MAX } else { u64::from(u32::MAX) }
    }

    /// Assign the next packet id.
    ///
    /// # Errors
    ///
    /// - `PacketIdExhausted`: every id of this width has been handed out
    pub fn next_id(&mut self) -> Result<u64, CryptoError> {
        let id = self.next.filter(|&id| id <= self.max_id()).ok_or(CryptoError::PacketIdExhausted)?;
        self.next = id.checked_add(1);
        Ok(id)
    }

    /// Big-endian wire encoding of `id` at this width.
    pub fn encode(&self, id: u64) -> Vec<u8> {
        id.to_be_bytes()[8 - self.width..].to_vec()
    }

    /// Start over at 1. Only valid together with fresh keys.
    pub fn reset(&mut self) {
        self.next = Some(1);
    }
}
