//! Per-packet inputs passed alongside every encrypt/decrypt/verify call.

/// Transient metadata for one packet. Built fresh per packet, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags<'a> {
    /// Packet id bytes as assigned by the session layer (big-endian).
    ///
    /// AEAD uses them as the explicit nonce. CBC-HMAC does not consume them;
    /// the data channel prefixes them to the plaintext instead.
    pub packet_id: &'a [u8],
    /// Associated data authenticated alongside the payload (AEAD only).
    pub ad: &'a [u8],
    /// Reproducible output for known-answer tests.
    ///
    /// CBC-HMAC uses an all-zero IV and AEAD skips its nonce-reuse guard.
    /// Never set this outside tests.
    pub deterministic: bool,
}

impl<'a> PacketFlags<'a> {
    /// Flags for production traffic.
    pub fn new(packet_id: &'a [u8], ad: &'a [u8]) -> Self {
        Self { packet_id, ad, deterministic: false }
    }

    /// Flags producing reproducible output.
    pub fn for_testing(packet_id: &'a [u8], ad: &'a [u8]) -> Self {
        Self { packet_id, ad, deterministic: true }
    }
}
