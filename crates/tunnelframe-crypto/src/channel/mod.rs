//! Data-channel framing on top of the packet crypto context.
//!
//! [`DataChannel`] owns everything per-session around the packet transform:
//! outbound packet id assignment, inbound replay tracking and key rotation.
//!
//! Packet ids are bound into every packet:
//!
//! ```text
//! CBC-HMAC:  seal(packet id ‖ payload)          id inside MAC and cipher
//! AEAD:      [ packet id | ciphertext | tag ]   id is the explicit nonce
//! ```
//!
//! Associated data is only authenticated by AEAD. The CBC-HMAC tag covers
//! `IV ‖ ciphertext` alone, so a CBC-HMAC channel rejects non-empty `ad`
//! instead of dropping it.

pub mod packet_id;
pub mod replay;
pub mod slot;

use std::sync::Arc;

pub use packet_id::PacketIdCounter;
pub use replay::{REPLAY_WINDOW_SIZE, ReplayWindow};
pub use slot::KeySlot;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    packet::{PacketCrypto, PacketFlags, decode_packet_id},
};

/// One session's data channel.
#[derive(Debug)]
pub struct DataChannel {
    keys: KeySlot,
    outbound: PacketIdCounter,
    inbound: ReplayWindow,
}

impl DataChannel {
    /// Channel using a context whose directions are already configured.
    pub fn new(crypto: PacketCrypto) -> Result<Self, CryptoError> {
        let outbound = PacketIdCounter::new(crypto.packet_id_len())?;
        Ok(Self { keys: KeySlot::new(crypto), outbound, inbound: ReplayWindow::new() })
    }

    /// Slot holding the current keys.
    ///
    /// Workers that decrypt in parallel take snapshots from here.
    pub fn keys(&self) -> &KeySlot {
        &self.keys
    }

    /// Highest inbound packet id accepted so far.
    pub fn highest_received(&self) -> u64 {
        self.inbound.highest()
    }

    /// Assign the next packet id and seal `payload`.
    ///
    /// Under AEAD `ad` is authenticated alongside the payload. CBC-HMAC
    /// channels only accept empty `ad`.
    ///
    /// # Errors
    ///
    /// - `AssociatedDataUnsupported`: non-empty `ad` on a CBC-HMAC channel
    /// - `PacketIdExhausted`: the session must rekey before sending more
    /// - any error from the packet crypto context's `encrypt`
    pub fn seal(&mut self, payload: &[u8], ad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let crypto = self.keys.current();
        check_associated_data(&crypto, ad)?;
        let packet_id = self.outbound.next_id()?;
        let id_bytes = self.outbound.encode(packet_id);
        let flags = PacketFlags::new(&id_bytes, ad);

        match &*crypto {
            PacketCrypto::CbcHmac(_) => {
                let mut framed = Vec::with_capacity(id_bytes.len() + payload.len());
                framed.extend_from_slice(&id_bytes);
                framed.extend_from_slice(payload);

                let packet = crypto.encrypt(&framed, &flags);
                framed.zeroize();
                packet
            },
            PacketCrypto::Aead(_) => crypto.encrypt(payload, &flags),
        }
    }

    /// Authenticate, decrypt and replay-check an inbound packet.
    ///
    /// The replay window only moves for packets that authenticated. `ad`
    /// follows the same rule as in [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// - `AssociatedDataUnsupported`: non-empty `ad` on a CBC-HMAC channel
    /// - `AuthenticationFailed`: forged or corrupted packet
    /// - `DecryptionFailed`: authenticated packet is malformed
    /// - `Replay`: packet id already seen or too old
    pub fn open(&mut self, packet: &[u8], ad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let crypto = self.keys.current();
        check_associated_data(&crypto, ad)?;
        let width = crypto.packet_id_len();
        let flags = PacketFlags::new(&[], ad);

        let (packet_id, mut payload) = match &*crypto {
            PacketCrypto::CbcHmac(_) => {
                let mut framed = crypto.decrypt(packet, &flags)?;
                if framed.len() < width {
                    framed.zeroize();
                    return Err(CryptoError::DecryptionFailed { reason: "missing packet id" });
                }

                let payload = framed.split_off(width);
                let packet_id = decode_packet_id(&framed);
                framed.zeroize();
                (packet_id, payload)
            },
            PacketCrypto::Aead(_) => {
                let payload = crypto.decrypt(packet, &flags)?;
                // Authenticated as part of the nonce
                (decode_packet_id(&packet[..width]), payload)
            },
        };

        if let Err(err) = self.inbound.check(packet_id) {
            tracing::warn!(packet_id, highest = self.inbound.highest(), "dropping replayed packet");
            payload.zeroize();
            return Err(err);
        }

        self.inbound.accept(packet_id);
        Ok(payload)
    }

    /// Switch to freshly negotiated keys.
    ///
    /// Both packet id spaces start over, since ids are only unique per key.
    /// Returns the previous context; its keys are wiped once every
    /// outstanding snapshot is dropped.
    pub fn rekey(&mut self, crypto: PacketCrypto) -> Result<Arc<PacketCrypto>, CryptoError> {
        let outbound = PacketIdCounter::new(crypto.packet_id_len())?;
        let previous = self.keys.replace(crypto);

        self.outbound = outbound;
        self.inbound.reset();
        Ok(previous)
    }
}

fn check_associated_data(crypto: &PacketCrypto, ad: &[u8]) -> Result<(), CryptoError> {
    match crypto {
        PacketCrypto::CbcHmac(_) if !ad.is_empty() => {
            Err(CryptoError::AssociatedDataUnsupported { strategy: crypto.name() })
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CryptoConfig, env::SystemRandom, key::SecureKey};

    fn channel(cipher: &str) -> DataChannel {
        let config = CryptoConfig { cipher: Some(cipher.to_string()), ..CryptoConfig::default() };
        let mut crypto =
            PacketCrypto::from_config(&config, Arc::new(SystemRandom::new())).unwrap();
        crypto.configure_encryption(Some(SecureKey::zeroed(64)), SecureKey::zeroed(64)).unwrap();
        crypto.configure_decryption(Some(SecureKey::zeroed(64)), SecureKey::zeroed(64)).unwrap();
        DataChannel::new(crypto).unwrap()
    }

    #[test]
    fn loopback_roundtrip() {
        for (cipher, ad) in [("aes-128-cbc", &b""[..]), ("aes-256-gcm", &b"ad"[..])] {
            let mut channel = channel(cipher);

            let packet = channel.seal(b"ping", ad).unwrap();
            assert_eq!(channel.open(&packet, ad).unwrap(), b"ping", "{cipher}");
            assert_eq!(channel.highest_received(), 1);
        }
    }

    #[test]
    fn aead_packet_starts_with_packet_id() {
        let mut channel = channel("chacha20-poly1305");

        let first = channel.seal(b"a", &[]).unwrap();
        let second = channel.seal(b"b", &[]).unwrap();

        assert_eq!(&first[..4], &[0, 0, 0, 1]);
        assert_eq!(&second[..4], &[0, 0, 0, 2]);
    }

    #[test]
    fn replay_is_rejected_for_both_strategies() {
        for cipher in ["aes-256-cbc", "aes-128-gcm"] {
            let mut channel = channel(cipher);
            let packet = channel.seal(b"once", &[]).unwrap();

            channel.open(&packet, &[]).unwrap();
            assert_eq!(channel.open(&packet, &[]), Err(CryptoError::Replay { packet_id: 1 }));
        }
    }

    #[test]
    fn cbc_channel_rejects_associated_data() {
        for cipher in ["none", "aes-128-cbc"] {
            let mut channel = channel(cipher);
            let expected = CryptoError::AssociatedDataUnsupported { strategy: "cbc-hmac" };

            assert_eq!(channel.seal(b"payload", b"ad"), Err(expected.clone()), "{cipher}");

            let packet = channel.seal(b"payload", &[]).unwrap();
            assert_eq!(channel.open(&packet, b"ad"), Err(expected), "{cipher}");
            assert_eq!(channel.highest_received(), 0);
        }
    }

    #[test]
    fn forged_packet_does_not_move_window() {
        let mut channel = channel("aes-256-gcm");
        let mut packet = channel.seal(b"payload", &[]).unwrap();
        let last = packet.len() - 1;
        packet[last] ^= 0x01;

        assert_eq!(channel.open(&packet, &[]), Err(CryptoError::AuthenticationFailed));
        assert_eq!(channel.highest_received(), 0);
    }
}
