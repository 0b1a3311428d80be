//! Packet crypto strategies.
//!
//! [`PacketCrypto`] is the context the data channel holds: one of two
//! strategies, chosen once from configuration. Both expose the same five
//! operations (`configure_encryption`, `configure_decryption`, `encrypt`,
//! `decrypt`, `verify`) and the same failure model.

pub mod aead;
pub mod cbc_hmac;
pub mod flags;

use std::{fmt, sync::Arc};

pub use aead::{AEAD_NONCE_LEN, AEAD_TAG_LEN, AeadAlgorithm, AeadCrypto};
pub use cbc_hmac::CbcHmacCrypto;
pub use flags::PacketFlags;

use crate::{
    config::{CryptoConfig, CryptoSuite},
    env::RandomSource,
    error::CryptoError,
    key::SecureKey,
};

/// Packet id width used by the CBC-HMAC data channel (32-bit ids).
pub const CBC_PACKET_ID_LEN: usize = 4;

/// Which half of a session a set of keys belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outbound packets
    Encrypt,
    /// Inbound packets
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Interpret big-endian packet id bytes (at most 8).
pub(crate) fn decode_packet_id(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// A configured packet crypto context.
///
/// The strategy is fixed at construction. Each direction has its own keys;
/// installing keys for one direction never affects the other.
#[derive(Debug)]
pub enum PacketCrypto {
    /// CBC cipher (or none) plus HMAC
    CbcHmac(CbcHmacCrypto),
    /// AES-GCM or ChaCha20-Poly1305
    Aead(AeadCrypto),
}

impl PacketCrypto {
    /// Resolve `config` and build an unconfigured context.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm`: unknown cipher or digest name
    /// - `InvalidPacketIdLength`: AEAD packet id width is not 4 or 8
    pub fn from_config(
        config: &CryptoConfig,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, CryptoError> {
        Self::from_suite(config.resolve()?, random)
    }

    /// Build an unconfigured context for an already resolved suite.
    pub fn from_suite(
        suite: CryptoSuite,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, CryptoError> {
        match suite {
            CryptoSuite::CbcHmac { cipher, digest } => {
                Ok(Self::CbcHmac(CbcHmacCrypto::new(cipher, digest, random)))
            },
            CryptoSuite::Aead { algorithm, packet_id_len } => {
                Ok(Self::Aead(AeadCrypto::new(algorithm, packet_id_len)?))
            },
        }
    }

    /// Strategy name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CbcHmac(_) => "cbc-hmac",
            Self::Aead(_) => "aead",
        }
    }

    /// Packet id width in bytes for this strategy.
    pub fn packet_id_len(&self) -> usize {
        match self {
            Self::CbcHmac(_) => CBC_PACKET_ID_LEN,
            Self::Aead(crypto) => crypto.packet_id_len(),
        }
    }

    /// Bytes added to a payload of `payload_len` bytes on the wire.
    pub fn overhead(&self, payload_len: usize) -> usize {
        match self {
            Self::CbcHmac(crypto) => crypto.overhead(payload_len),
            Self::Aead(crypto) => crypto.overhead(),
        }
    }

    /// Install the encrypt-direction keys.
    ///
    /// For CBC-HMAC, `second_key` is the HMAC key and a missing cipher key
    /// selects authentication-only mode (when the suite has no cipher).
    /// For AEAD, the cipher key is required and `second_key` supplies the
    /// implicit nonce tail.
    pub fn configure_encryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        second_key: SecureKey,
    ) -> Result<(), CryptoError> {
        match self {
            Self::CbcHmac(crypto) => crypto.configure_encryption(cipher_key, second_key),
            Self::Aead(crypto) => crypto.configure_encryption(cipher_key, second_key),
        }
    }

    /// Install the decrypt-direction keys. See
    /// [`configure_encryption`](Self::configure_encryption).
    pub fn configure_decryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        second_key: SecureKey,
    ) -> Result<(), CryptoError> {
        match self {
            Self::CbcHmac(crypto) => crypto.configure_decryption(cipher_key, second_key),
            Self::Aead(crypto) => crypto.configure_decryption(cipher_key, second_key),
        }
    }

    /// Seal `payload` into a wire packet.
    pub fn encrypt(&self, payload: &[u8], flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::CbcHmac(crypto) => crypto.encrypt(payload, flags),
            Self::Aead(crypto) => crypto.encrypt(payload, flags),
        }
    }

    /// Authenticate and open a wire packet.
    pub fn decrypt(&self, packet: &[u8], flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::CbcHmac(crypto) => crypto.decrypt(packet, flags),
            Self::Aead(crypto) => crypto.decrypt(packet, flags),
        }
    }

    /// Authenticate a wire packet without returning its payload.
    pub fn verify(&self, packet: &[u8], flags: &PacketFlags<'_>) -> Result<(), CryptoError> {
        match self {
            Self::CbcHmac(crypto) => crypto.verify(packet, flags),
            Self::Aead(crypto) => crypto.verify(packet, flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{CipherAlgorithm, DigestAlgorithm},
        env::SystemRandom,
    };

    fn random() -> Arc<dyn RandomSource> {
        Arc::new(SystemRandom::new())
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Encrypt.to_string(), "encrypt");
        assert_eq!(Direction::Decrypt.to_string(), "decrypt");
    }

    #[test]
    fn decode_packet_id_is_big_endian() {
        assert_eq!(decode_packet_id(&[0x56, 0x34, 0x12, 0x00]), 0x5634_1200);
        assert_eq!(decode_packet_id(&u64::MAX.to_be_bytes()), u64::MAX);
        assert_eq!(decode_packet_id(&[]), 0);
    }

    #[test]
    fn default_config_is_aead() {
        let crypto = PacketCrypto::from_config(&CryptoConfig::default(), random()).unwrap();

        assert_eq!(crypto.name(), "aead");
        assert_eq!(crypto.packet_id_len(), 4);
        assert_eq!(crypto.overhead(100), 4 + AEAD_TAG_LEN);
    }

    #[test]
    fn cbc_suite_dispatches_to_cbc_hmac() {
        let suite = CryptoSuite::CbcHmac {
            cipher: Some(CipherAlgorithm::Aes256Cbc),
            digest: DigestAlgorithm::Sha1,
        };
        let mut crypto = PacketCrypto::from_suite(suite, random()).unwrap();
        assert_eq!(crypto.name(), "cbc-hmac");
        assert_eq!(crypto.packet_id_len(), CBC_PACKET_ID_LEN);

        crypto.configure_encryption(Some(SecureKey::zeroed(64)), SecureKey::zeroed(64)).unwrap();
        crypto.configure_decryption(Some(SecureKey::zeroed(64)), SecureKey::zeroed(64)).unwrap();

        let packet = crypto.encrypt(b"payload", &PacketFlags::default()).unwrap();
        assert_eq!(packet.len(), 7 + crypto.overhead(7));
        assert!(crypto.verify(&packet, &PacketFlags::default()).is_ok());
        assert_eq!(crypto.decrypt(&packet, &PacketFlags::default()).unwrap(), b"payload");
    }

    #[test]
    fn directions_are_independent() {
        let mut crypto = PacketCrypto::from_config(&CryptoConfig::default(), random()).unwrap();
        crypto
            .configure_encryption(Some(SecureKey::from_slice(&[1; 32])), SecureKey::zeroed(8))
            .unwrap();
        crypto
            .configure_decryption(Some(SecureKey::from_slice(&[2; 32])), SecureKey::zeroed(8))
            .unwrap();

        let packet = crypto.encrypt(b"payload", &PacketFlags::new(&[0, 0, 0, 1], &[])).unwrap();

        assert_eq!(
            crypto.decrypt(&packet, &PacketFlags::default()),
            Err(CryptoError::AuthenticationFailed)
        );
    }
}
