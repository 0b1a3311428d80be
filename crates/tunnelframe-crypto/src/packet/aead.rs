//! AEAD packet construction (AES-GCM, ChaCha20-Poly1305).
//!
//! Wire layout:
//!
//! ```text
//! [ packet id (explicit nonce) | ciphertext | 16-byte tag ]
//! ```
//!
//! The 12-byte nonce is `packet id ‖ implicit IV`. The packet id travels on
//! the wire and the implicit IV tail comes from the second key slot handed
//! to `configure_*`. Associated data goes to the primitive's AD input. A
//! nonce must never repeat under one key, so outside deterministic mode
//! every context refuses to seal a packet id it has already passed.

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use aes_gcm::{
    Aes128Gcm, Aes256Gcm,
    aead::{Aead, KeyInit, Payload, generic_array::GenericArray},
};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroize;

use super::{Direction, decode_packet_id, flags::PacketFlags};
use crate::{error::CryptoError, key::SecureKey};

/// AEAD nonce size (96-bit)
pub const AEAD_NONCE_LEN: usize = 12;

/// AEAD authentication tag size (128-bit)
pub const AEAD_TAG_LEN: usize = 16;

/// Default explicit packet id width in bytes
pub const DEFAULT_PACKET_ID_LEN: usize = 4;

/// Named AEAD cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128-GCM
    Aes128Gcm,
    /// AES-256-GCM
    Aes256Gcm,
    /// ChaCha20-Poly1305 (RFC 8439)
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm | Self::ChaCha20Poly1305 => 32,
        }
    }
}

impl FromStr for AeadAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            _ => Err(CryptoError::UnsupportedAlgorithm { name: s.to_string() }),
        }
    }
}

impl fmt::Display for AeadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keys installed for one direction.
struct DirectionKeys {
    key: SecureKey,
    implicit_iv: SecureKey,
}

/// AEAD strategy.
pub struct AeadCrypto {
    algorithm: AeadAlgorithm,
    packet_id_len: usize,
    encrypt: Option<DirectionKeys>,
    decrypt: Option<DirectionKeys>,
    /// Lowest packet id this context may still seal
    next_packet_id: AtomicU64,
}

impl AeadCrypto {
    /// Create an unconfigured context.
    ///
    /// `packet_id_len` is the explicit nonce width: 4 (short packet ids)
    /// or 8 (long packet ids).
    pub fn new(algorithm: AeadAlgorithm, packet_id_len: usize) -> Result<Self, CryptoError> {
        if packet_id_len != 4 && packet_id_len != 8 {
            return Err(CryptoError::InvalidPacketIdLength {
                expected: DEFAULT_PACKET_ID_LEN,
                actual: packet_id_len,
            });
        }

        Ok(Self {
            algorithm,
            packet_id_len,
            encrypt: None,
            decrypt: None,
            next_packet_id: AtomicU64::new(0),
        })
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    /// Explicit packet id width in bytes.
    pub fn packet_id_len(&self) -> usize {
        self.packet_id_len
    }

    /// Bytes added to every payload on the wire.
    pub fn overhead(&self) -> usize {
        self.packet_id_len + AEAD_TAG_LEN
    }

    /// Install the keys used by [`encrypt`](Self::encrypt).
    ///
    /// `cipher_key` is required. `implicit_iv` supplies the nonce tail
    /// (its leading `12 - packet_id_len` bytes).
    pub fn configure_encryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        implicit_iv: SecureKey,
    ) -> Result<(), CryptoError> {
        self.encrypt = Some(self.install(Direction::Encrypt, cipher_key, implicit_iv)?);
        // Fresh key, fresh nonce space
        self.next_packet_id.store(0, Ordering::Release);
        Ok(())
    }

    /// Install the keys used by [`decrypt`](Self::decrypt) and
    /// [`verify`](Self::verify).
    pub fn configure_decryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        implicit_iv: SecureKey,
    ) -> Result<(), CryptoError> {
        self.decrypt = Some(self.install(Direction::Decrypt, cipher_key, implicit_iv)?);
        Ok(())
    }

    fn install(
        &self,
        direction: Direction,
        cipher_key: Option<SecureKey>,
        implicit_iv: SecureKey,
    ) -> Result<DirectionKeys, CryptoError> {
        let key = cipher_key.ok_or(CryptoError::MissingCipherKey)?;
        let key = key.truncate(self.algorithm.key_len())?;
        let implicit_iv = implicit_iv.truncate(AEAD_NONCE_LEN - self.packet_id_len)?;

        tracing::debug!(
            %direction,
            algorithm = %self.algorithm,
            packet_id_len = self.packet_id_len,
            "AEAD keys installed"
        );

        Ok(DirectionKeys { key, implicit_iv })
    }

    /// Seal `payload` into `packet id ‖ ciphertext ‖ tag`.
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: encryption keys were never installed
    /// - `InvalidPacketIdLength`: `flags.packet_id` has the wrong width
    /// - `EncryptionFailed`: the packet id was already used under this key,
    ///   or the primitive failed
    ///
    /// Outside deterministic mode, packet ids must be sealed in strictly
    /// increasing order under one key. Callers that seal from several
    /// threads must serialize id assignment and sealing: if id 5 is sealed
    /// before id 4, sealing id 4 fails with `EncryptionFailed`.
    pub fn encrypt(&self, payload: &[u8], flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        let keys = self
            .encrypt
            .as_ref()
            .ok_or(CryptoError::NotConfigured { direction: Direction::Encrypt })?;

        if flags.packet_id.len() != self.packet_id_len {
            return Err(CryptoError::InvalidPacketIdLength {
                expected: self.packet_id_len,
                actual: flags.packet_id.len(),
            });
        }

        if !flags.deterministic {
            self.claim_packet_id(decode_packet_id(flags.packet_id))?;
        }

        let nonce = self.nonce(flags.packet_id, &keys.implicit_iv);
        let sealed = seal(self.algorithm, keys.key.as_bytes(), &nonce, payload, flags.ad)?;

        let mut packet = Vec::with_capacity(self.packet_id_len + sealed.len());
        packet.extend_from_slice(flags.packet_id);
        packet.extend_from_slice(&sealed);
        Ok(packet)
    }

    /// Authenticate and open a packet produced by [`encrypt`](Self::encrypt).
    ///
    /// The packet id is read from the wire. A non-empty `flags.packet_id`
    /// must match it.
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: decryption keys were never installed
    /// - `AuthenticationFailed`: packet too short, packet id mismatch, or
    ///   tag mismatch
    pub fn decrypt(&self, packet: &[u8], flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        let keys = self
            .decrypt
            .as_ref()
            .ok_or(CryptoError::NotConfigured { direction: Direction::Decrypt })?;

        if packet.len() < self.packet_id_len + AEAD_TAG_LEN {
            tracing::trace!(len = packet.len(), "packet shorter than AEAD header");
            return Err(CryptoError::AuthenticationFailed);
        }

        let (packet_id, sealed) = packet.split_at(self.packet_id_len);
        if !flags.packet_id.is_empty() && flags.packet_id != packet_id {
            tracing::trace!("AEAD packet id does not match expected id");
            return Err(CryptoError::AuthenticationFailed);
        }

        let nonce = self.nonce(packet_id, &keys.implicit_iv);
        open(self.algorithm, keys.key.as_bytes(), &nonce, sealed, flags.ad).inspect_err(|_| {
            tracing::trace!(len = packet.len(), "AEAD tag mismatch");
        })
    }

    /// Check the packet's tag.
    ///
    /// The primitive verifies while decrypting, so the plaintext is produced
    /// and wiped immediately.
    pub fn verify(&self, packet: &[u8], flags: &PacketFlags<'_>) -> Result<(), CryptoError> {
        let mut plaintext = self.decrypt(packet, flags)?;
        plaintext.zeroize();
        Ok(())
    }

    fn nonce(&self, packet_id: &[u8], implicit_iv: &SecureKey) -> [u8; AEAD_NONCE_LEN] {
        let mut nonce = [0u8; AEAD_NONCE_LEN];
        nonce[..self.packet_id_len].copy_from_slice(packet_id);
        nonce[self.packet_id_len..].copy_from_slice(implicit_iv.as_bytes());
        nonce
    }

    /// Reserve `packet_id` for sealing, rejecting anything not strictly
    /// above what this key already sealed. Ids skipped by a concurrent
    /// higher claim are lost for this key.
    fn claim_packet_id(&self, packet_id: u64) -> Result<(), CryptoError> {
        let next = packet_id.checked_add(1).ok_or(CryptoError::PacketIdExhausted)?;

        self.next_packet_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |floor| {
                (packet_id >= floor).then_some(next)
            })
            .map(|_| ())
            .map_err(|floor| {
                tracing::trace!(packet_id, floor, "refusing to reuse AEAD nonce");
                CryptoError::EncryptionFailed {
                    reason: format!("packet id {packet_id} already used under this key"),
                }
            })
    }
}

impl fmt::Debug for AeadCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadCrypto")
            .field("algorithm", &self.algorithm)
            .field("packet_id_len", &self.packet_id_len)
            .field("encrypt_configured", &self.encrypt.is_some())
            .field("decrypt_configured", &self.decrypt.is_some())
            .finish_non_exhaustive()
    }
}

fn seal(
    algorithm: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8; AEAD_NONCE_LEN],
    msg: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce = GenericArray::from_slice(nonce);
    let payload = Payload { msg, aad };

    let sealed = match algorithm {
        AeadAlgorithm::Aes128Gcm => new_cipher::<Aes128Gcm>(key)?.encrypt(nonce, payload),
        AeadAlgorithm::Aes256Gcm => new_cipher::<Aes256Gcm>(key)?.encrypt(nonce, payload),
        AeadAlgorithm::ChaCha20Poly1305 => {
            new_cipher::<ChaCha20Poly1305>(key)?.encrypt(nonce, payload)
        },
    };

    sealed.map_err(|e| CryptoError::EncryptionFailed { reason: format!("{algorithm}: {e}") })
}

fn open(
    algorithm: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8; AEAD_NONCE_LEN],
    msg: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce = GenericArray::from_slice(nonce);
    let payload = Payload { msg, aad };

    let opened = match algorithm {
        AeadAlgorithm::Aes128Gcm => new_cipher::<Aes128Gcm>(key)?.decrypt(nonce, payload),
        AeadAlgorithm::Aes256Gcm => new_cipher::<Aes256Gcm>(key)?.decrypt(nonce, payload),
        AeadAlgorithm::ChaCha20Poly1305 => {
            new_cipher::<ChaCha20Poly1305>(key)?.decrypt(nonce, payload)
        },
    };

    opened.map_err(|_| CryptoError::AuthenticationFailed)
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> Result<C, CryptoError> {
    C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: C::key_size(),
        actual: key.len(),
    })
}
