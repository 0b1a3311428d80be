//! Legacy CBC + HMAC packet construction.
//!
//! Wire layout:
//!
//! ```text
//! [ HMAC tag (digest length) | IV (cipher block length) | ciphertext ]   with cipher
//! [ HMAC tag (digest length) | plaintext ]                               without cipher
//! ```
//!
//! The tag covers `IV ‖ ciphertext` (or the plaintext alone without a
//! cipher). It is placed first so the receiver authenticates the packet
//! before any cipher state is touched. Decryption is strictly
//! MAC-then-decrypt: a packet whose tag does not verify is never fed to the
//! cipher.

use std::{fmt, sync::Arc};

use super::{Direction, flags::PacketFlags};
use crate::{
    engine::{CipherAlgorithm, CipherEngine, DigestAlgorithm, DigestEngine},
    env::RandomSource,
    error::CryptoError,
    key::SecureKey,
};

/// Keys installed for one direction.
struct DirectionKeys {
    cipher: Option<CipherEngine>,
    hmac: DigestEngine,
}

impl DirectionKeys {
    fn iv_len(&self) -> usize {
        self.cipher.as_ref().map_or(0, CipherEngine::iv_len)
    }
}

/// CBC-HMAC strategy. A `None` cipher selects authentication-only mode.
pub struct CbcHmacCrypto {
    cipher: Option<CipherAlgorithm>,
    digest: DigestAlgorithm,
    random: Arc<dyn RandomSource>,
    encrypt: Option<DirectionKeys>,
    decrypt: Option<DirectionKeys>,
}

impl CbcHmacCrypto {
    /// Create an unconfigured context for the given algorithms.
    ///
    /// `random` supplies IVs whenever a packet is not sealed in
    /// deterministic mode.
    pub fn new(
        cipher: Option<CipherAlgorithm>,
        digest: DigestAlgorithm,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self { cipher, digest, random, encrypt: None, decrypt: None }
    }

    /// Configured cipher, if any.
    pub fn cipher(&self) -> Option<CipherAlgorithm> {
        self.cipher
    }

    /// Configured digest.
    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    /// Bytes added to a payload of `payload_len` bytes on the wire.
    pub fn overhead(&self, payload_len: usize) -> usize {
        let tag = self.digest.output_len();
        match self.cipher {
            Some(cipher) => {
                tag + cipher.iv_len() + cipher.ciphertext_len(payload_len) - payload_len
            },
            None => tag,
        }
    }

    /// Install the keys used by [`encrypt`](Self::encrypt).
    pub fn configure_encryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        hmac_key: SecureKey,
    ) -> Result<(), CryptoError> {
        self.encrypt = Some(self.install(Direction::Encrypt, cipher_key, hmac_key)?);
        Ok(())
    }

    /// Install the keys used by [`decrypt`](Self::decrypt) and
    /// [`verify`](Self::verify).
    pub fn configure_decryption(
        &mut self,
        cipher_key: Option<SecureKey>,
        hmac_key: SecureKey,
    ) -> Result<(), CryptoError> {
        self.decrypt = Some(self.install(Direction::Decrypt, cipher_key, hmac_key)?);
        Ok(())
    }

    fn install(
        &self,
        direction: Direction,
        cipher_key: Option<SecureKey>,
        hmac_key: SecureKey,
    ) -> Result<DirectionKeys, CryptoError> {
        let cipher = match (self.cipher, cipher_key) {
            (Some(algorithm), Some(key)) => Some(CipherEngine::new(algorithm, key)?),
            (Some(_), None) => return Err(CryptoError::MissingCipherKey),
            (None, Some(_unused)) => {
                tracing::debug!(%direction, "ignoring cipher key in authentication-only mode");
                None
            },
            (None, None) => None,
        };
        let hmac = DigestEngine::new(self.digest, hmac_key)?;

        tracing::debug!(
            %direction,
            cipher = self.cipher.map_or("none", CipherAlgorithm::name),
            digest = %self.digest,
            "CBC-HMAC keys installed"
        );

        Ok(DirectionKeys { cipher, hmac })
    }

    /// Seal `payload` into `tag ‖ IV ‖ ciphertext` (or `tag ‖ payload`).
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: encryption keys were never installed
    /// - `EncryptionFailed`: IV generation or a primitive failed
    pub fn encrypt(&self, payload: &[u8], flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        let keys = self
            .encrypt
            .as_ref()
            .ok_or(CryptoError::NotConfigured { direction: Direction::Encrypt })?;

        match &keys.cipher {
            Some(cipher) => {
                let mut iv = vec![0u8; cipher.iv_len()];
                if !flags.deterministic {
                    self.random.random_bytes(&mut iv).map_err(|e| {
                        CryptoError::EncryptionFailed { reason: format!("IV generation: {e}") }
                    })?;
                }

                let ciphertext = cipher.encrypt(&iv, payload)?;
                let tag = keys.hmac.sign(&[&iv, &ciphertext])?;

                let mut packet = Vec::with_capacity(tag.len() + iv.len() + ciphertext.len());
                packet.extend_from_slice(&tag);
                packet.extend_from_slice(&iv);
                packet.extend_from_slice(&ciphertext);
                Ok(packet)
            },
            None => {
                let tag = keys.hmac.sign(&[payload])?;

                let mut packet = Vec::with_capacity(tag.len() + payload.len());
                packet.extend_from_slice(&tag);
                packet.extend_from_slice(payload);
                Ok(packet)
            },
        }
    }

    /// Authenticate and open a packet produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: decryption keys were never installed
    /// - `AuthenticationFailed`: packet too short or tag mismatch
    /// - `DecryptionFailed`: authenticated ciphertext has invalid padding
    pub fn decrypt(&self, packet: &[u8], _flags: &PacketFlags<'_>) -> Result<Vec<u8>, CryptoError> {
        let keys = self.decryption_keys()?;
        let body = authenticate(keys, packet)?;

        let Some(cipher) = &keys.cipher else {
            return Ok(body.to_vec());
        };

        let (iv, ciphertext) = body.split_at(cipher.iv_len());
        cipher.decrypt(iv, ciphertext).inspect_err(|e| {
            tracing::trace!(error = %e, "authenticated CBC packet failed to decrypt");
        })
    }

    /// Check the packet's tag without decrypting it.
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: decryption keys were never installed
    /// - `AuthenticationFailed`: packet too short or tag mismatch
    pub fn verify(&self, packet: &[u8], _flags: &PacketFlags<'_>) -> Result<(), CryptoError> {
        let keys = self.decryption_keys()?;
        authenticate(keys, packet).map(|_| ())
    }

    fn decryption_keys(&self) -> Result<&DirectionKeys, CryptoError> {
        self.decrypt.as_ref().ok_or(CryptoError::NotConfigured { direction: Direction::Decrypt })
    }
}

/// Split off the tag, verify it over the rest, and return the rest.
fn authenticate<'p>(keys: &DirectionKeys, packet: &'p [u8]) -> Result<&'p [u8], CryptoError> {
    let tag_len = keys.hmac.tag_len();
    if packet.len() < tag_len + keys.iv_len() {
        tracing::trace!(len = packet.len(), "packet shorter than CBC-HMAC header");
        return Err(CryptoError::AuthenticationFailed);
    }

    let (tag, body) = packet.split_at(tag_len);
    keys.hmac.verify(&[body], tag).inspect_err(|_| {
        tracing::trace!(len = packet.len(), "CBC-HMAC tag mismatch");
    })?;

    Ok(body)
}

impl fmt::Debug for CbcHmacCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcHmacCrypto")
            .field("cipher", &self.cipher)
            .field("digest", &self.digest)
            .field("encrypt_configured", &self.encrypt.is_some())
            .field("decrypt_configured", &self.decrypt.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EntropyError;

    struct FixedRandom(u8);

    impl RandomSource for FixedRandom {
        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
            buffer.fill(self.0);
            Ok(())
        }
    }

    struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("no entropy".to_string()))
        }
    }

    fn context(cipher: Option<CipherAlgorithm>, random: Arc<dyn RandomSource>) -> CbcHmacCrypto {
        let mut crypto = CbcHmacCrypto::new(cipher, DigestAlgorithm::Sha256, random);
        let cipher_key = cipher.map(|_| SecureKey::from_slice(&[0x33; 32]));
        let decrypt_cipher_key = cipher.map(|_| SecureKey::from_slice(&[0x33; 32]));
        crypto.configure_encryption(cipher_key, SecureKey::from_slice(&[0x44; 32])).unwrap();
        crypto
            .configure_decryption(decrypt_cipher_key, SecureKey::from_slice(&[0x44; 32]))
            .unwrap();
        crypto
    }

    #[test]
    fn unconfigured_encrypt_fails() {
        let crypto =
            CbcHmacCrypto::new(None, DigestAlgorithm::Sha256, Arc::new(FixedRandom(0)));
        let result = crypto.encrypt(b"payload", &PacketFlags::default());

        assert_eq!(result, Err(CryptoError::NotConfigured { direction: Direction::Encrypt }));
    }

    #[test]
    fn encrypt_only_context_cannot_decrypt() {
        let mut crypto =
            CbcHmacCrypto::new(None, DigestAlgorithm::Sha256, Arc::new(FixedRandom(0)));
        crypto.configure_encryption(None, SecureKey::zeroed(32)).unwrap();

        let packet = crypto.encrypt(b"payload", &PacketFlags::default()).unwrap();

        assert_eq!(
            crypto.decrypt(&packet, &PacketFlags::default()),
            Err(CryptoError::NotConfigured { direction: Direction::Decrypt })
        );
        assert_eq!(
            crypto.verify(&packet, &PacketFlags::default()),
            Err(CryptoError::NotConfigured { direction: Direction::Decrypt })
        );
    }

    #[test]
    fn missing_cipher_key_is_rejected() {
        let mut crypto = CbcHmacCrypto::new(
            Some(CipherAlgorithm::Aes128Cbc),
            DigestAlgorithm::Sha256,
            Arc::new(FixedRandom(0)),
        );

        let result = crypto.configure_encryption(None, SecureKey::zeroed(32));
        assert_eq!(result, Err(CryptoError::MissingCipherKey));
    }

    #[test]
    fn random_iv_comes_from_injected_source() {
        let crypto = context(Some(CipherAlgorithm::Aes128Cbc), Arc::new(FixedRandom(0xA5)));
        let packet = crypto.encrypt(b"payload", &PacketFlags::new(&[0, 0, 0, 1], &[])).unwrap();

        assert_eq!(&packet[32..48], &[0xA5; 16]);
    }

    #[test]
    fn deterministic_iv_is_zero() {
        let crypto = context(Some(CipherAlgorithm::Aes128Cbc), Arc::new(FixedRandom(0xA5)));
        let packet =
            crypto.encrypt(b"payload", &PacketFlags::for_testing(&[0, 0, 0, 1], &[])).unwrap();

        assert_eq!(&packet[32..48], &[0u8; 16]);
    }

    #[test]
    fn entropy_failure_is_encryption_failure() {
        let crypto = context(Some(CipherAlgorithm::Aes256Cbc), Arc::new(BrokenRandom));
        let result = crypto.encrypt(b"payload", &PacketFlags::default());

        assert!(matches!(result, Err(CryptoError::EncryptionFailed { .. })));
    }

    #[test]
    fn overhead_matches_packet_length() {
        for cipher in [None, Some(CipherAlgorithm::Aes128Cbc), Some(CipherAlgorithm::Aes256Cbc)] {
            let crypto = context(cipher, Arc::new(FixedRandom(1)));
            for len in [0usize, 1, 15, 16, 17, 100] {
                let payload = vec![0x5A; len];
                let packet = crypto.encrypt(&payload, &PacketFlags::default()).unwrap();
                assert_eq!(packet.len(), len + crypto.overhead(len));
            }
        }
    }

    #[test]
    fn truncated_packet_fails_authentication() {
        let crypto = context(Some(CipherAlgorithm::Aes128Cbc), Arc::new(FixedRandom(1)));
        let packet = crypto.encrypt(b"payload", &PacketFlags::default()).unwrap();

        for len in [0, 10, 32, 47, packet.len() - 1] {
            assert_eq!(
                crypto.decrypt(&packet[..len], &PacketFlags::default()),
                Err(CryptoError::AuthenticationFailed),
                "truncated to {len} bytes"
            );
        }
    }

    #[test]
    fn tag_mismatch_never_reaches_cipher() {
        let crypto = context(Some(CipherAlgorithm::Aes128Cbc), Arc::new(FixedRandom(1)));
        let mut packet = crypto.encrypt(b"payload", &PacketFlags::default()).unwrap();

        // Corrupt the last ciphertext byte: padding would break too, but the
        // tag check must be what rejects it.
        let last = packet.len() - 1;
        packet[last] ^= 0xFF;

        assert_eq!(
            crypto.decrypt(&packet, &PacketFlags::default()),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn authenticated_garbage_padding_is_decryption_failure() {
        // A sender holding the MAC key but producing malformed ciphertext
        let mut crypto = CbcHmacCrypto::new(
            Some(CipherAlgorithm::Aes128Cbc),
            DigestAlgorithm::Sha256,
            Arc::new(FixedRandom(0)),
        );
        crypto
            .configure_decryption(Some(SecureKey::zeroed(16)), SecureKey::zeroed(32))
            .unwrap();

        let hmac = DigestEngine::new(DigestAlgorithm::Sha256, SecureKey::zeroed(32)).unwrap();
        let iv = [0u8; 16];
        let body = [0x77u8; 16];
        let tag = hmac.sign(&[&iv, &body]).unwrap();

        let mut packet = tag;
        packet.extend_from_slice(&iv);
        packet.extend_from_slice(&body);

        // AES-128(0^16)^-1(0x77^16) ends in 0xb9, which is not PKCS#7
        assert!(crypto.verify(&packet, &PacketFlags::default()).is_ok());
        assert_eq!(
            crypto.decrypt(&packet, &PacketFlags::default()),
            Err(CryptoError::DecryptionFailed { reason: "invalid padding" })
        );
    }
}
