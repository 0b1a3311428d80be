//! CBC block cipher engine (AES in CBC mode with PKCS#7 padding)

use std::{fmt, str::FromStr};

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{
    BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7,
};

use crate::{error::CryptoError, key::SecureKey};

/// AES block size (16 bytes)
const AES_BLOCK_SIZE: usize = 16;

/// Named CBC cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    /// AES-128-CBC
    Aes128Cbc,
    /// AES-192-CBC
    Aes192Cbc,
    /// AES-256-CBC
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    /// Block length in bytes.
    pub fn block_len(self) -> usize {
        AES_BLOCK_SIZE
    }

    /// IV length in bytes (one block for CBC).
    pub fn iv_len(self) -> usize {
        self.block_len()
    }

    /// Ciphertext length for a plaintext of `plaintext_len` bytes.
    ///
    /// PKCS#7 always adds between 1 and `block_len` bytes.
    pub fn ciphertext_len(self, plaintext_len: usize) -> usize {
        let block = self.block_len();
        (plaintext_len / block + 1) * block
    }
}

impl FromStr for CipherAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-128-cbc" => Ok(Self::Aes128Cbc),
            "aes-192-cbc" => Ok(Self::Aes192Cbc),
            "aes-256-cbc" => Ok(Self::Aes256Cbc),
            _ => Err(CryptoError::UnsupportedAlgorithm { name: s.to_string() }),
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A CBC cipher bound to one key.
///
/// The IV is supplied per call, so one engine serves every packet of a
/// direction.
#[derive(Debug)]
pub struct CipherEngine {
    algorithm: CipherAlgorithm,
    key: SecureKey,
}

impl CipherEngine {
    /// Bind `algorithm` to the leading bytes of `key`.
    pub fn new(algorithm: CipherAlgorithm, key: SecureKey) -> Result<Self, CryptoError> {
        let key = key.truncate(algorithm.key_len())?;
        Ok(Self { algorithm, key })
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    /// Block length in bytes.
    pub fn block_len(&self) -> usize {
        self.algorithm.block_len()
    }

    /// IV length in bytes.
    pub fn iv_len(&self) -> usize {
        self.algorithm.iv_len()
    }

    /// Ciphertext length for a plaintext of `plaintext_len` bytes.
    pub fn ciphertext_len(&self, plaintext_len: usize) -> usize {
        self.algorithm.ciphertext_len(plaintext_len)
    }

    /// Pad and encrypt `plaintext` under `iv`.
    pub fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.key.as_bytes();
        match self.algorithm {
            CipherAlgorithm::Aes128Cbc => encrypt_cbc::<Aes128>(key, iv, plaintext),
            CipherAlgorithm::Aes192Cbc => encrypt_cbc::<Aes192>(key, iv, plaintext),
            CipherAlgorithm::Aes256Cbc => encrypt_cbc::<Aes256>(key, iv, plaintext),
        }
    }

    /// Decrypt `ciphertext` under `iv` and strip the padding.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed`: ciphertext is not a whole number of blocks or the
    ///   padding is invalid
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % self.block_len() != 0 {
            return Err(CryptoError::DecryptionFailed {
                reason: "ciphertext is not a whole number of blocks",
            });
        }

        let key = self.key.as_bytes();
        match self.algorithm {
            CipherAlgorithm::Aes128Cbc => decrypt_cbc::<Aes128>(key, iv, ciphertext),
            CipherAlgorithm::Aes192Cbc => decrypt_cbc::<Aes192>(key, iv, ciphertext),
            CipherAlgorithm::Aes256Cbc => decrypt_cbc::<Aes256>(key, iv, ciphertext),
        }
    }
}

fn encrypt_cbc<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| CryptoError::EncryptionFailed { reason: format!("CBC init: {e}") })?;

    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn decrypt_cbc<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| CryptoError::DecryptionFailed { reason: "invalid IV length" })?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed { reason: "invalid padding" })
}
