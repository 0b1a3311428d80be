//! HMAC engine

use std::{fmt, str::FromStr};

use hmac::{Hmac, Mac, digest::KeyInit};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::{error::CryptoError, key::SecureKey};

/// Named hash function used for HMAC tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// HMAC-SHA1 (20-byte tag)
    Sha1,
    /// HMAC-SHA256 (32-byte tag)
    Sha256,
    /// HMAC-SHA512 (64-byte tag)
    Sha512,
}

impl DigestAlgorithm {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Tag length in bytes. Also the HMAC key length used.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(CryptoError::UnsupportedAlgorithm { name: s.to_string() }),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An HMAC bound to one key.
///
/// Messages are passed as a list of parts so callers can authenticate
/// `IV ‖ ciphertext` without concatenating them first.
#[derive(Debug)]
pub struct DigestEngine {
    algorithm: DigestAlgorithm,
    key: SecureKey,
}

impl DigestEngine {
    /// Bind `algorithm` to the leading `output_len` bytes of `key`.
    pub fn new(algorithm: DigestAlgorithm, key: SecureKey) -> Result<Self, CryptoError> {
        let key = key.truncate(algorithm.output_len())?;
        Ok(Self { algorithm, key })
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Tag length in bytes.
    pub fn tag_len(&self) -> usize {
        self.algorithm.output_len()
    }

    /// Compute the tag over the concatenation of `parts`.
    pub fn sign(&self, parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
        let key = self.key.as_bytes();
        match self.algorithm {
            DigestAlgorithm::Sha1 => hmac_parts::<Hmac<Sha1>>(key, parts),
            DigestAlgorithm::Sha256 => hmac_parts::<Hmac<Sha256>>(key, parts),
            DigestAlgorithm::Sha512 => hmac_parts::<Hmac<Sha512>>(key, parts),
        }
    }

    /// Recompute the tag over `parts` and compare it with `tag` in constant
    /// time.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed`: tag mismatch (including a wrong-length tag)
    pub fn verify(&self, parts: &[&[u8]], tag: &[u8]) -> Result<(), CryptoError> {
        let expected = self.sign(parts).map_err(|_| CryptoError::AuthenticationFailed)?;

        if bool::from(expected.as_slice().ct_eq(tag)) {
            Ok(())
        } else {
            Err(CryptoError::AuthenticationFailed)
        }
    }
}

fn hmac_parts<M>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError>
where
    M: Mac + KeyInit,
{
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionFailed { reason: format!("HMAC init: {e}") })?;

    for part in parts {
        mac.update(part);
    }

    Ok(mac.finalize().into_bytes().to_vec())
}
