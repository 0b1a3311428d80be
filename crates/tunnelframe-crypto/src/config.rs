//! Algorithm selection.
//!
//! The session layer negotiates algorithm names as strings. [`CryptoConfig`]
//! carries them (and deserializes from whatever format the session uses);
//! [`CryptoConfig::resolve`] turns them into a typed [`CryptoSuite`] once, at
//! context construction.

use serde::{Deserialize, Serialize};

use crate::{
    engine::{CipherAlgorithm, DigestAlgorithm},
    error::CryptoError,
    packet::aead::{AeadAlgorithm, DEFAULT_PACKET_ID_LEN},
};

/// Default cipher name
pub const DEFAULT_CIPHER: &str = "aes-256-gcm";

/// Default digest name
pub const DEFAULT_DIGEST: &str = "sha256";

/// Negotiated algorithm names.
///
/// `cipher` selects the strategy: an AEAD name selects the AEAD strategy,
/// a CBC name selects CBC-HMAC, and `None` or `"none"` selects
/// authentication-only CBC-HMAC. `digest` is only used by CBC-HMAC.
/// `packet_id_len` is the AEAD explicit nonce width (CBC-HMAC always uses
/// 4-byte packet ids).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Cipher name, e.g. `aes-256-gcm` or `aes-128-cbc`
    pub cipher: Option<String>,
    /// HMAC digest name, e.g. `sha256`
    pub digest: String,
    /// Packet id width in bytes for AEAD (4 or 8)
    pub packet_id_len: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cipher: Some(DEFAULT_CIPHER.to_string()),
            digest: DEFAULT_DIGEST.to_string(),
            packet_id_len: DEFAULT_PACKET_ID_LEN,
        }
    }
}

/// Resolved algorithm suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoSuite {
    /// CBC cipher (or none) plus HMAC
    CbcHmac {
        /// Cipher, or `None` for authentication-only
        cipher: Option<CipherAlgorithm>,
        /// HMAC digest
        digest: DigestAlgorithm,
    },
    /// AEAD cipher with explicit packet-id nonce
    Aead {
        /// AEAD cipher
        algorithm: AeadAlgorithm,
        /// Explicit nonce width in bytes
        packet_id_len: usize,
    },
}

impl CryptoConfig {
    /// Validate the names and produce a typed suite.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm`: unknown cipher or digest name
    /// - `InvalidPacketIdLength`: AEAD packet id width is not 4 or 8
    pub fn resolve(&self) -> Result<CryptoSuite, CryptoError> {
        let cipher = match self.cipher.as_deref() {
            None => None,
            Some(name) if name.eq_ignore_ascii_case("none") => None,
            Some(name) => Some(name),
        };

        if let Some(name) = cipher
            && let Ok(algorithm) = name.parse::<AeadAlgorithm>()
        {
            if self.packet_id_len != 4 && self.packet_id_len != 8 {
                return Err(CryptoError::InvalidPacketIdLength {
                    expected: DEFAULT_PACKET_ID_LEN,
                    actual: self.packet_id_len,
                });
            }
            return Ok(CryptoSuite::Aead { algorithm, packet_id_len: self.packet_id_len });
        }

        let cipher = cipher.map(str::parse::<CipherAlgorithm>).transpose()?;
        let digest = self.digest.parse::<DigestAlgorithm>()?;

        Ok(CryptoSuite::CbcHmac { cipher, digest })
    }
}
