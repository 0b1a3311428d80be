//! Error types for data-channel packet crypto.

use thiserror::Error;

use crate::packet::Direction;

/// Errors from packet crypto operations.
///
/// Per-packet failures (`AuthenticationFailed`, `DecryptionFailed`,
/// `Replay`) mean the caller drops that packet. Everything else points at a
/// misconfigured or exhausted context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Operation invoked before the direction's keys were installed
    #[error("{direction} keys are not configured")]
    NotConfigured {
        /// Direction that was used unconfigured
        direction: Direction,
    },

    /// Tag mismatch: forged, corrupted or out-of-sync packet
    #[error("packet authentication failed")]
    AuthenticationFailed,

    /// Structurally invalid plaintext after a successful tag check
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// What was wrong with the authenticated packet
        reason: &'static str,
    },

    /// Underlying cipher, digest or entropy failure while sealing a packet
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Reason reported by the primitive
        reason: String,
    },

    /// Key material shorter than the algorithm requires
    #[error("invalid key length: expected at least {expected}, got {actual}")]
    InvalidKeyLength {
        /// Minimum key length for the algorithm
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// A cipher algorithm is configured but no cipher key was supplied
    #[error("cipher key required by the configured algorithm")]
    MissingCipherKey,

    /// Algorithm name not recognized
    #[error("unsupported algorithm: {name}")]
    UnsupportedAlgorithm {
        /// Name as given by the caller
        name: String,
    },

    /// Packet id bytes have the wrong width for this context
    #[error("invalid packet id length: expected {expected}, got {actual}")]
    InvalidPacketIdLength {
        /// Width the context was built with
        expected: usize,
        /// Width that was supplied
        actual: usize,
    },

    /// Associated data passed to a strategy whose tag cannot cover it
    #[error("{strategy} packets cannot authenticate associated data")]
    AssociatedDataUnsupported {
        /// Strategy name of the current context
        strategy: &'static str,
    },

    /// Outbound packet id space is used up; the session must rekey
    #[error("packet id space exhausted")]
    PacketIdExhausted,

    /// Packet id already seen or older than the replay window
    #[error("replayed packet id {packet_id}")]
    Replay {
        /// Offending packet id
        packet_id: u64,
    },
}

impl CryptoError {
    /// Returns true if this error is fatal to the calling flow.
    ///
    /// Non-fatal errors reject a single inbound packet; the session keeps
    /// running. Repeated authentication failures should still be treated as
    /// a possible attack by the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed | Self::DecryptionFailed { .. } | Self::Replay { .. } => {
                false
            },

            Self::NotConfigured { .. }
            | Self::EncryptionFailed { .. }
            | Self::InvalidKeyLength { .. }
            | Self::MissingCipherKey
            | Self::UnsupportedAlgorithm { .. }
            | Self::InvalidPacketIdLength { .. }
            | Self::AssociatedDataUnsupported { .. }
            | Self::PacketIdExhausted => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_drops_are_not_fatal() {
        assert!(!CryptoError::AuthenticationFailed.is_fatal());
        assert!(!CryptoError::DecryptionFailed { reason: "bad padding" }.is_fatal());
        assert!(!CryptoError::Replay { packet_id: 7 }.is_fatal());
    }

    #[test]
    fn misconfiguration_is_fatal() {
        assert!(CryptoError::NotConfigured { direction: Direction::Encrypt }.is_fatal());
        assert!(CryptoError::MissingCipherKey.is_fatal());
        assert!(CryptoError::PacketIdExhausted.is_fatal());
        assert!(CryptoError::InvalidKeyLength { expected: 32, actual: 16 }.is_fatal());
        assert!(CryptoError::AssociatedDataUnsupported { strategy: "cbc-hmac" }.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::NotConfigured { direction: Direction::Decrypt };
        assert_eq!(err.to_string(), "decrypt keys are not configured");

        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 16 };
        assert_eq!(err.to_string(), "invalid key length: expected at least 32, got 16");
    }
}
