//! Tunnelframe Data-Channel Crypto
//!
//! Turns plaintext data-channel payloads into authenticated (and optionally
//! encrypted) wire packets, and back. Sans-IO and synchronous: callers hand
//! in negotiated keys and buffers, and get buffers back.
//!
//! # Strategies
//!
//! ```text
//! CBC-HMAC:  [ HMAC tag | IV | AES-CBC(PKCS#7(payload)) ]
//!            [ HMAC tag | payload ]                         (no cipher)
//!
//! AEAD:      [ packet id | AES-GCM / ChaCha20-Poly1305 ciphertext | tag ]
//! ```
//!
//! Both are variants of [`PacketCrypto`], chosen once from a
//! [`CryptoConfig`] and never re-selected per packet.
//!
//! # Key Lifecycle
//!
//! ```text
//! Negotiated key material (per direction)
//!        │
//!        ▼
//! SecureKey ──► configure_encryption / configure_decryption
//!        │
//!        ▼
//! KeySlot (Arc snapshot) ──► encrypt / decrypt / verify
//!        │
//!        ▼
//! rekey: swap the slot, old keys wiped when the last snapshot drops
//! ```
//!
//! # Security
//!
//! Authenticity:
//! - CBC-HMAC is MAC-then-decrypt: the tag is checked before the cipher runs
//! - Tags are compared in constant time
//! - Any tampered bit fails with `AuthenticationFailed`
//!
//! Directional keys:
//! - Encrypt and decrypt keys are installed separately
//! - A packet reflected back at its sender does not authenticate
//!
//! Nonces and IVs:
//! - CBC IVs come from an injected [`RandomSource`]
//! - AEAD nonces are `packet id ‖ implicit IV`; a context refuses to reuse
//!   a packet id under the same key
//!
//! Replay:
//! - [`DataChannel`] binds packet ids into every packet and rejects
//!   duplicates through a sliding [`ReplayWindow`]
//!
//! Key material:
//! - [`SecureKey`] zeroizes on drop and never logs its bytes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod key;
pub mod packet;

pub use channel::{DataChannel, KeySlot, PacketIdCounter, ReplayWindow};
pub use config::{CryptoConfig, CryptoSuite};
pub use engine::{CipherAlgorithm, CipherEngine, DigestAlgorithm, DigestEngine};
pub use env::{EntropyError, RandomSource, SystemRandom};
pub use error::CryptoError;
pub use key::SecureKey;
pub use packet::{
    AeadAlgorithm, AeadCrypto, CbcHmacCrypto, Direction, PacketCrypto, PacketFlags,
};
