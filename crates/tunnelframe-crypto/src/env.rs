//! Randomness injection for IV generation.
//!
//! The CBC-HMAC strategy needs unpredictable IVs. Instead of reaching for a
//! process-wide RNG, every context is handed a [`RandomSource`] at
//! construction time. Production code uses [`SystemRandom`]; tests plug in
//! fixed or seeded sources.

use thiserror::Error;

/// The entropy source could not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

/// Source of IV randomness.
///
/// # Invariants
///
/// - Production implementations MUST be cryptographically secure
/// - Implementations are shared across threads, so they must be `Send + Sync`
pub trait RandomSource: Send + Sync {
    /// Fill `buffer` completely with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;
}

/// OS cryptographic RNG (getrandom).
///
/// Not reproducible. Failures are reported instead of panicking so the
/// packet being sealed fails with `EncryptionFailed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl SystemRandom {
    /// Create a new system random source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for SystemRandom {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| EntropyError(e.to_string()))
    }
}
