//! Owned key material that is wiped when it goes away.

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Sensitive key bytes (cipher keys, HMAC keys, implicit nonce tails).
///
/// The buffer is overwritten with zeros on drop and on [`wipe`](Self::wipe).
/// There is no `Clone`: copying key material takes an explicit call to
/// [`duplicate`](Self::duplicate).
pub struct SecureKey {
    bytes: Vec<u8>,
}

impl SecureKey {
    /// Take ownership of `bytes` as key material.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Copy key material out of a borrowed slice.
    ///
    /// The caller remains responsible for wiping its own copy.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self { bytes: bytes.to_vec() }
    }

    /// An all-zero key of `len` bytes. Only meaningful for tests and vectors.
    pub fn zeroed(len: usize) -> Self {
        Self { bytes: vec![0u8; len] }
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the key holds no bytes (also the state after [`wipe`](Self::wipe)).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Explicitly copy the key material into a second buffer.
    pub fn duplicate(&self) -> Self {
        Self::from_slice(&self.bytes)
    }

    /// Keep only the first `len` bytes, wiping the rest.
    ///
    /// Negotiated key material is usually longer than an algorithm needs
    /// (e.g. 64 bytes per slot); algorithms use its leading bytes.
    pub fn truncate(mut self, len: usize) -> Result<Self, CryptoError> {
        if self.bytes.len() < len {
            return Err(CryptoError::InvalidKeyLength { expected: len, actual: self.bytes.len() });
        }

        self.bytes[len..].zeroize();
        self.bytes.truncate(len);
        Ok(self)
    }

    /// Zero the key material now. The key is empty afterwards.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for SecureKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl From<Vec<u8>> for SecureKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_leading_bytes() {
        let key = SecureKey::new((0u8..32).collect());
        let short = key.truncate(16).unwrap();

        assert_eq!(short.len(), 16);
        assert_eq!(short.as_bytes(), &(0u8..16).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn truncate_rejects_short_material() {
        let key = SecureKey::zeroed(16);
        let result = key.truncate(32);

        assert_eq!(result.unwrap_err(), CryptoError::InvalidKeyLength { expected: 32, actual: 16 });
    }

    #[test]
    fn wipe_empties_key() {
        let mut key = SecureKey::from_slice(&[0xAB; 32]);
        key.wipe();

        assert!(key.is_empty());
    }

    #[test]
    fn duplicate_is_independent() {
        let key = SecureKey::from_slice(&[0x42; 32]);
        let mut copy = key.duplicate();
        copy.wipe();

        assert_eq!(key.as_bytes(), &[0x42; 32]);
        assert!(copy.is_empty());
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecureKey::from_slice(&[0x42; 4]);
        let rendered = format!("{key:?}");

        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("42"));
    }
}
