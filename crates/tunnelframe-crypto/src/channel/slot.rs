//! Current-keys slot with swap-on-rekey semantics.

use std::sync::{Arc, PoisonError, RwLock};

use crate::packet::PacketCrypto;

/// Holds the packet crypto context currently in use.
///
/// Readers take an [`Arc`] snapshot, so work started before a rekey finishes
/// on the old keys while new work sees the new ones. Contexts are never
/// mutated once installed. Old key material is wiped when the last snapshot
/// drops.
#[derive(Debug)]
pub struct KeySlot {
    current: RwLock<Arc<PacketCrypto>>,
}

impl KeySlot {
    /// Slot holding `crypto`.
    pub fn new(crypto: PacketCrypto) -> Self {
        Self { current: RwLock::new(Arc::new(crypto)) }
    }

    /// Snapshot of the current context.
    pub fn current(&self) -> Arc<PacketCrypto> {
        // The slot only ever holds a complete Arc, so a poisoned lock is
        // still consistent.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Install `crypto` and return the context it replaced.
    pub fn replace(&self, crypto: PacketCrypto) -> Arc<PacketCrypto> {
        let next = Arc::new(crypto);
        let strategy = next.name();

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        drop(guard);

        let in_flight = Arc::strong_count(&previous) - 1;
        tracing::info!(strategy, in_flight, "packet keys replaced");
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CryptoConfig, env::SystemRandom};

    fn crypto(cipher: Option<&str>) -> PacketCrypto {
        let config = CryptoConfig { cipher: cipher.map(str::to_string), ..CryptoConfig::default() };
        PacketCrypto::from_config(&config, Arc::new(SystemRandom::new())).unwrap()
    }

    #[test]
    fn snapshot_survives_replace() {
        let slot = KeySlot::new(crypto(Some("aes-256-gcm")));
        let before = slot.current();

        let previous = slot.replace(crypto(None));

        assert_eq!(before.name(), "aead");
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(slot.current().name(), "cbc-hmac");
    }

    #[test]
    fn current_is_shared_not_copied() {
        let slot = KeySlot::new(crypto(None));

        assert!(Arc::ptr_eq(&slot.current(), &slot.current()));
    }
}
