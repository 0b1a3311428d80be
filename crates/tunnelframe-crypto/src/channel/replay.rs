//! Inbound replay protection.

use crate::error::CryptoError;

/// Number of packet ids tracked behind the highest one seen.
pub const REPLAY_WINDOW_SIZE: u64 = 64;

/// Sliding bitmap over the most recent [`REPLAY_WINDOW_SIZE`] packet ids.
///
/// Bit `n` of the bitmap records whether `highest - n` was accepted. Ids
/// ahead of the window slide it forward; ids behind it are rejected.
///
/// # Invariants
///
/// - Id 0 is never valid (outbound ids start at 1)
/// - [`accept`](Self::accept) is only called for authenticated packets, so
///   forged packets cannot advance the window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayWindow {
    highest: u64,
    bitmap: u64,
}

impl ReplayWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest packet id accepted so far (0 if none).
    pub fn highest(&self) -> u64 {
        self.highest
    }

    /// Check `packet_id` without recording it.
    ///
    /// # Errors
    ///
    /// - `Replay`: id is 0, already seen, or older than the window
    pub fn check(&self, packet_id: u64) -> Result<(), CryptoError> {
        if packet_id == 0 {
            return Err(CryptoError::Replay { packet_id });
        }

        if packet_id > self.highest {
            return Ok(());
        }

        let age = self.highest - packet_id;
        if age >= REPLAY_WINDOW_SIZE || self.bitmap & (1u64 << age) != 0 {
            return Err(CryptoError::Replay { packet_id });
        }

        Ok(())
    }

    /// Record an authenticated `packet_id` that passed [`check`](Self::check).
    pub fn accept(&mut self, packet_id: u64) {
        if packet_id > self.highest {
            let shift = packet_id - self.highest;
            self.bitmap = if shift >= REPLAY_WINDOW_SIZE { 0 } else { self.bitmap << shift };
            self.bitmap |= 1;
            self.highest = packet_id;
        } else {
            let age = self.highest - packet_id;
            if age < REPLAY_WINDOW_SIZE {
                self.bitmap |= 1u64 << age;
            }
        }
    }

    /// Forget everything. Only valid together with fresh keys.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(window: &mut ReplayWindow, packet_id: u64) -> Result<(), CryptoError> {
        window.check(packet_id)?;
        window.accept(packet_id);
        Ok(())
    }

    #[test]
    fn in_order_ids_are_accepted() {
        let mut window = ReplayWindow::new();

        for id in 1..=200 {
            assert!(accept(&mut window, id).is_ok(), "id {id}");
        }
        assert_eq!(window.highest(), 200);
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut window = ReplayWindow::new();
        accept(&mut window, 5).unwrap();

        assert_eq!(accept(&mut window, 5), Err(CryptoError::Replay { packet_id: 5 }));
    }

    #[test]
    fn zero_is_rejected() {
        let window = ReplayWindow::new();

        assert_eq!(window.check(0), Err(CryptoError::Replay { packet_id: 0 }));
    }

    #[test]
    fn reordered_within_window_is_accepted_once() {
        let mut window = ReplayWindow::new();
        accept(&mut window, 10).unwrap();

        assert!(accept(&mut window, 7).is_ok());
        assert_eq!(accept(&mut window, 7), Err(CryptoError::Replay { packet_id: 7 }));
        assert!(accept(&mut window, 9).is_ok());
    }

    #[test]
    fn ids_behind_window_are_rejected() {
        let mut window = ReplayWindow::new();
        accept(&mut window, 100).unwrap();

        // 100 - 37 = 63 is the oldest tracked slot
        assert!(window.check(37).is_ok());
        assert_eq!(window.check(36), Err(CryptoError::Replay { packet_id: 36 }));
    }

    #[test]
    fn large_jump_clears_bitmap() {
        let mut window = ReplayWindow::new();
        accept(&mut window, 1).unwrap();
        accept(&mut window, 1_000).unwrap();

        assert!(window.check(999).is_ok());
        assert_eq!(window.check(1), Err(CryptoError::Replay { packet_id: 1 }));
    }

    #[test]
    fn check_does_not_record() {
        let mut window = ReplayWindow::new();
        window.check(3).unwrap();
        window.check(3).unwrap();

        assert_eq!(window.highest(), 0);
        assert!(accept(&mut window, 3).is_ok());
    }

    #[test]
    fn reset_forgets_history() {
        let mut window = ReplayWindow::new();
        accept(&mut window, 42).unwrap();
        window.reset();

        assert!(accept(&mut window, 42).is_ok());
    }
}
