//! Fuzz target for the receive path
//!
//! Feeds attacker-controlled wire bytes into `verify`, `decrypt` and
//! `DataChannel::open` for every strategy.
//!
//! # Strategy
//!
//! - Arbitrary packet bytes (empty, shorter than the header, oversized)
//! - Arbitrary associated data and expected packet ids
//! - Every cipher/digest combination, including authentication-only
//!
//! # Invariants
//!
//! - Never panics
//! - Forged packets fail with a per-packet (non-fatal) error
//! - `verify` and `decrypt` agree on authenticity
//! - A rejected packet never moves the replay window

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tunnelframe_crypto::{
    CryptoConfig, CryptoError, DataChannel, PacketCrypto, PacketFlags, SecureKey, SystemRandom,
};

#[derive(Debug, Clone, Arbitrary)]
enum Suite {
    AuthOnly,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Suite {
    fn cipher(&self) -> &'static str {
        match self {
            Suite::AuthOnly => "none",
            Suite::Aes128Cbc => "aes-128-cbc",
            Suite::Aes256Cbc => "aes-256-cbc",
            Suite::Aes128Gcm => "aes-128-gcm",
            Suite::Aes256Gcm => "aes-256-gcm",
            Suite::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct OpenScenario {
    suite: Suite,
    /// Key material for both slots
    keys: [u8; 64],
    /// Raw wire bytes
    packet: Vec<u8>,
    /// Associated data
    ad: Vec<u8>,
    /// Expected packet id passed in the flags (may be empty)
    expected_packet_id: Vec<u8>,
}

fn build(scenario: &OpenScenario) -> Option<PacketCrypto> {
    let cipher = Some(scenario.suite.cipher().to_string());
    let config = CryptoConfig { cipher, ..CryptoConfig::default() };
    let mut crypto = PacketCrypto::from_config(&config, Arc::new(SystemRandom::new())).ok()?;
    crypto
        .configure_decryption(
            Some(SecureKey::from_slice(&scenario.keys)),
            SecureKey::from_slice(&scenario.keys),
        )
        .ok()?;
    crypto
        .configure_encryption(
            Some(SecureKey::from_slice(&scenario.keys)),
            SecureKey::from_slice(&scenario.keys),
        )
        .ok()?;
    Some(crypto)
}

fn assert_per_packet(result: &Result<Vec<u8>, CryptoError>) {
    if let Err(err) = result {
        assert!(!err.is_fatal(), "receive path returned fatal error: {err}");
    }
}

fuzz_target!(|scenario: OpenScenario| {
    let Some(crypto) = build(&scenario) else {
        return;
    };

    let flags = PacketFlags::new(&scenario.expected_packet_id, &scenario.ad);

    let verified = crypto.verify(&scenario.packet, &flags);
    let decrypted = crypto.decrypt(&scenario.packet, &flags);

    assert_per_packet(&decrypted);
    if let Err(err) = &verified {
        assert_eq!(err, &CryptoError::AuthenticationFailed);
        assert_eq!(decrypted, Err(CryptoError::AuthenticationFailed));
    } else {
        assert_ne!(decrypted, Err(CryptoError::AuthenticationFailed));
    }

    let Some(crypto) = build(&scenario) else {
        return;
    };
    // CBC-HMAC channels only take empty associated data
    let ad: &[u8] = match crypto {
        PacketCrypto::CbcHmac(_) => &[],
        PacketCrypto::Aead(_) => &scenario.ad,
    };
    let Ok(mut channel) = DataChannel::new(crypto) else {
        return;
    };

    let opened = channel.open(&scenario.packet, ad);
    assert_per_packet(&opened);
    if opened.is_err() {
        assert_eq!(channel.highest_received(), 0);
    }
});
