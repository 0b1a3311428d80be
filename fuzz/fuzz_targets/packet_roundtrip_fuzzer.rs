//! Fuzz target for the seal/open round trip
//!
//! Two peers with mirrored keys exchange arbitrary payloads through
//! `DataChannel`, with arbitrary corruption applied in transit.
//!
//! # Strategy
//!
//! - Arbitrary payloads, plus associated data on AEAD channels
//! - Random bit flips, truncation and duplication of sealed packets
//! - Rekey in the middle of the exchange
//!
//! # Invariants
//!
//! - Untouched packets open to the sent payload
//! - Corrupted packets fail authentication
//! - Duplicated packets are rejected as replays
//! - Never panics

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tunnelframe_crypto::{
    CryptoConfig, CryptoError, DataChannel, PacketCrypto, SecureKey, SystemRandom,
};

const CIPHERS: [&str; 6] =
    ["none", "aes-128-cbc", "aes-256-cbc", "aes-128-gcm", "aes-256-gcm", "chacha20-poly1305"];

#[derive(Debug, Clone, Arbitrary)]
enum Transit {
    Deliver,
    FlipBit { bit: u16 },
    Truncate { len: u16 },
    Duplicate,
    Rekey { seed: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
struct Message {
    payload: Vec<u8>,
    ad: Vec<u8>,
    transit: Transit,
}

#[derive(Debug, Clone, Arbitrary)]
struct RoundtripScenario {
    cipher: u8,
    seed: u8,
    messages: Vec<Message>,
}

fn crypto(cipher: &str, send: u8, receive: u8) -> Option<PacketCrypto> {
    let config = CryptoConfig { cipher: Some(cipher.to_string()), ..CryptoConfig::default() };
    let mut crypto = PacketCrypto::from_config(&config, Arc::new(SystemRandom::new())).ok()?;
    crypto
        .configure_encryption(Some(SecureKey::new(vec![send; 64])), SecureKey::new(vec![send; 64]))
        .ok()?;
    crypto
        .configure_decryption(
            Some(SecureKey::new(vec![receive; 64])),
            SecureKey::new(vec![receive; 64]),
        )
        .ok()?;
    Some(crypto)
}

fn peers(cipher: &str, seed: u8) -> Option<(DataChannel, DataChannel)> {
    let (c2s, s2c) = (seed, seed.wrapping_add(1));
    let client = DataChannel::new(crypto(cipher, c2s, s2c)?).ok()?;
    let server = DataChannel::new(crypto(cipher, s2c, c2s)?).ok()?;
    Some((client, server))
}

fuzz_target!(|scenario: RoundtripScenario| {
    let cipher = CIPHERS[usize::from(scenario.cipher) % CIPHERS.len()];
    let Some((mut client, mut server)) = peers(cipher, scenario.seed) else {
        return;
    };

    let authenticates_ad = matches!(&*client.keys().current(), PacketCrypto::Aead(_));

    for message in scenario.messages.iter().take(64) {
        let ad: &[u8] = if authenticates_ad { &message.ad } else { &[] };
        let Ok(packet) = client.seal(&message.payload, ad) else {
            return;
        };

        match message.transit {
            Transit::Deliver => {
                let opened = server.open(&packet, ad);
                assert_eq!(opened.as_deref(), Ok(message.payload.as_slice()));
            },
            Transit::FlipBit { bit } => {
                let mut corrupted = packet.clone();
                let bit = usize::from(bit) % (corrupted.len() * 8);
                corrupted[bit / 8] ^= 1 << (bit % 8);
                let opened = server.open(&corrupted, ad);
                assert_eq!(opened, Err(CryptoError::AuthenticationFailed));
            },
            Transit::Truncate { len } => {
                let len = usize::from(len) % packet.len();
                let opened = server.open(&packet[..len], ad);
                assert_eq!(opened, Err(CryptoError::AuthenticationFailed));
            },
            Transit::Duplicate => {
                assert!(server.open(&packet, ad).is_ok());
                let replayed = server.open(&packet, ad);
                assert!(matches!(replayed, Err(CryptoError::Replay { .. })));
            },
            Transit::Rekey { seed } => {
                let (c2s, s2c) = (seed, seed.wrapping_add(1));
                let (Some(client_keys), Some(server_keys)) =
                    (crypto(cipher, c2s, s2c), crypto(cipher, s2c, c2s))
                else {
                    return;
                };
                assert!(client.rekey(client_keys).is_ok());
                assert!(server.rekey(server_keys).is_ok());
            },
        }
    }
});
