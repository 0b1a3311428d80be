//! Stateless wrappers around the named primitives.
//!
//! Each engine binds an algorithm to its key and exposes sizes the packet
//! layouts depend on (block length, tag length). Neither engine keeps state
//! between calls.

pub mod cipher;
pub mod digest;

pub use cipher::{CipherAlgorithm, CipherEngine};
pub use digest::{DigestAlgorithm, DigestEngine};
