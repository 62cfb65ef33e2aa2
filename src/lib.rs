#![deny(unsafe_code)]

//! # enoki
//!
//! A pure, sans-IO implementation of the Noise Protocol Framework: the
//! handshake state machine, driven by compiled handshake patterns, over
//! pluggable DH/AEAD/hash primitives.
//!
//! Protocols are named the standard way (`Noise_XX_25519_ChaChaPoly_SHA256`)
//! and resolved through a [`Registry`] value — there is no process-wide
//! mutable state. Built in: X25519, ChaChaPoly and AESGCM, the SHA-2 and
//! BLAKE2 families, and the fundamental one-way and interactive patterns
//! with `pskN` modifiers.
//!
//! ## Security Properties
//!
//! - X25519 low-order point / identity element rejection
//! - All key material zeroized on drop, including mid-handshake aborts
//! - No recursive parsing, no panics on network input
//! - Strict turn enforcement and one-way handshake state on any error
//!
//! ## Example
//!
//! ```
//! use enoki::Builder;
//!
//! # fn main() -> Result<(), enoki::Error> {
//! let mut initiator = Builder::new("Noise_NN_25519_ChaChaPoly_SHA256").build_initiator()?;
//! let mut responder = Builder::new("Noise_NN_25519_ChaChaPoly_SHA256").build_responder()?;
//!
//! let (mut message, mut payload) = ([0u8; 1024], [0u8; 1024]);
//! let len = initiator.write_message(b"", &mut message)?;
//! responder.read_message(&message[..len], &mut payload)?;
//! let len = responder.write_message(b"", &mut message)?;
//! initiator.read_message(&message[..len], &mut payload)?;
//!
//! let mut alice = initiator.into_transport()?;
//! let mut bob = responder.into_transport()?;
//! let len = alice.write_message(b"hello", &mut message)?;
//! let len = bob.read_message(&message[..len], &mut payload)?;
//! assert_eq!(&payload[..len], b"hello");
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod pattern;

mod cipher_state;
mod handshake_state;
mod protocol;
mod registry;
mod rekey;
mod symmetric_state;
mod transport;

pub use cipher_state::CipherState;
pub use error::Error;
pub use handshake_state::{HandshakeAction, HandshakeState, PSK_LEN};
pub use pattern::HandshakePattern;
pub use protocol::Builder;
pub use registry::{Registry, NOISE_PREFIX};
pub use rekey::Rekeyer;
pub use transport::TransportState;
