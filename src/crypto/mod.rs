//! Primitive capability traits and their built-in implementations.
//!
//! - [`cipher`]: the [`Aead`](cipher::Aead) contract, ChaChaPoly and AESGCM
//! - [`dh`]: the [`Curve`](dh::Curve)/[`Keypair`](dh::Keypair) contracts and
//!   X25519 with low-order point rejection
//! - [`hash`]: the [`Hash`](hash::Hash) contract, SHA-2 and BLAKE2 families,
//!   HMAC and the Noise HKDF chain
//!
//! The handshake core is polymorphic over these three traits; additional
//! primitives can be supplied through the [`Registry`](crate::Registry)
//! without touching the core.

pub mod cipher;
pub mod dh;
pub mod hash;

pub use cipher::{Aead, AesGcm, ChaChaPoly, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use dh::{Curve, Keypair, X25519};
pub use hash::{Blake2b, Blake2s, Hash, Sha256, Sha512};
