//! Name resolution for protocol components.
//!
//! The registry is a plain value, not process-wide state: tests inject fakes
//! and embedders add primitives by building their own instance. A default
//! instance carries the built-in curve, ciphers, hashes, and pattern catalog.

use std::collections::HashMap;
use std::sync::Arc;

use crate::crypto::cipher::{Aead, AesGcm, ChaChaPoly};
use crate::crypto::dh::{Curve, X25519};
use crate::crypto::hash::{Blake2b, Blake2s, Hash, Sha256, Sha512};
use crate::error::{Component, Error};
use crate::pattern::{HandshakePattern, BUILTIN_PATTERNS};

/// The mandatory first field of every protocol name.
pub const NOISE_PREFIX: &str = "Noise";

/// A lookup table from component names to implementations.
#[derive(Clone)]
pub struct Registry {
    curves: HashMap<String, Arc<dyn Curve>>,
    ciphers: HashMap<String, Arc<dyn Aead>>,
    hashes: HashMap<String, Arc<dyn Hash>>,
    patterns: HashMap<String, String>,
}

/// The four components a protocol name resolves to.
#[derive(Debug)]
pub(crate) struct ResolvedProtocol {
    pub pattern: HandshakePattern,
    pub curve: Arc<dyn Curve>,
    pub cipher: Arc<dyn Aead>,
    pub hash: Arc<dyn Hash>,
}

impl Default for Registry {
    /// A registry with `25519`, `ChaChaPoly`, `AESGCM`, `SHA256`, `SHA512`,
    /// `BLAKE2s`, `BLAKE2b`, and the fundamental pattern catalog.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_curve(Arc::new(X25519));
        registry.register_cipher(Arc::new(ChaChaPoly));
        registry.register_cipher(Arc::new(AesGcm));
        registry.register_hash(Arc::new(Sha256));
        registry.register_hash(Arc::new(Sha512));
        registry.register_hash(Arc::new(Blake2s));
        registry.register_hash(Arc::new(Blake2b));
        for (name, source) in BUILTIN_PATTERNS {
            registry.register_pattern(name, source);
        }
        registry
    }
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            curves: HashMap::new(),
            ciphers: HashMap::new(),
            hashes: HashMap::new(),
            patterns: HashMap::new(),
        }
    }

    /// Register a DH curve under its own name, replacing any previous entry.
    pub fn register_curve(&mut self, curve: Arc<dyn Curve>) {
        self.curves.insert(curve.name().to_string(), curve);
    }

    /// Register an AEAD cipher under its own name.
    pub fn register_cipher(&mut self, cipher: Arc<dyn Aead>) {
        self.ciphers.insert(cipher.name().to_string(), cipher);
    }

    /// Register a hash function under its own name.
    pub fn register_hash(&mut self, hash: Arc<dyn Hash>) {
        self.hashes.insert(hash.name().to_string(), hash);
    }

    /// Register a pattern's source text under a base name (no modifiers).
    ///
    /// The text is compiled and validated on lookup, so a malformed pattern
    /// surfaces as [`Error::InvalidPattern`] from [`pattern`](Self::pattern).
    pub fn register_pattern(&mut self, name: &str, source: &str) {
        self.patterns.insert(name.to_string(), source.to_string());
    }

    /// Resolve a DH curve by name.
    pub fn curve(&self, name: &str) -> Result<Arc<dyn Curve>, Error> {
        self.curves
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidComponent {
                kind: Component::Dh,
                name: name.to_string(),
            })
    }

    /// Resolve an AEAD cipher by name.
    pub fn cipher(&self, name: &str) -> Result<Arc<dyn Aead>, Error> {
        self.ciphers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidComponent {
                kind: Component::Cipher,
                name: name.to_string(),
            })
    }

    /// Resolve a hash function by name.
    pub fn hash(&self, name: &str) -> Result<Arc<dyn Hash>, Error> {
        self.hashes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidComponent {
                kind: Component::Hash,
                name: name.to_string(),
            })
    }

    /// Compile a pattern by full name, applying any `pskN` modifiers.
    ///
    /// `XXpsk3` looks up the `XX` source, compiles it, appends a psk token
    /// to message 3, and re-validates.
    pub fn pattern(&self, name: &str) -> Result<HandshakePattern, Error> {
        let unknown = || Error::InvalidComponent {
            kind: Component::Pattern,
            name: name.to_string(),
        };

        let (base, modifiers) = split_pattern_name(name);
        if base.is_empty() {
            return Err(unknown());
        }
        let source = self.patterns.get(base).ok_or_else(unknown)?;
        let mut pattern = HandshakePattern::parse(base, source)?;

        if let Some(modifiers) = modifiers {
            for modifier in modifiers.split('+') {
                let n = modifier
                    .strip_prefix("psk")
                    .and_then(|digits| digits.parse::<usize>().ok())
                    .ok_or_else(unknown)?;
                if n > pattern.messages().len() {
                    return Err(unknown());
                }
                pattern.apply_psk_modifier(n);
            }
            pattern.validate()?;
            pattern.set_name(name);
        }
        Ok(pattern)
    }

    /// Parse `Noise_<pattern>_<dh>_<cipher>_<hash>` and resolve every field.
    pub(crate) fn parse_protocol_name(&self, name: &str) -> Result<ResolvedProtocol, Error> {
        let fields: Vec<&str> = name.split('_').collect();
        if fields.len() != 5 || fields[0] != NOISE_PREFIX {
            return Err(Error::InvalidProtocolName(name.to_string()));
        }
        Ok(ResolvedProtocol {
            pattern: self.pattern(fields[1])?,
            curve: self.curve(fields[2])?,
            cipher: self.cipher(fields[3])?,
            hash: self.hash(fields[4])?,
        })
    }
}

/// Split a pattern name into its base and optional modifier suffix:
/// `"XXpsk3"` becomes `("XX", Some("psk3"))`.
fn split_pattern_name(name: &str) -> (&str, Option<&str>) {
    match name.find(|c: char| c.is_ascii_lowercase()) {
        Some(i) => (&name[..i], Some(&name[i..])),
        None => (name, None),
    }
}
