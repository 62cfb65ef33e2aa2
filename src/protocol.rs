//! Handshake construction from a protocol name and configuration.

use zeroize::Zeroizing;

use crate::error::Error;
use crate::handshake_state::{HandshakeParts, HandshakeState, PSK_LEN};
use crate::registry::Registry;
use crate::rekey::Rekeyer;

/// Configures and builds a [`HandshakeState`].
///
/// ```no_run
/// use enoki::Builder;
///
/// # fn main() -> Result<(), enoki::Error> {
/// let static_key = [0x40u8; 32];
/// let mut initiator = Builder::new("Noise_XX_25519_ChaChaPoly_SHA256")
///     .local_private_key(&static_key)
///     .build_initiator()?;
/// # Ok(())
/// # }
/// ```
///
/// Keys are validated against the resolved curve at build time, so setters
/// never fail. By default nothing is generated implicitly: a pattern that
/// needs a key which was not supplied fails with [`Error::MissingKey`]
/// unless [`auto_padding`](Self::auto_padding) is enabled.
pub struct Builder {
    name: String,
    registry: Registry,
    prologue: Vec<u8>,
    local_static: Option<Zeroizing<Vec<u8>>>,
    local_ephemeral: Option<Zeroizing<Vec<u8>>>,
    remote_static: Option<Vec<u8>>,
    remote_ephemeral: Option<Vec<u8>>,
    psks: Vec<Zeroizing<Vec<u8>>>,
    auto_padding: bool,
    rekeyer: Option<Rekeyer>,
}

impl Builder {
    /// Start from a protocol name like `Noise_XX_25519_ChaChaPoly_SHA256`,
    /// resolved against the default registry.
    pub fn new(name: &str) -> Self {
        Self::with_registry(name, Registry::default())
    }

    /// Start from a protocol name resolved against a caller-built registry.
    pub fn with_registry(name: &str, registry: Registry) -> Self {
        Self {
            name: name.to_string(),
            registry,
            prologue: Vec::new(),
            local_static: None,
            local_ephemeral: None,
            remote_static: None,
            remote_ephemeral: None,
            psks: Vec::new(),
            auto_padding: false,
            rekeyer: None,
        }
    }

    /// Prologue data mixed into the transcript. Both parties must supply
    /// identical bytes or the first decryption fails.
    pub fn prologue(mut self, prologue: &[u8]) -> Self {
        self.prologue = prologue.to_vec();
        self
    }

    /// The local static private key (`s`).
    pub fn local_private_key(mut self, key: &[u8]) -> Self {
        self.local_static = Some(Zeroizing::new(key.to_vec()));
        self
    }

    /// A fixed local ephemeral private key (`e`).
    ///
    /// Ephemerals are generated on demand; pin one only for deterministic
    /// test vectors.
    pub fn local_ephemeral_key(mut self, key: &[u8]) -> Self {
        self.local_ephemeral = Some(Zeroizing::new(key.to_vec()));
        self
    }

    /// The remote party's static public key (`rs`), for patterns that
    /// require it pre-handshake.
    pub fn remote_public_key(mut self, key: &[u8]) -> Self {
        self.remote_static = Some(key.to_vec());
        self
    }

    /// The remote party's ephemeral public key (`re`). Rarely needed.
    pub fn remote_ephemeral_key(mut self, key: &[u8]) -> Self {
        self.remote_ephemeral = Some(key.to_vec());
        self
    }

    /// Append a 32-byte pre-shared key. Call once per `psk` token, in
    /// pattern order.
    pub fn psk(mut self, psk: &[u8]) -> Self {
        self.psks.push(Zeroizing::new(psk.to_vec()));
        self
    }

    /// Generate missing required local keys instead of failing.
    pub fn auto_padding(mut self, enabled: bool) -> Self {
        self.auto_padding = enabled;
        self
    }

    /// Install an automatic rekey policy on the transport ciphers.
    pub fn rekeyer(mut self, rekeyer: Rekeyer) -> Self {
        self.rekeyer = Some(rekeyer);
        self
    }

    /// Build the handshake state for the initiating side.
    pub fn build_initiator(self) -> Result<HandshakeState, Error> {
        self.build(true)
    }

    /// Build the handshake state for the responding side.
    pub fn build_responder(self) -> Result<HandshakeState, Error> {
        self.build(false)
    }

    fn build(self, initiator: bool) -> Result<HandshakeState, Error> {
        let resolved = self.registry.parse_protocol_name(&self.name)?;
        let curve = resolved.curve;

        let s = match &self.local_static {
            Some(key) => Some(curve.load_private(key)?),
            None => None,
        };
        let e = match &self.local_ephemeral {
            Some(key) => Some(curve.load_private(key)?),
            None => None,
        };
        let rs = match &self.remote_static {
            Some(key) => Some(curve.load_public(key)?),
            None => None,
        };
        let re = match &self.remote_ephemeral {
            Some(key) => Some(curve.load_public(key)?),
            None => None,
        };

        let mut psks = Vec::with_capacity(self.psks.len());
        for psk in &self.psks {
            if psk.len() != PSK_LEN {
                return Err(Error::InvalidKeyLength {
                    expected: PSK_LEN,
                    actual: psk.len(),
                });
            }
            let mut fixed = Zeroizing::new([0u8; PSK_LEN]);
            fixed.copy_from_slice(psk);
            psks.push(fixed);
        }

        HandshakeState::new(HandshakeParts {
            name: self.name,
            pattern: resolved.pattern,
            initiator,
            prologue: self.prologue,
            curve,
            aead: resolved.cipher,
            hash: resolved.hash,
            s,
            e,
            rs,
            re,
            psks,
            auto_padding: self.auto_padding,
            rekeyer: self.rekeyer,
        })
    }
}
