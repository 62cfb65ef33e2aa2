//! Automatic rekey policy for cipher states.

/// Controls when a [`CipherState`](crate::CipherState) replaces its key.
///
/// After every successful encryption or decryption the state rekeys once the
/// message count reaches a multiple of `interval`, using the cipher's rekey
/// function. With `reset_nonce` set the nonce counter restarts from zero
/// after each rekey; both directions of a connection must agree on the
/// policy or decryption will fail at the first rekey boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rekeyer {
    interval: u64,
    reset_nonce: bool,
}

impl Rekeyer {
    /// The interval used by [`Rekeyer::default`].
    pub const DEFAULT_INTERVAL: u64 = 10_000;

    /// A policy rekeying every `interval` messages. An interval of zero
    /// never triggers.
    pub fn new(interval: u64, reset_nonce: bool) -> Self {
        Self {
            interval,
            reset_nonce,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn reset_nonce(&self) -> bool {
        self.reset_nonce
    }

    /// Whether a state whose nonce just advanced to `nonce` should rekey.
    pub(crate) fn should_rekey(&self, nonce: u64) -> bool {
        self.interval != 0 && nonce % self.interval == 0
    }
}

impl Default for Rekeyer {
    /// Rekey every 10000 messages and reset the nonce counter.
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, true)
    }
}
