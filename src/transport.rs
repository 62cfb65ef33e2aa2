use zeroize::Zeroizing;

use crate::cipher_state::CipherState;
use crate::crypto::cipher::TAG_LEN;
use crate::error::Error;

/// Post-handshake transport encryption state.
///
/// Wraps the two cipher states produced by `Split`, one per direction:
/// the initiator sends on `c1` and receives on `c2`, the responder the
/// reverse. The two directions share no mutable state, so a caller may
/// take the state apart and drive each half from its own thread.
///
/// Messages must be decrypted in the exact order they were encrypted;
/// nonces are implicit and there is no resynchronization.
pub struct TransportState {
    send: CipherState,
    recv: CipherState,
    handshake_hash: Zeroizing<Vec<u8>>,
}

impl TransportState {
    pub(crate) fn new(
        handshake_hash: Zeroizing<Vec<u8>>,
        c1: CipherState,
        c2: CipherState,
        is_initiator: bool,
    ) -> Self {
        let (send, recv) = if is_initiator { (c1, c2) } else { (c2, c1) };
        Self {
            send,
            recv,
            handshake_hash,
        }
    }

    /// Encrypt a payload for the peer. Returns the bytes written to `out`
    /// (payload plus AEAD tag).
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.send.encrypt_with_ad(&[], payload, out)
    }

    /// Decrypt a message from the peer. Returns the plaintext bytes written
    /// to `out`.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.recv.decrypt_with_ad(&[], message, out)
    }

    /// The final handshake hash — a channel-binding value equal on both
    /// sides after a successful handshake.
    pub fn handshake_hash(&self) -> &[u8] {
        &self.handshake_hash
    }

    /// The AEAD tag overhead per transport message.
    pub fn overhead(&self) -> usize {
        TAG_LEN
    }

    /// Rekey the sending cipher (Noise spec Section 11.3).
    pub fn rekey_send(&mut self) -> Result<(), Error> {
        self.send.rekey()
    }

    /// Rekey the receiving cipher (Noise spec Section 11.3).
    pub fn rekey_recv(&mut self) -> Result<(), Error> {
        self.recv.rekey()
    }

    /// Take the state apart into its directional ciphers.
    ///
    /// Returned in `(send, recv)` order for this side.
    pub fn into_ciphers(self) -> (CipherState, CipherState) {
        (self.send, self.recv)
    }
}
