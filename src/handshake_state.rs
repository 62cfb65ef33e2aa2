use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::cipher_state::CipherState;
use crate::crypto::cipher::{Aead, TAG_LEN};
use crate::crypto::dh::{Curve, Keypair};
use crate::crypto::hash::Hash;
use crate::error::{Error, KeyKind};
use crate::pattern::{Direction, HandshakePattern, MessageLine, Token};
use crate::rekey::Rekeyer;
use crate::symmetric_state::SymmetricState;
use crate::transport::TransportState;

/// Length of a pre-shared key in bytes.
pub const PSK_LEN: usize = 32;

/// The next step the caller must take to advance the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Call [`HandshakeState::write_message`].
    WriteMessage,
    /// Call [`HandshakeState::read_message`] with the peer's message.
    ReadMessage,
    /// The message program is exhausted; split into transport ciphers.
    Complete,
    /// An earlier error aborted the handshake; discard the state.
    Aborted,
}

/// Everything a handshake needs at construction time.
///
/// Assembled by [`Builder`](crate::Builder); the fields mirror the
/// configuration surface one-to-one.
pub(crate) struct HandshakeParts {
    pub name: String,
    pub pattern: HandshakePattern,
    pub initiator: bool,
    pub prologue: Vec<u8>,
    pub curve: Arc<dyn Curve>,
    pub aead: Arc<dyn Aead>,
    pub hash: Arc<dyn Hash>,
    pub s: Option<Box<dyn Keypair>>,
    pub e: Option<Box<dyn Keypair>>,
    pub rs: Option<Vec<u8>>,
    pub re: Option<Vec<u8>>,
    pub psks: Vec<Zeroizing<[u8; PSK_LEN]>>,
    pub auto_padding: bool,
    pub rekeyer: Option<Rekeyer>,
}

/// Noise HandshakeState — executes a compiled pattern's token program.
///
/// Per Noise spec Section 5.3, generalized over the DH curve, AEAD cipher,
/// and hash supplied at construction. Each `write_message`/`read_message`
/// call consumes one message line; when the program is exhausted the state
/// is complete and [`split`](Self::split) or
/// [`into_transport`](Self::into_transport) consume it.
///
/// Any error aborts the handshake irrecoverably: subsequent calls return
/// [`Error::WrongState`] and all key material is wiped when the state drops.
pub struct HandshakeState {
    /// `Option` so that `split`/`into_transport` can `.take()` it.
    symmetric: Option<SymmetricState>,
    curve: Arc<dyn Curve>,
    initiator: bool,
    /// Whether the pattern carries psk tokens; in that mode every `e`
    /// additionally mixes the ephemeral into the chaining key.
    psk_mode: bool,
    s: Option<Box<dyn Keypair>>,
    e: Option<Box<dyn Keypair>>,
    rs: Option<Zeroizing<Vec<u8>>>,
    re: Option<Zeroizing<Vec<u8>>>,
    psks: VecDeque<Zeroizing<[u8; PSK_LEN]>>,
    message_patterns: VecDeque<MessageLine>,
    should_write: bool,
    aborted: bool,
}

impl std::fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeState")
            .field("initiator", &self.initiator)
            .field("psk_mode", &self.psk_mode)
            .field("should_write", &self.should_write)
            .field("aborted", &self.aborted)
            .field("is_complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

impl HandshakeState {
    pub(crate) fn new(parts: HandshakeParts) -> Result<Self, Error> {
        let HandshakeParts {
            name,
            pattern,
            initiator,
            prologue,
            curve,
            aead,
            hash,
            mut s,
            mut e,
            rs,
            re,
            psks,
            auto_padding,
            rekeyer,
        } = parts;

        let expected_psks = pattern.num_psks();
        if expected_psks != psks.len() {
            return Err(Error::PskCountMismatch {
                expected: expected_psks,
                actual: psks.len(),
            });
        }

        let cipher = CipherState::new(aead, rekeyer);
        let mut symmetric = SymmetricState::initialize(name.as_bytes(), hash, cipher);
        symmetric.mix_hash(&prologue);

        // Keys the pattern requires before the first message: everything a
        // pre-message publishes, plus our static if we ever transmit `s`.
        let requirements = KeyRequirements::of(&pattern, initiator);
        if requirements.local_static && s.is_none() {
            if auto_padding {
                s = Some(curve.generate_keypair(None)?);
            } else {
                return Err(Error::MissingKey(KeyKind::LocalStatic));
            }
        }
        if requirements.local_ephemeral_pre && e.is_none() {
            if auto_padding {
                e = Some(curve.generate_keypair(None)?);
            } else {
                return Err(Error::MissingKey(KeyKind::LocalEphemeral));
            }
        }
        if requirements.remote_static_pre && rs.is_none() {
            return Err(Error::MissingKey(KeyKind::RemoteStatic));
        }
        if requirements.remote_ephemeral_pre && re.is_none() {
            return Err(Error::MissingKey(KeyKind::RemoteEphemeral));
        }

        let rs = rs.map(Zeroizing::new);
        let re = re.map(Zeroizing::new);

        // Mix pre-message public keys into the transcript, in pattern order.
        for line in pattern.pre_messages() {
            let local = (line.sender == Direction::Initiator) == initiator;
            for token in &line.tokens {
                let public: &[u8] = match (token, local) {
                    (Token::E, true) => e
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::LocalEphemeral))?
                        .public(),
                    (Token::S, true) => s
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::LocalStatic))?
                        .public(),
                    (Token::E, false) => re
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::RemoteEphemeral))?,
                    (Token::S, false) => rs
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::RemoteStatic))?,
                    // Pre-message validation only admits e and s.
                    _ => return Err(Error::WrongState),
                };
                symmetric.mix_hash(public);
            }
        }

        debug!(
            protocol = %name,
            initiator,
            messages = pattern.messages().len(),
            "handshake initialized"
        );

        Ok(Self {
            symmetric: Some(symmetric),
            curve,
            initiator,
            psk_mode: pattern.has_psk(),
            s,
            e,
            rs,
            re,
            psks: psks.into(),
            message_patterns: pattern.messages().to_vec().into(),
            should_write: initiator,
            aborted: false,
        })
    }

    /// What the caller should do next.
    pub fn next_action(&self) -> HandshakeAction {
        if self.aborted {
            HandshakeAction::Aborted
        } else if self.message_patterns.is_empty() {
            HandshakeAction::Complete
        } else if self.should_write {
            HandshakeAction::WriteMessage
        } else {
            HandshakeAction::ReadMessage
        }
    }

    /// Whether the message program is exhausted.
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.message_patterns.is_empty()
    }

    /// Whether this side initiated the handshake.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// The peer's static public key, once transmitted or pre-configured.
    pub fn remote_static(&self) -> Option<&[u8]> {
        self.rs.as_deref().map(|v| v.as_slice())
    }

    /// The current handshake hash, a channel-binding value.
    ///
    /// Both sides hold the same value after processing the same messages.
    pub fn handshake_hash(&self) -> Result<&[u8], Error> {
        self.symmetric
            .as_ref()
            .map(SymmetricState::handshake_hash)
            .ok_or(Error::WrongState)
    }

    /// Bytes the next message adds beyond its payload, given current keying.
    pub fn next_message_overhead(&self) -> usize {
        let Some(line) = self.message_patterns.front() else {
            return 0;
        };
        let mut keyed = self
            .symmetric
            .as_ref()
            .map(SymmetricState::has_key)
            .unwrap_or(false);
        let mut overhead = 0;
        for token in &line.tokens {
            match token {
                Token::E => {
                    overhead += self.curve.pub_len();
                    if self.psk_mode {
                        keyed = true;
                    }
                }
                Token::S => {
                    overhead += self.curve.pub_len() + if keyed { TAG_LEN } else { 0 };
                }
                Token::Ee | Token::Es | Token::Se | Token::Ss | Token::Psk => keyed = true,
            }
        }
        overhead + if keyed { TAG_LEN } else { 0 }
    }

    /// Produce the next handshake message, encrypting `payload` into it.
    ///
    /// Returns the number of bytes written to `out`.
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if self.aborted {
            return Err(Error::WrongState);
        }
        if self.message_patterns.is_empty() {
            return Err(Error::WrongState);
        }
        if !self.should_write {
            return Err(Error::WrongTurn);
        }
        // Sized before any state mutates, so a small buffer is recoverable.
        if out.len() < self.next_message_overhead() + payload.len() {
            return Err(Error::BufferTooSmall);
        }

        let Some(line) = self.message_patterns.pop_front() else {
            return Err(Error::WrongState);
        };
        match self.write_line(&line, payload, out) {
            Ok(len) => {
                trace!(line = %line, len, "wrote handshake message");
                self.should_write = false;
                Ok(len)
            }
            Err(err) => {
                self.aborted = true;
                Err(err)
            }
        }
    }

    /// Consume the peer's next handshake message, decrypting its payload.
    ///
    /// Returns the number of payload bytes written to `out`.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if self.aborted {
            return Err(Error::WrongState);
        }
        if self.message_patterns.is_empty() {
            return Err(Error::WrongState);
        }
        if self.should_write {
            return Err(Error::WrongTurn);
        }

        let Some(line) = self.message_patterns.pop_front() else {
            return Err(Error::WrongState);
        };
        match self.read_line(&line, message, out) {
            Ok(len) => {
                trace!(line = %line, len, "read handshake message");
                self.should_write = true;
                Ok(len)
            }
            Err(err) => {
                self.aborted = true;
                Err(err)
            }
        }
    }

    /// Consume the completed handshake into the two transport cipher states.
    ///
    /// The first state carries initiator-to-responder traffic, the second
    /// the reverse.
    pub fn split(mut self) -> Result<(CipherState, CipherState), Error> {
        let symmetric = self.take_complete()?;
        let (_, c1, c2) = symmetric.split();
        debug!("handshake split into transport ciphers");
        Ok((c1, c2))
    }

    /// Consume the completed handshake into a [`TransportState`] with
    /// send/recv assigned by role.
    pub fn into_transport(mut self) -> Result<TransportState, Error> {
        let initiator = self.initiator;
        let symmetric = self.take_complete()?;
        let (h, c1, c2) = symmetric.split();
        debug!(initiator, "handshake split into transport state");
        Ok(TransportState::new(h, c1, c2, initiator))
    }

    /// Derive an additional symmetric key from the completed handshake.
    ///
    /// Both sides derive equal values for equal labels; distinct labels
    /// yield independent keys.
    pub fn derive_secret(&self, label: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        if !self.is_complete() {
            return Err(Error::WrongState);
        }
        let symmetric = self.symmetric.as_ref().ok_or(Error::WrongState)?;
        Ok(symmetric.derive_secret(label))
    }

    fn take_complete(&mut self) -> Result<SymmetricState, Error> {
        if !self.is_complete() {
            return Err(Error::WrongState);
        }
        self.symmetric.take().ok_or(Error::WrongState)
    }

    fn ss(&mut self) -> Result<&mut SymmetricState, Error> {
        self.symmetric.as_mut().ok_or(Error::WrongState)
    }

    fn write_line(
        &mut self,
        line: &MessageLine,
        payload: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let mut offset = 0;
        for token in &line.tokens {
            match token {
                Token::E => {
                    if self.e.is_none() {
                        self.e = Some(self.curve.generate_keypair(None)?);
                    }
                    let public = self
                        .e
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::LocalEphemeral))?
                        .public()
                        .to_vec();
                    out[offset..offset + public.len()].copy_from_slice(&public);
                    offset += public.len();
                    self.ss()?.mix_hash(&public);
                    if self.psk_mode {
                        self.ss()?.mix_key(&public);
                    }
                }
                Token::S => {
                    let public = self
                        .s
                        .as_ref()
                        .ok_or(Error::MissingKey(KeyKind::LocalStatic))?
                        .public()
                        .to_vec();
                    offset += self.ss()?.encrypt_and_hash(&public, &mut out[offset..])?;
                }
                Token::Ee | Token::Es | Token::Se | Token::Ss => {
                    let shared = self.token_dh(*token)?;
                    self.ss()?.mix_key(&shared);
                }
                Token::Psk => self.mix_next_psk()?,
            }
        }
        offset += self.ss()?.encrypt_and_hash(payload, &mut out[offset..])?;
        Ok(offset)
    }

    fn read_line(
        &mut self,
        line: &MessageLine,
        message: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let mut rest = message;
        for token in &line.tokens {
            match token {
                Token::E => {
                    let pub_len = self.curve.pub_len();
                    if rest.len() < pub_len {
                        return Err(Error::TruncatedMessage);
                    }
                    let re = self.curve.load_public(&rest[..pub_len])?;
                    rest = &rest[pub_len..];
                    self.ss()?.mix_hash(&re);
                    if self.psk_mode {
                        self.ss()?.mix_key(&re);
                    }
                    self.re = Some(Zeroizing::new(re));
                }
                Token::S => {
                    let pub_len = self.curve.pub_len();
                    let keyed = self.symmetric.as_ref().ok_or(Error::WrongState)?.has_key();
                    let chunk = pub_len + if keyed { TAG_LEN } else { 0 };
                    if rest.len() < chunk {
                        return Err(Error::TruncatedMessage);
                    }
                    let mut raw = Zeroizing::new(vec![0u8; pub_len]);
                    self.ss()?.decrypt_and_hash(&rest[..chunk], &mut raw)?;
                    rest = &rest[chunk..];
                    let rs = self.curve.load_public(&raw)?;
                    self.rs = Some(Zeroizing::new(rs));
                }
                Token::Ee | Token::Es | Token::Se | Token::Ss => {
                    let shared = self.token_dh(*token)?;
                    self.ss()?.mix_key(&shared);
                }
                Token::Psk => self.mix_next_psk()?,
            }
        }
        self.ss()?.decrypt_and_hash(rest, out)
    }

    /// Resolve a DH token to the key pair it uses on this side.
    ///
    /// `es` is always the initiator's ephemeral against the responder's
    /// static, and `se` the reverse, regardless of who processes the token.
    fn token_dh(&self, token: Token) -> Result<Zeroizing<Vec<u8>>, Error> {
        let (use_local_e, use_remote_e) = match token {
            Token::Ee => (true, true),
            Token::Es => (self.initiator, !self.initiator),
            Token::Se => (!self.initiator, self.initiator),
            Token::Ss => (false, false),
            _ => return Err(Error::WrongState),
        };

        let local = if use_local_e {
            self.e
                .as_ref()
                .ok_or(Error::MissingKey(KeyKind::LocalEphemeral))?
        } else {
            self.s
                .as_ref()
                .ok_or(Error::MissingKey(KeyKind::LocalStatic))?
        };
        let remote: &[u8] = if use_remote_e {
            self.re
                .as_ref()
                .ok_or(Error::MissingKey(KeyKind::RemoteEphemeral))?
        } else {
            self.rs
                .as_ref()
                .ok_or(Error::MissingKey(KeyKind::RemoteStatic))?
        };
        local.dh(remote)
    }

    fn mix_next_psk(&mut self) -> Result<(), Error> {
        let psk = self.psks.pop_front().ok_or(Error::WrongState)?;
        self.ss()?.mix_key_and_hash(psk.as_slice());
        Ok(())
    }
}

/// Which keys must exist before the first message, derived from the
/// pre-messages and from whether this side ever transmits its static.
struct KeyRequirements {
    local_static: bool,
    local_ephemeral_pre: bool,
    remote_static_pre: bool,
    remote_ephemeral_pre: bool,
}

impl KeyRequirements {
    fn of(pattern: &HandshakePattern, initiator: bool) -> Self {
        let mut req = Self {
            local_static: false,
            local_ephemeral_pre: false,
            remote_static_pre: false,
            remote_ephemeral_pre: false,
        };
        for line in pattern.pre_messages() {
            let local = (line.sender == Direction::Initiator) == initiator;
            for token in &line.tokens {
                match (token, local) {
                    (Token::S, true) => req.local_static = true,
                    (Token::E, true) => req.local_ephemeral_pre = true,
                    (Token::S, false) => req.remote_static_pre = true,
                    (Token::E, false) => req.remote_ephemeral_pre = true,
                    _ => {}
                }
            }
        }
        for line in pattern.messages() {
            let local = (line.sender == Direction::Initiator) == initiator;
            if local && line.tokens.contains(&Token::S) {
                req.local_static = true;
            }
        }
        req
    }
}
