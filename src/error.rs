use core::fmt;

use thiserror::Error;

/// Errors surfaced by the handshake core.
///
/// Every error is terminal for the state that produced it: the core never
/// retries internally, and an aborted handshake cannot be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The protocol name does not match `Noise_<pattern>_<dh>_<cipher>_<hash>`.
    #[error("invalid protocol name '{0}'")]
    InvalidProtocolName(String),

    /// A protocol-name component did not resolve through the registry.
    #[error("{kind} '{name}' is not supported")]
    InvalidComponent { kind: Component, name: String },

    /// A handshake pattern violated one of the framework's structural rules.
    #[error("invalid pattern: {rule} ('{line}')")]
    InvalidPattern { rule: Violation, line: String },

    /// The pattern lexer hit a literal that is not a known token.
    #[error("token '{0}' is invalid")]
    InvalidToken(String),

    /// A key required by the pattern was not supplied.
    #[error("missing {0} key")]
    MissingKey(KeyKind),

    /// The number of configured PSKs does not match the pattern's psk tokens.
    #[error("expected {expected} pre-shared keys, got {actual}")]
    PskCountMismatch { expected: usize, actual: usize },

    /// A write was attempted on a read turn, or vice versa.
    #[error("not this party's turn")]
    WrongTurn,

    /// A handshake message was shorter than the pattern requires.
    #[error("handshake message truncated")]
    TruncatedMessage,

    /// AEAD authentication failed.
    #[error("message authentication failed")]
    AuthFailed,

    /// A public key is invalid (low-order point, wrong length).
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Raw key material had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The nonce counter reached the reserved value 2^64 - 1.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// A cryptographic primitive failed outside of authentication.
    #[error("cryptographic operation failed")]
    CryptoFailed,

    /// The provided output buffer is too small.
    #[error("output buffer too small")]
    BufferTooSmall,

    /// An operation was attempted in the wrong state (completed, aborted,
    /// or already consumed).
    #[error("operation not valid in current state")]
    WrongState,
}

/// The four resolvable components of a protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Pattern,
    Dh,
    Cipher,
    Hash,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => f.write_str("pattern"),
            Self::Dh => f.write_str("dh"),
            Self::Cipher => f.write_str("cipher"),
            Self::Hash => f.write_str("hash"),
        }
    }
}

/// Which key slot a [`Error::MissingKey`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    LocalStatic,
    LocalEphemeral,
    RemoteStatic,
    RemoteEphemeral,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalStatic => f.write_str("local static"),
            Self::LocalEphemeral => f.write_str("local ephemeral"),
            Self::RemoteStatic => f.write_str("remote static"),
            Self::RemoteEphemeral => f.write_str("remote ephemeral"),
        }
    }
}

/// The specific rule a rejected pattern violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A pattern must contain at least one message line.
    EmptyPattern,
    /// A line did not parse as a direction followed by tokens.
    InvalidLine,
    /// The first message line must flow initiator to responder.
    FirstLineNotInitiator,
    /// Consecutive message lines must alternate direction.
    ConsecutiveSameDirection,
    /// A key-transmission or DH token appeared more than once.
    RepeatedToken,
    /// A DH token appeared before the token it depends on.
    MissingPrecedingToken,
    /// Pre-message lines may only carry `e`, `s`, or `e, s`.
    TokenNotAllowedInPreMessage,
    /// Pre-message lines carry at most two tokens.
    TooManyPreMessageTokens,
    /// `psk` must be the first or last token of its line.
    MisplacedPsk,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPattern => f.write_str("empty_pattern"),
            Self::InvalidLine => f.write_str("invalid_line"),
            Self::FirstLineNotInitiator => f.write_str("first_line_not_initiator"),
            Self::ConsecutiveSameDirection => f.write_str("consecutive_same_direction"),
            Self::RepeatedToken => f.write_str("repeated_token"),
            Self::MissingPrecedingToken => f.write_str("missing_preceding_token"),
            Self::TokenNotAllowedInPreMessage => f.write_str("token_not_allowed_in_pre_message"),
            Self::TooManyPreMessageTokens => f.write_str("too_many_pre_message_tokens"),
            Self::MisplacedPsk => f.write_str("misplaced_psk"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_display() {
        let err = Error::InvalidComponent {
            kind: Component::Dh,
            name: "448".to_string(),
        };
        assert_eq!(err.to_string(), "dh '448' is not supported");
    }

    #[test]
    fn pattern_violation_display() {
        let err = Error::InvalidPattern {
            rule: Violation::ConsecutiveSameDirection,
            line: "-> ee".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid pattern: consecutive_same_direction ('-> ee')"
        );
    }

    #[test]
    fn missing_key_display() {
        let err = Error::MissingKey(KeyKind::RemoteStatic);
        assert_eq!(err.to_string(), "missing remote static key");
    }
}
