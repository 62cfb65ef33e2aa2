//! Handshake pattern parsing and validation.
//!
//! A pattern is written in the textual form used by the Noise specification:
//!
//! ```text
//! <- s
//! ...
//! -> e, es, s, ss
//! <- e, ee, se
//! ```
//!
//! Lines before the `...` marker are pre-messages (keys known out of band);
//! lines after it are the message program the handshake executes. Parsing
//! produces a [`HandshakePattern`] that has already passed the framework's
//! validity rules, so the handshake state can interpret it without further
//! checks.

use core::fmt;

use crate::error::{Error, Violation};

/// One operation in a message line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Transmit an ephemeral public key.
    E,
    /// Transmit the (possibly encrypted) static public key.
    S,
    /// DH between both ephemerals.
    Ee,
    /// DH between the initiator's ephemeral and the responder's static.
    Es,
    /// DH between the initiator's static and the responder's ephemeral.
    Se,
    /// DH between both statics.
    Ss,
    /// Mix the next pre-shared key.
    Psk,
}

impl Token {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "e" => Some(Self::E),
            "s" => Some(Self::S),
            "ee" => Some(Self::Ee),
            "es" => Some(Self::Es),
            "se" => Some(Self::Se),
            "ss" => Some(Self::Ss),
            "psk" => Some(Self::Psk),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::E => f.write_str("e"),
            Self::S => f.write_str("s"),
            Self::Ee => f.write_str("ee"),
            Self::Es => f.write_str("es"),
            Self::Se => f.write_str("se"),
            Self::Ss => f.write_str("ss"),
            Self::Psk => f.write_str("psk"),
        }
    }
}

/// Which party a message line flows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `->`: initiator to responder.
    Initiator,
    /// `<-`: responder to initiator.
    Responder,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => f.write_str("->"),
            Self::Responder => f.write_str("<-"),
        }
    }
}

/// A direction followed by a non-empty token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLine {
    pub sender: Direction,
    pub tokens: Vec<Token>,
}

impl fmt::Display for MessageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sender)?;
        for (i, token) in self.tokens.iter().enumerate() {
            if i == 0 {
                write!(f, " {token}")?;
            } else {
                write!(f, ", {token}")?;
            }
        }
        Ok(())
    }
}

/// A compiled, validated handshake pattern.
#[derive(Debug, Clone)]
pub struct HandshakePattern {
    name: String,
    pre_messages: Vec<MessageLine>,
    messages: Vec<MessageLine>,
}

impl HandshakePattern {
    /// Parse and validate a pattern from its textual form.
    ///
    /// `name` is the pattern's name as it appears in a protocol name (it is
    /// carried for diagnostics, not interpreted here). Lines before a `...`
    /// line form the pre-message block.
    pub fn parse(name: &str, source: &str) -> Result<Self, Error> {
        let lines: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let (pre_lines, msg_lines) = match lines.iter().position(|l| *l == "...") {
            Some(i) => (&lines[..i], &lines[i + 1..]),
            None => (&lines[..0], &lines[..]),
        };

        let pre_messages = pre_lines
            .iter()
            .map(|l| parse_line(l))
            .collect::<Result<Vec<_>, _>>()?;
        let messages = msg_lines
            .iter()
            .map(|l| parse_line(l))
            .collect::<Result<Vec<_>, _>>()?;

        let pattern = Self {
            name: name.to_string(),
            pre_messages,
            messages,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    /// Re-run the full validity check.
    ///
    /// Used after a psk modifier has been applied, since inserting tokens can
    /// invalidate a previously valid pattern.
    pub fn validate(&self) -> Result<(), Error> {
        validate_pre_messages(&self.pre_messages)?;
        validate_messages(&self.messages)
    }

    /// The pattern name, including any modifiers (e.g. `XXpsk3`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pre_messages(&self) -> &[MessageLine] {
        &self.pre_messages
    }

    pub fn messages(&self) -> &[MessageLine] {
        &self.messages
    }

    /// Whether any message line carries a `psk` token.
    ///
    /// In psk mode every `e` token additionally mixes the ephemeral into the
    /// chaining key.
    pub fn has_psk(&self) -> bool {
        self.num_psks() > 0
    }

    /// Number of `psk` tokens across all message lines.
    pub fn num_psks(&self) -> usize {
        self.messages
            .iter()
            .flat_map(|l| l.tokens.iter())
            .filter(|t| **t == Token::Psk)
            .count()
    }

    /// Apply a `pskN` modifier: `psk0` prepends a psk token to the first
    /// message, `pskN` (N >= 1) appends one to message N.
    ///
    /// The caller is expected to bounds-check `n` against `messages()` and to
    /// re-[`validate`](Self::validate) afterwards.
    pub(crate) fn apply_psk_modifier(&mut self, n: usize) {
        if n == 0 {
            self.messages[0].tokens.insert(0, Token::Psk);
        } else {
            self.messages[n - 1].tokens.push(Token::Psk);
        }
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

fn parse_line(line: &str) -> Result<MessageLine, Error> {
    let invalid = || Error::InvalidPattern {
        rule: Violation::InvalidLine,
        line: line.to_string(),
    };

    let mut parts = line.split_whitespace();
    let sender = match parts.next() {
        Some("->") => Direction::Initiator,
        Some("<-") => Direction::Responder,
        _ => return Err(invalid()),
    };

    let mut tokens = Vec::new();
    for raw in parts {
        // "e," becomes "e"
        let literal = raw.trim_matches(',');
        let token =
            Token::parse(literal).ok_or_else(|| Error::InvalidToken(literal.to_string()))?;
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(invalid());
    }

    Ok(MessageLine { sender, tokens })
}

/// Pre-messages may only publish keys: a line is `e`, `s`, or `e, s`, and
/// consecutive lines must alternate direction.
fn validate_pre_messages(lines: &[MessageLine]) -> Result<(), Error> {
    let mut prev: Option<Direction> = None;
    for line in lines {
        if prev == Some(line.sender) {
            return Err(Error::InvalidPattern {
                rule: Violation::ConsecutiveSameDirection,
                line: line.to_string(),
            });
        }
        prev = Some(line.sender);

        if line.tokens.len() > 2 {
            return Err(Error::InvalidPattern {
                rule: Violation::TooManyPreMessageTokens,
                line: line.to_string(),
            });
        }
        match line.tokens.as_slice() {
            [Token::E] | [Token::S] | [Token::E, Token::S] => {}
            _ => {
                return Err(Error::InvalidPattern {
                    rule: Violation::TokenNotAllowedInPreMessage,
                    line: line.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// The message-line rules from the Noise specification:
///
/// 1. Neither party sends `e` or `s` more than once per handshake.
/// 2. Each of `ee`, `es`, `se`, `ss` appears at most once per handshake.
/// 3. An initiator-side `se` requires a prior `ee`.
/// 4. An initiator-side `ss` requires a prior `es`.
/// 5. A responder-side `es` requires a prior `ee`.
/// 6. A responder-side `ss` requires a prior `se`.
///
/// Additionally: at least one line, the first line flows `->`, directions
/// strictly alternate, and `psk` (which may repeat) sits only at the start or
/// end of its line.
fn validate_messages(lines: &[MessageLine]) -> Result<(), Error> {
    let first = lines.first().ok_or(Error::InvalidPattern {
        rule: Violation::EmptyPattern,
        line: String::new(),
    })?;
    if first.sender != Direction::Initiator {
        return Err(Error::InvalidPattern {
            rule: Violation::FirstLineNotInitiator,
            line: first.to_string(),
        });
    }

    let mut prev: Option<Direction> = None;
    let mut initiator_sent = SentKeys::default();
    let mut responder_sent = SentKeys::default();
    let mut seen = SeenDh::default();

    for line in lines {
        if prev == Some(line.sender) {
            return Err(Error::InvalidPattern {
                rule: Violation::ConsecutiveSameDirection,
                line: line.to_string(),
            });
        }
        prev = Some(line.sender);

        let last = line.tokens.len() - 1;
        for (i, token) in line.tokens.iter().enumerate() {
            let repeated = |t: &Token| Error::InvalidPattern {
                rule: Violation::RepeatedToken,
                line: t.to_string(),
            };
            let missing = |t: &Token| Error::InvalidPattern {
                rule: Violation::MissingPrecedingToken,
                line: t.to_string(),
            };

            let sent = match line.sender {
                Direction::Initiator => &mut initiator_sent,
                Direction::Responder => &mut responder_sent,
            };
            match token {
                Token::E => {
                    if sent.e {
                        return Err(repeated(token));
                    }
                    sent.e = true;
                }
                Token::S => {
                    if sent.s {
                        return Err(repeated(token));
                    }
                    sent.s = true;
                }
                Token::Ee => {
                    if seen.ee {
                        return Err(repeated(token));
                    }
                    seen.ee = true;
                }
                Token::Es => {
                    if seen.es {
                        return Err(repeated(token));
                    }
                    seen.es = true;
                    if line.sender == Direction::Responder && !seen.ee {
                        return Err(missing(token));
                    }
                }
                Token::Se => {
                    if seen.se {
                        return Err(repeated(token));
                    }
                    seen.se = true;
                    if line.sender == Direction::Initiator && !seen.ee {
                        return Err(missing(token));
                    }
                }
                Token::Ss => {
                    if seen.ss {
                        return Err(repeated(token));
                    }
                    seen.ss = true;
                    match line.sender {
                        Direction::Initiator if !seen.es => return Err(missing(token)),
                        Direction::Responder if !seen.se => return Err(missing(token)),
                        _ => {}
                    }
                }
                Token::Psk => {
                    if i != 0 && i != last {
                        return Err(Error::InvalidPattern {
                            rule: Violation::MisplacedPsk,
                            line: line.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Default)]
struct SentKeys {
    e: bool,
    s: bool,
}

#[derive(Default)]
struct SeenDh {
    ee: bool,
    es: bool,
    se: bool,
    ss: bool,
}

/// The built-in pattern catalog: the one-way and interactive fundamental
/// patterns. Each entry compiles through [`HandshakePattern::parse`], so the
/// catalog itself exercises the validator.
pub(crate) const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("N", "<- s\n...\n-> e, es"),
    ("K", "-> s\n<- s\n...\n-> e, es, ss"),
    ("X", "<- s\n...\n-> e, es, s, ss"),
    ("NN", "-> e\n<- e, ee"),
    ("NK", "<- s\n...\n-> e, es\n<- e, ee"),
    ("NX", "-> e\n<- e, ee, s, es"),
    ("XN", "-> e\n<- e, ee\n-> s, se"),
    ("XK", "<- s\n...\n-> e, es\n<- e, ee\n-> s, se"),
    ("XX", "-> e\n<- e, ee, s, es\n-> s, se"),
    ("KN", "-> s\n...\n-> e\n<- e, ee, se"),
    ("KK", "-> s\n<- s\n...\n-> e, es, ss\n<- e, ee, se"),
    ("KX", "-> s\n...\n-> e\n<- e, ee, se, s, es"),
    ("IN", "-> e, s\n<- e, ee, se"),
    ("IK", "<- s\n...\n-> e, es, s, ss\n<- e, ee, se"),
    ("IX", "-> e, s\n<- e, ee, se, s, es"),
];
