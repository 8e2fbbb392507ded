//! Core types shared by the lexicon, the message codec and the connection engine.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default PSX main server port
pub const PSX_DEFAULT_PORT: u16 = 10747;

/// Prefix of every lexicon definition line pushed by the server
pub const LEXICON_PREFIX: char = 'L';

/// Prefix of every derived wire identifier
pub const WIRE_ID_PREFIX: char = 'Q';

/// Separator for multi-field values (and for the `notify` list)
pub const FIELD_SEPARATOR: &str = ";";

/// Reserved top-level keys with built-in meaning
pub mod keys {
    pub const ID: &str = "id";
    pub const VERSION: &str = "version";
    pub const LOAD1: &str = "load1";
    pub const LOAD2: &str = "load2";
    pub const LOAD3: &str = "load3";
    pub const EXIT: &str = "exit";
    pub const NAME: &str = "name";
    pub const NOTIFY: &str = "notify";
}

/// Format of the right hand side of a Q variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Integer,
    String,
    Human,
}

impl MessageKind {
    /// Map a wire letter to a kind
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'i' => Some(MessageKind::Integer),
            's' => Some(MessageKind::String),
            'h' => Some(MessageKind::Human),
            _ => None,
        }
    }

    /// Wire letter for this kind
    pub fn letter(self) -> char {
        match self {
            MessageKind::Integer => 'i',
            MessageKind::String => 's',
            MessageKind::Human => 'h',
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Update mode attached to every lexicon definition.
///
/// The engine never interprets these; they are kept so consumers can
/// tell how often (and why) the server will push a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateMode {
    /// (S) sent once at start
    Start,
    /// (C) continuous; not seen in the wild
    Cont,
    /// (E) economy
    Econ,
    /// (D) delta
    Delta,
    /// (B) big momentary
    Bigmom,
    /// (M) MCP momentary
    Mcpmom,
    /// (G) guarded momentary, 2 position
    Guamom2,
    /// (F) guarded momentary, 4 position
    Guamom4,
    /// (K) CDU keyboard
    Cdukeyb,
    /// (R) RCP
    Rcp,
    /// (A) ACP
    Acp,
    /// (X) mixed
    Mixed,
    /// (Y) extended delta
    Xdelta,
    /// (Z) extended economy
    Xecon,
    /// (N) on demand
    Demand,
}

impl UpdateMode {
    /// Map a mode letter (the character inside the parentheses) to a mode
    pub fn from_letter(letter: char) -> Option<Self> {
        let mode = match letter {
            'S' => UpdateMode::Start,
            'C' => UpdateMode::Cont,
            'E' => UpdateMode::Econ,
            'D' => UpdateMode::Delta,
            'B' => UpdateMode::Bigmom,
            'M' => UpdateMode::Mcpmom,
            'G' => UpdateMode::Guamom2,
            'F' => UpdateMode::Guamom4,
            'K' => UpdateMode::Cdukeyb,
            'R' => UpdateMode::Rcp,
            'A' => UpdateMode::Acp,
            'X' => UpdateMode::Mixed,
            'Y' => UpdateMode::Xdelta,
            'Z' => UpdateMode::Xecon,
            'N' => UpdateMode::Demand,
            _ => return None,
        };
        Some(mode)
    }

    /// Mode letter as it appears in a lexicon line
    pub fn letter(self) -> char {
        match self {
            UpdateMode::Start => 'S',
            UpdateMode::Cont => 'C',
            UpdateMode::Econ => 'E',
            UpdateMode::Delta => 'D',
            UpdateMode::Bigmom => 'B',
            UpdateMode::Mcpmom => 'M',
            UpdateMode::Guamom2 => 'G',
            UpdateMode::Guamom4 => 'F',
            UpdateMode::Cdukeyb => 'K',
            UpdateMode::Rcp => 'R',
            UpdateMode::Acp => 'A',
            UpdateMode::Mixed => 'X',
            UpdateMode::Xdelta => 'Y',
            UpdateMode::Xecon => 'Z',
            UpdateMode::Demand => 'N',
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One learned lexicon entry.
///
/// The wire identifier is always derived from `kind` and `index`, so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub kind: MessageKind,
    pub mode: UpdateMode,
    pub index: u32,
    pub human_name: String,
}

impl MessageDefinition {
    /// Parse the key and value halves of a definition line.
    ///
    /// `key` is the left hand side (`Lh402(K)`), `human_name` the right
    /// hand side (`KeybCduC`).
    pub fn parse(key: &str, human_name: &str) -> Result<Self, PsxError> {
        let rest = key
            .strip_prefix(LEXICON_PREFIX)
            .ok_or_else(|| PsxError::Syntax(format!("'{}' is not a lexicon line", key)))?;

        // L + kind letter, at least one index digit and the "(M)" suffix
        if key.len() < 6 {
            return Err(PsxError::Syntax(format!("'{}' is too short", key)));
        }

        let mut chars = rest.chars();
        let kind = chars
            .next()
            .and_then(MessageKind::from_letter)
            .ok_or_else(|| PsxError::Syntax(format!("'{}' has an unknown kind letter", key)))?;

        let body = chars.as_str();
        let open = body
            .find('(')
            .ok_or_else(|| PsxError::Syntax(format!("'{}' has no mode suffix", key)))?;

        let index = body[..open]
            .parse::<u32>()
            .map_err(|e| PsxError::Syntax(format!("'{}' has a bad index: {}", key, e)))?;

        let mode = body[open + 1..]
            .chars()
            .next()
            .and_then(UpdateMode::from_letter)
            .ok_or_else(|| PsxError::Syntax(format!("'{}' has an unknown mode letter", key)))?;

        Ok(Self {
            kind,
            mode,
            index,
            human_name: human_name.to_string(),
        })
    }

    /// The identifier the server uses on the wire, e.g. `Qh402`
    pub fn wire_id(&self) -> String {
        format!("{}{}{}", WIRE_ID_PREFIX, self.kind.letter(), self.index)
    }
}

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Never connected
    Disconnected,
    /// Connected, lexicon still being pushed (the acquisition window)
    New,
    /// `load1` seen
    Acquiring1,
    /// `load2` seen
    Acquiring2,
    /// `load3` seen; steady state
    Running,
    /// Transport failed under the listener
    Failed,
    /// Server sent `exit`
    Ended,
    /// Listener cleaned up; a fresh connect is allowed
    ListenerExited,
}

impl Phase {
    /// Whether `connect`/`attach` may start a new session from this phase
    pub fn can_connect(self) -> bool {
        matches!(self, Phase::Disconnected | Phase::ListenerExited)
    }
}

/// Errors produced by the PSX client
#[derive(Debug, Error)]
pub enum PsxError {
    #[error("Lexicon syntax error: {0}")]
    Syntax(String),

    #[error("Connection is not currently open")]
    NotConnected,

    #[error("Connection is still busy and unable to reconnect")]
    ConnectionBusy,

    #[error("Transport error: {0}")]
    Transport(io::Error),

    #[error("Short write: transport stopped accepting bytes mid-line")]
    ShortWrite,

    #[error("Line exceeds maximum length of {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PsxError {
    /// Whether this error terminates the listener
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PsxError::Transport(_) | PsxError::ShortWrite | PsxError::LineTooLong { .. }
        )
    }
}

impl From<io::Error> for PsxError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::WriteZero {
            PsxError::ShortWrite
        } else {
            PsxError::Transport(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cdu_keyboard_definition() {
        let def = MessageDefinition::parse("Lh402(K)", "KeybCduC").unwrap();
        assert_eq!(def.kind, MessageKind::Human);
        assert_eq!(def.mode, UpdateMode::Cdukeyb);
        assert_eq!(def.index, 402);
        assert_eq!(def.human_name, "KeybCduC");
        assert_eq!(def.wire_id(), "Qh402");
    }

    #[test]
    fn test_parse_xecon_definition() {
        let def = MessageDefinition::parse("Li242(Z)", "UplinkBits").unwrap();
        assert_eq!(def.kind, MessageKind::Integer);
        assert_eq!(def.mode, UpdateMode::Xecon);
        assert_eq!(def.index, 242);
        assert_eq!(def.wire_id(), "Qi242");
    }

    #[test]
    fn test_parse_string_kind() {
        let def = MessageDefinition::parse("Ls7(S)", "FltNo").unwrap();
        assert_eq!(def.kind, MessageKind::String);
        assert_eq!(def.mode, UpdateMode::Start);
        assert_eq!(def.wire_id(), "Qs7");
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let bad = [
            ("Qh402(K)", "not an L line"),
            ("Lh(K)", "too short"),
            ("Lx402(K)", "bad kind"),
            ("Lh402K", "no parenthesis"),
            ("Lh4a2(K)", "bad index"),
            ("Lh-42(K)", "negative index"),
            ("Lh402(Q)", "bad mode"),
            ("Lh4020(", "nothing after parenthesis"),
        ];
        for (key, why) in bad {
            let result = MessageDefinition::parse(key, "Name");
            assert!(
                matches!(result, Err(PsxError::Syntax(_))),
                "{} should fail: {}",
                key,
                why
            );
        }
    }

    #[test]
    fn test_mode_letters_cover_all_modes() {
        let letters = "SCEDBMGFKRAXYZN";
        for letter in letters.chars() {
            let mode = UpdateMode::from_letter(letter).unwrap();
            assert_eq!(mode.letter(), letter);
        }
        assert!(UpdateMode::from_letter('s').is_none());
    }

    #[test]
    fn test_write_zero_maps_to_short_write() {
        let err: PsxError = io::Error::new(io::ErrorKind::WriteZero, "zero").into();
        assert!(matches!(err, PsxError::ShortWrite));
        assert!(err.is_fatal());

        let err: PsxError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, PsxError::Transport(_)));
        assert!(!PsxError::Syntax("x".into()).is_fatal());
    }

    #[test]
    fn test_phase_can_connect() {
        assert!(Phase::Disconnected.can_connect());
        assert!(Phase::ListenerExited.can_connect());
        assert!(!Phase::Running.can_connect());
        assert!(!Phase::Failed.can_connect());
    }
}
