//! A single protocol line, split into wire key and optional value.
//!
//! Messages linked to a lexicon resolve their wire key to a human name
//! lazily. The link is weak: a message never keeps a lexicon alive, and
//! a failed resolution is simply retried on the next access.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use crate::lexicon::{self, Lexicon, SharedLexicon};
use crate::types::{MessageDefinition, FIELD_SEPARATOR};

#[derive(Debug, Clone, Default)]
pub struct WireMsg {
    key: String,
    value: Option<String>,
    definition: OnceLock<Arc<MessageDefinition>>,
    lexicon: Option<Weak<RwLock<Lexicon>>>,
}

impl WireMsg {
    /// A blank message with no lexicon link
    pub fn new() -> Self {
        Self::default()
    }

    /// A blank message linked to `lexicon`
    pub fn linked(lexicon: &SharedLexicon) -> Self {
        Self {
            lexicon: Some(Arc::downgrade(lexicon)),
            ..Self::default()
        }
    }

    /// Parse a line (without its terminator) with no lexicon link
    pub fn parse(line: &str) -> Self {
        let mut msg = Self::new();
        msg.fill_from(line);
        msg
    }

    /// Parse a line and resolve its key against `lexicon`
    pub fn parse_linked(lexicon: &SharedLexicon, line: &str) -> Self {
        let mut msg = Self::linked(lexicon);
        msg.fill_from(line);
        msg
    }

    fn fill_from(&mut self, line: &str) {
        match line.split_once('=') {
            Some((key, value)) => {
                self.set_key(key);
                self.value = Some(value.to_string());
            }
            None => {
                self.set_key(line);
                self.value = None;
            }
        }
    }

    /// Look the current key up, caching a hit. Misses leave the cache
    /// empty so a later call can pick up a definition learned since.
    fn resolve(&self) -> Option<Arc<MessageDefinition>> {
        if let Some(def) = self.definition.get() {
            return Some(def.clone());
        }
        let lexicon = self.lexicon.as_ref()?.upgrade()?;
        let def = lexicon::read(&lexicon).by_wire_id(&self.key)?;
        let _ = self.definition.set(def.clone());
        Some(def)
    }

    /// The key as sent on the wire
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the wire key, dropping any cached resolution
    pub fn set_key(&mut self, key: &str) {
        if self.key != key {
            self.key = key.to_string();
            self.definition = OnceLock::new();
        }
        self.resolve();
    }

    /// Human name for the key, or the raw key when it is not (yet) known
    pub fn decoded_key(&self) -> String {
        match self.resolve() {
            Some(def) => def.human_name.clone(),
            None => self.key.clone(),
        }
    }

    /// Set the key from a human name.
    ///
    /// Unknown names are used literally as the wire key, which allows
    /// sending raw keys the lexicon has never heard of.
    pub fn set_decoded_key(&mut self, human_name: &str) {
        let lex = self.lexicon.as_ref().and_then(Weak::upgrade);
        let def = lex
            .as_ref()
            .and_then(|lex| lexicon::read(lex).by_human_name(human_name));

        self.definition = OnceLock::new();
        match def {
            Some(def) => {
                self.key = def.wire_id();
                let _ = self.definition.set(def);
            }
            None => self.key = human_name.to_string(),
        }
    }

    /// Definition for the key, resolved on demand
    pub fn definition(&self) -> Option<Arc<MessageDefinition>> {
        self.resolve()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// The value, or `""` when the line had none
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Field `idx` of a `;` separated value. `None` when the message has
    /// no value or fewer fields.
    pub fn value_at(&self, idx: usize) -> Option<&str> {
        self.value.as_deref()?.split(FIELD_SEPARATOR).nth(idx)
    }

    /// The line as sent on the wire, without terminator
    pub fn wire_string(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", self.key, value),
            None => self.key.clone(),
        }
    }
}

/// Decoded form for logs: `HumanName=value`
impl fmt::Display for WireMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.decoded_key(), value),
            None => write!(f, "{}", self.key),
        }
    }
}
