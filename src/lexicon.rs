//! Bidirectional dictionary between wire identifiers and human names.
//!
//! The server pushes one `L<kind><index>(<mode>)=<name>` line per
//! variable while a connection is new. Every accepted line lands in
//! both indices as the same shared [`MessageDefinition`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::types::{MessageDefinition, PsxError};

/// A lexicon shared between a connection and the messages linked to it
pub type SharedLexicon = Arc<RwLock<Lexicon>>;

/// Create an empty shared lexicon
pub fn shared() -> SharedLexicon {
    Arc::new(RwLock::new(Lexicon::new()))
}

/// Read-lock a shared lexicon. A poisoned lock still holds a consistent
/// map (writers never panic mid-update), so it is used as is.
pub(crate) fn read(lexicon: &SharedLexicon) -> RwLockReadGuard<'_, Lexicon> {
    lexicon.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(lexicon: &SharedLexicon) -> RwLockWriteGuard<'_, Lexicon> {
    lexicon.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default, Clone)]
pub struct Lexicon {
    by_wire_id: HashMap<String, Arc<MessageDefinition>>,
    by_human_name: HashMap<String, Arc<MessageDefinition>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn one definition line, e.g. `Lh402(K)=KeybCduC`.
    ///
    /// A line without `=` registers an empty human name. Registering a
    /// wire id or human name that is already known replaces the older
    /// definition in both indices; the latest line wins.
    pub fn register(&mut self, line: &str) -> Result<Arc<MessageDefinition>, PsxError> {
        let (key, human_name) = line.split_once('=').unwrap_or((line, ""));
        let def = Arc::new(MessageDefinition::parse(key, human_name)?);
        self.insert(def.clone());
        debug!("Lexicon learned {} => {}", def.wire_id(), def.human_name);
        Ok(def)
    }

    /// Insert an already parsed definition
    pub fn insert(&mut self, def: Arc<MessageDefinition>) {
        let wire_id = def.wire_id();

        // Drop the counterpart entries of whatever this definition displaces
        // so both indices keep describing the same set.
        if let Some(old) = self.by_wire_id.get(&wire_id).cloned() {
            if old.human_name != def.human_name
                && self
                    .by_human_name
                    .get(&old.human_name)
                    .is_some_and(|d| Arc::ptr_eq(d, &old))
            {
                self.by_human_name.remove(&old.human_name);
            }
        }
        if let Some(old) = self.by_human_name.get(&def.human_name).cloned() {
            let old_wire_id = old.wire_id();
            if old_wire_id != wire_id
                && self
                    .by_wire_id
                    .get(&old_wire_id)
                    .is_some_and(|d| Arc::ptr_eq(d, &old))
            {
                self.by_wire_id.remove(&old_wire_id);
            }
        }

        self.by_human_name.insert(def.human_name.clone(), def.clone());
        self.by_wire_id.insert(wire_id, def);
    }

    /// Wire identifier for a human name, if known
    pub fn key_for(&self, human_name: &str) -> Option<String> {
        self.by_human_name.get(human_name).map(|def| def.wire_id())
    }

    /// Human name for a wire identifier, if known
    pub fn human_name_for(&self, wire_id: &str) -> Option<&str> {
        self.by_wire_id
            .get(wire_id)
            .map(|def| def.human_name.as_str())
    }

    pub fn by_wire_id(&self, wire_id: &str) -> Option<Arc<MessageDefinition>> {
        self.by_wire_id.get(wire_id).cloned()
    }

    pub fn by_human_name(&self, human_name: &str) -> Option<Arc<MessageDefinition>> {
        self.by_human_name.get(human_name).cloned()
    }

    /// Iterate over every known definition (unordered)
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<MessageDefinition>> {
        self.by_wire_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_wire_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_wire_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageKind, UpdateMode};

    fn sample() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.register("Lh402(K)=KeybCduC").unwrap();
        lex.register("Li242(Z)=UplinkBits").unwrap();
        lex
    }

    #[test]
    fn test_register_and_lookup() {
        let lex = sample();
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.key_for("KeybCduC").as_deref(), Some("Qh402"));
        assert_eq!(lex.key_for("UplinkBits").as_deref(), Some("Qi242"));
        assert_eq!(lex.human_name_for("Qh402"), Some("KeybCduC"));
        assert_eq!(lex.human_name_for("Qi242"), Some("UplinkBits"));
    }

    #[test]
    fn test_register_returns_definition() {
        let mut lex = Lexicon::new();
        let def = lex.register("Lh402(K)=KeybCduC").unwrap();
        assert_eq!(def.kind, MessageKind::Human);
        assert_eq!(def.mode, UpdateMode::Cdukeyb);
        assert_eq!(def.index, 402);
        assert_eq!(def.wire_id(), "Qh402");
        assert!(Arc::ptr_eq(&def, &lex.by_wire_id("Qh402").unwrap()));
        assert!(Arc::ptr_eq(&def, &lex.by_human_name("KeybCduC").unwrap()));
    }

    #[test]
    fn test_misses_are_none() {
        let lex = sample();
        assert!(lex.key_for("Nope").is_none());
        assert!(lex.human_name_for("Qs1").is_none());
    }

    #[test]
    fn test_value_may_contain_equals() {
        let mut lex = Lexicon::new();
        let def = lex.register("Ls12(E)=A=B").unwrap();
        assert_eq!(def.human_name, "A=B");
    }

    #[test]
    fn test_syntax_error_leaves_lexicon_untouched() {
        let mut lex = sample();
        assert!(matches!(
            lex.register("Lq402(K)=Broken"),
            Err(PsxError::Syntax(_))
        ));
        assert!(matches!(lex.register("Qh1=2"), Err(PsxError::Syntax(_))));
        assert_eq!(lex.len(), 2);
        assert!(lex.key_for("Broken").is_none());
    }

    #[test]
    fn test_same_wire_id_last_registration_wins() {
        let mut lex = Lexicon::new();
        lex.register("Lh402(K)=KeybCduC").unwrap();
        lex.register("Lh402(K)=KeybCduL").unwrap();

        assert_eq!(lex.len(), 1);
        assert_eq!(lex.human_name_for("Qh402"), Some("KeybCduL"));
        assert_eq!(lex.key_for("KeybCduL").as_deref(), Some("Qh402"));
        // the displaced name no longer resolves
        assert!(lex.key_for("KeybCduC").is_none());
    }

    #[test]
    fn test_same_human_name_last_registration_wins() {
        let mut lex = Lexicon::new();
        lex.register("Li1(S)=Thing").unwrap();
        lex.register("Li2(S)=Thing").unwrap();

        assert_eq!(lex.len(), 1);
        assert_eq!(lex.key_for("Thing").as_deref(), Some("Qi2"));
        assert!(lex.human_name_for("Qi1").is_none());
    }

    #[test]
    fn test_indices_stay_consistent() {
        let mut lex = Lexicon::new();
        for line in [
            "Li1(S)=A",
            "Li2(S)=B",
            "Li1(S)=B",
            "Lh9(N)=C",
            "Li2(E)=C",
        ] {
            lex.register(line).unwrap();
        }
        for def in lex.definitions() {
            assert!(Arc::ptr_eq(def, &lex.by_wire_id(&def.wire_id()).unwrap()));
            assert!(Arc::ptr_eq(def, &lex.by_human_name(&def.human_name).unwrap()));
        }
        assert_eq!(lex.by_wire_id.len(), lex.by_human_name.len());
    }

    #[test]
    fn test_empty_human_name_is_registered() {
        let mut lex = Lexicon::new();
        lex.register("Li5(S)").unwrap();
        assert_eq!(lex.human_name_for("Qi5"), Some(""));
        assert_eq!(lex.key_for("").as_deref(), Some("Qi5"));
    }
}
