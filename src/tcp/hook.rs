//! Callback interface for received messages.

use crate::lexicon::SharedLexicon;
use crate::message::WireMsg;
use crate::types::Phase;

/// Callback invoked for every received message whose decoded key matches
/// the name the hook was registered under.
///
/// Hooks run synchronously on the listener, so a slow hook delays every
/// line behind it.
pub type MessageHook = Box<dyn FnMut(&mut HookContext<'_>, &WireMsg) + Send>;

/// View of the connection handed to a hook
pub struct HookContext<'a> {
    pub(crate) assigned_id: Option<i64>,
    pub(crate) version: &'a str,
    pub(crate) phase: Phase,
    pub(crate) lexicon: &'a SharedLexicon,
    pub(crate) outbox: &'a mut Vec<WireMsg>,
}

impl HookContext<'_> {
    /// ID assigned by the server/router
    pub fn id(&self) -> Option<i64> {
        self.assigned_id
    }

    /// Version string reported by the server
    pub fn version(&self) -> &str {
        self.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Build a message from a human name and value, encoded through the
    /// connection's lexicon
    pub fn new_pair(&self, human_key: &str, value: impl Into<String>) -> WireMsg {
        let mut msg = WireMsg::linked(self.lexicon);
        msg.set_decoded_key(human_key);
        msg.set_value(value);
        msg
    }

    /// Queue a message. The listener writes queued messages, in order,
    /// as soon as the hook returns.
    pub fn send(&mut self, msg: WireMsg) {
        self.outbox.push(msg);
    }
}
