//! TCP client for the PSX protocol

pub mod client;
pub mod hook;
pub mod sender;

pub use client::Connection;
pub use hook::{HookContext, MessageHook};
pub use sender::LineSender;
