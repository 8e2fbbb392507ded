//! # psxlink
//!
//! Client library for the line protocol spoken by Precision Simulator X
//! (and by Router/SwitchPSX in front of it).
//!
//! ## Quick Start
//!
//! ```no_run
//! use psxlink::Connection;
//!
//! # async fn run() -> Result<(), psxlink::PsxError> {
//! let mut conn = Connection::new("localhost:10747", "poswatch");
//! conn.subscribe("PiBaHeAlTas");
//! conn.add_hook("PiBaHeAlTas", |_ctx, msg| {
//!     println!("heading: {:?}", msg.value_at(2));
//! });
//!
//! conn.connect().await?;
//! conn.listen().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! Every record is an ASCII line terminated by CRLF, either a bare token
//! or `key=value`. Multi-field values are `;` separated.
//!
//! Variables travel as opaque `Q` keys (`Qh402`, `Qi242`, ...). Their
//! human names are not fixed; the server pushes a lexicon right after
//! connecting:
//!
//! - `L<kind><index>(<mode>)=<HumanName>`
//!
//! Where:
//! - **kind**: `i` integer, `s` string, `h` human
//! - **index**: decimal index within the kind
//! - **mode**: one of `S C E D B M G F K R A X Y Z N`
//!
//! The wire key for a definition is `Q<kind><index>`.
//!
//! ## Session Flow
//!
//! | Key       | Direction       | Meaning                               |
//! |-----------|-----------------|---------------------------------------|
//! | `L...`    | Server → Client | Lexicon definition (only while new)   |
//! | `id`      | Server → Client | Client id; answered with `name`       |
//! | `version` | Server → Client | Server software version               |
//! | `load1`   | Server → Client | Lexicon done; answered with `notify`  |
//! | `load2`   | Server → Client | Second load stage                     |
//! | `load3`   | Server → Client | Running                               |
//! | `exit`    | Both            | Graceful close                        |
//! | `name`    | Client → Server | `client[;instance]`                   |
//! | `notify`  | Client → Server | `;` joined Q keys to subscribe to     |

pub mod codec;
pub mod config;
pub mod lexicon;
pub mod message;
pub mod tcp;
pub mod types;

// Re-export main types for convenience
pub use types::{
    keys, MessageDefinition, MessageKind, Phase, PsxError, UpdateMode, PSX_DEFAULT_PORT,
};

pub use codec::PsxLineCodec;
pub use config::ConnectionConfig;
pub use lexicon::{Lexicon, SharedLexicon};
pub use message::WireMsg;
pub use tcp::{Connection, HookContext, LineSender, MessageHook};
