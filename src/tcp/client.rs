use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::codec::PsxLineCodec;
use crate::config::ConnectionConfig;
use crate::lexicon::{self, SharedLexicon};
use crate::message::WireMsg;
use crate::tcp::hook::{HookContext, MessageHook};
use crate::tcp::sender::LineSender;
use crate::types::{keys, Phase, PsxError, FIELD_SEPARATOR, LEXICON_PREFIX};

/// A client session with a PSX server (or Router/SwitchPSX).
///
/// The connection owns the transport, learns the lexicon while the
/// session is new and dispatches every received line to the hook
/// registered under its decoded key. Drive it with [`Connection::listen`]
/// after connecting.
pub struct Connection<T = TcpStream> {
    config: ConnectionConfig,
    hooks: HashMap<String, MessageHook>,

    // read-only information from the server
    assigned_id: Option<i64>,
    version: String,
    phase: Phase,

    // names to request via `notify`, in subscription order
    subscriptions: Vec<String>,

    lexicon: SharedLexicon,
    reader: Option<FramedRead<ReadHalf<T>, PsxLineCodec>>,
    sender: Option<LineSender<T>>,
}

impl Connection<TcpStream> {
    /// Create a TCP connection for `server` (`host:port`), reporting
    /// itself as `client_name`
    pub fn new(server: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self::with_config(ConnectionConfig::new(server, client_name))
    }

    /// Resolve and dial the configured server.
    ///
    /// Does nothing when already connected. Fails with
    /// [`PsxError::ConnectionBusy`] while a previous session has not
    /// fully wound down.
    pub async fn connect(&mut self) -> Result<(), PsxError> {
        if self.is_connected() {
            return Ok(());
        }
        if !self.phase.can_connect() {
            return Err(PsxError::ConnectionBusy);
        }
        self.config.validate()?;

        let stream = TcpStream::connect(self.config.server.as_str()).await?;
        stream.set_nodelay(self.config.no_delay)?;
        info!("Connected to PSX server {}", self.config.server);

        self.attach(stream)
    }
}

impl<T> Connection<T> {
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            hooks: HashMap::new(),
            assigned_id: None,
            version: String::new(),
            phase: Phase::Disconnected,
            subscriptions: Vec::new(),
            lexicon: lexicon::shared(),
            reader: None,
            sender: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Mutable access to the configuration. Changes take effect on the
    /// next connect; nothing is re-sent to a live server.
    pub fn config_mut(&mut self) -> &mut ConnectionConfig {
        &mut self.config
    }

    /// ID assigned by the server/router, once `id` has been received
    pub fn id(&self) -> Option<i64> {
        self.assigned_id
    }

    /// Software version reported by the server
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.sender.as_ref().is_some_and(|sender| sender.is_open())
    }

    /// Handle to the connection's lexicon
    pub fn lexicon(&self) -> SharedLexicon {
        self.lexicon.clone()
    }

    /// Request updates for `human_key` when the server reaches `load1`.
    /// Repeated names are ignored.
    pub fn subscribe(&mut self, human_key: impl Into<String>) {
        let human_key = human_key.into();
        if !self.subscriptions.contains(&human_key) {
            self.subscriptions.push(human_key);
        }
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Register `hook` for messages whose decoded key is `human_key`,
    /// replacing any hook already registered under that name
    pub fn add_hook<F>(&mut self, human_key: impl Into<String>, hook: F)
    where
        F: FnMut(&mut HookContext<'_>, &WireMsg) + Send + 'static,
    {
        self.hooks.insert(human_key.into(), Box::new(hook));
    }

    pub fn remove_hook(&mut self, human_key: &str) -> Option<MessageHook> {
        self.hooks.remove(human_key)
    }

    /// A blank message linked to this connection's lexicon
    pub fn new_wire_msg(&self) -> WireMsg {
        WireMsg::linked(&self.lexicon)
    }

    /// Build a message from a human name and value
    pub fn new_pair(&self, human_key: &str, value: impl Into<String>) -> WireMsg {
        let mut msg = self.new_wire_msg();
        msg.set_decoded_key(human_key);
        msg.set_value(value);
        msg
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("Connection phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn live_sender(&self) -> Result<LineSender<T>, PsxError> {
        self.sender.clone().ok_or(PsxError::NotConnected)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Start a session over an already established transport.
    ///
    /// Same rules as `connect`: a no-op while connected, and
    /// [`PsxError::ConnectionBusy`] until the previous listener has exited.
    /// An invalid configuration is rejected with [`PsxError::Config`].
    pub fn attach(&mut self, transport: T) -> Result<(), PsxError> {
        if self.is_connected() {
            debug!("attach ignored: already connected");
            return Ok(());
        }
        if !self.phase.can_connect() {
            return Err(PsxError::ConnectionBusy);
        }
        self.config.validate()?;

        let codec = PsxLineCodec::with_max_length(self.config.max_line_length);
        let (read_half, write_half) = tokio::io::split(transport);
        self.reader = Some(FramedRead::new(read_half, codec.clone()));
        self.sender = Some(LineSender::new(write_half, codec));
        self.assigned_id = None;
        self.version.clear();
        self.set_phase(Phase::New);
        Ok(())
    }

    /// Handle for sending from other tasks while the listener runs
    pub fn sender(&self) -> Option<LineSender<T>> {
        self.sender.clone()
    }

    pub async fn send_msg(&self, msg: &WireMsg) -> Result<(), PsxError> {
        self.live_sender()?.send(msg).await
    }

    /// Say `exit`, close the transport and allow a fresh connect
    pub async fn disconnect(&mut self) {
        self.close_transport().await;
        self.set_phase(Phase::ListenerExited);
    }

    async fn close_transport(&mut self) {
        self.reader = None;
        let Some(sender) = self.sender.take() else {
            return;
        };
        if let Err(e) = sender.close().await {
            debug!("Error while closing connection: {}", e);
        }
        info!("Disconnected from {}", self.config.server);
    }

    /// Run the read loop until the server says `exit` or the transport
    /// fails.
    ///
    /// Each line is parsed, the built-in reactions run, and then the
    /// hook registered under the line's decoded key (if any) is called
    /// inline. On return the connection has been cleaned up and may be
    /// connected again. `Ok(())` means the server ended the session.
    pub async fn listen(&mut self) -> Result<(), PsxError> {
        let mut reader = self.reader.take().ok_or(PsxError::NotConnected)?;
        info!("Listener started for {}", self.config.server);

        let result = loop {
            match reader.next().await {
                Some(Ok(line)) => match self.handle_line(&line).await {
                    Ok(true) => break Ok(()),
                    Ok(false) => {}
                    Err(e) => break Err(e),
                },
                Some(Err(e)) => break Err(e),
                None => {
                    break Err(PsxError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server closed the connection",
                    )))
                }
            }
        };

        if let Err(e) = &result {
            error!("Listener for {} failed: {}", self.config.server, e);
            self.set_phase(Phase::Failed);
        }
        drop(reader);
        self.close_transport().await;
        self.set_phase(Phase::ListenerExited);
        result
    }

    /// Built-in reactions, then dispatch. Returns `true` once the server
    /// has ended the session.
    async fn handle_line(&mut self, line: &str) -> Result<bool, PsxError> {
        debug!("Received: {}", line);
        let msg = WireMsg::parse_linked(&self.lexicon, line);
        let mut ended = false;

        match msg.key() {
            keys::ID => {
                match msg.value().parse::<i64>() {
                    Ok(id) => self.assigned_id = Some(id),
                    Err(e) => warn!("Unparsable id '{}': {}", msg.value(), e),
                }
                self.send_identity().await?;
            }
            keys::VERSION => {
                self.version = msg.value().to_string();
                info!("Server version {}", self.version);
            }
            keys::LOAD1 => {
                // subscriptions can only be resolved once the lexicon is in
                if self.phase == Phase::New {
                    self.send_notify().await?;
                }
                self.set_phase(Phase::Acquiring1);
            }
            keys::LOAD2 => self.set_phase(Phase::Acquiring2),
            keys::LOAD3 => self.set_phase(Phase::Running),
            keys::EXIT => {
                self.set_phase(Phase::Ended);
                ended = true;
            }
            key => {
                if msg.has_value() && self.phase == Phase::New && key.starts_with(LEXICON_PREFIX)
                {
                    let learned = lexicon::write(&self.lexicon).register(line);
                    if let Err(e) = learned {
                        warn!("Ignoring lexicon line '{}': {}", line, e);
                    }
                }
            }
        }

        self.dispatch(&msg).await?;
        Ok(ended)
    }

    async fn dispatch(&mut self, msg: &WireMsg) -> Result<(), PsxError> {
        let name = msg.decoded_key();
        let Some(hook) = self.hooks.get_mut(&name) else {
            return Ok(());
        };

        let mut outbox = Vec::new();
        let mut ctx = HookContext {
            assigned_id: self.assigned_id,
            version: &self.version,
            phase: self.phase,
            lexicon: &self.lexicon,
            outbox: &mut outbox,
        };
        hook(&mut ctx, msg);

        if !outbox.is_empty() {
            let sender = self.live_sender()?;
            for out in &outbox {
                sender.send(out).await?;
            }
        }
        Ok(())
    }

    async fn send_identity(&mut self) -> Result<(), PsxError> {
        let msg = self.new_pair(keys::NAME, self.config.identity());
        let sender = self.live_sender()?;
        sender.send(&msg).await
    }

    async fn send_notify(&mut self) -> Result<(), PsxError> {
        let wire_ids: Vec<String> = {
            let lex = lexicon::read(&self.lexicon);
            self.subscriptions
                .iter()
                .filter_map(|name| lex.key_for(name))
                .collect()
        };
        if wire_ids.is_empty() {
            debug!("No resolvable subscriptions, notify not sent");
            return Ok(());
        }

        let msg = self.new_pair(keys::NOTIFY, wire_ids.join(FIELD_SEPARATOR));
        let sender = self.live_sender()?;
        sender.send(&msg).await
    }
}
