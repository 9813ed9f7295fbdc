//! The session engine: composes transport, event dispatch, state, and auth,
//! owns the two concurrent loops, and owns the shutdown protocol.
//!
//! One loop reads the transport and dispatches protocol lines; the other
//! reads local input lines from the surface and dispatches commands. They
//! communicate only through the shared session state (guarded registries,
//! atomic flags) and the wire. Both loops are joined before the session is
//! considered closed.
//!
//! Shutdown can start from either side — `/quit`, surface disconnect, or
//! peer EOF — and always funnels through [`Session::signoff`] /
//! [`Session::stop`]. `stop` is idempotent and callable from either loop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthStrategy;
use crate::commands::CommandTable;
use crate::error::{Error, Result};
use crate::events::{self, DispatchTable, Reaction};
use crate::irc::{self, LineFramer};
use crate::state::Registry;
use crate::transport::{EstablishedConnection, Reader, Wire};

/// Quit message sent when no explicit one is given.
pub const DEFAULT_QUIT_MESSAGE: &str = "palaver terminal client";

/// Session parameters beyond the transport address.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub nick: String,
    /// Username for `USER` registration; conventionally the nick.
    pub user: String,
    pub realname: String,
    /// Channels requested at startup, joined when the MOTD ends.
    pub channels: Vec<String>,
}

/// One IRC session over one connection.
pub struct Session {
    config: SessionConfig,
    tls: bool,
    wire: Wire,
    running: AtomicBool,
    /// Startup channels joined; also disables the MOTD-end predicate.
    joined: Arc<AtomicBool>,
    shutdown: CancellationToken,
    registry: Mutex<Registry>,
    events: RwLock<DispatchTable>,
    commands: CommandTable,
    surface_tx: mpsc::UnboundedSender<String>,
}

impl Session {
    /// Build a session over an established connection. Returns the session
    /// and the read half the network loop will own.
    ///
    /// `surface_tx` receives every line the surface should render: raw
    /// protocol lines and local `:client …` output.
    pub fn new(
        conn: EstablishedConnection,
        config: SessionConfig,
        surface_tx: mpsc::UnboundedSender<String>,
    ) -> (Arc<Self>, Reader) {
        let tls = conn.is_tls();
        let (reader, writer) = conn.split();

        let joined = Arc::new(AtomicBool::new(false));
        let mut table = DispatchTable::default();
        events::register_keys(&mut table, Arc::clone(&joined));
        events::register_core_reactions(&mut table);

        let session = Arc::new(Self {
            config,
            tls,
            wire: Wire::new(writer),
            running: AtomicBool::new(true),
            joined,
            shutdown: CancellationToken::new(),
            registry: Mutex::new(Registry::new()),
            events: RwLock::new(table),
            commands: CommandTable::with_builtins(),
            surface_tx,
        });
        (session, reader)
    }

    pub fn wire(&self) -> &Wire {
        &self.wire
    }

    pub fn registry(&self) -> &Mutex<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// Queue a line for the surface to render. Best effort: a gone surface
    /// is not an error.
    pub fn draw(&self, line: &str) {
        let _ = self.surface_tx.send(line.to_string());
    }

    /// Append a reaction to an already-registered event key. Setup-time
    /// only; the table is read-only once the loops run.
    pub fn add_event_reaction(&self, key: &str, reaction: Reaction) -> Result<()> {
        self.events.write().add_reaction(key, reaction)
    }

    /// Send the registration pair.
    pub async fn register(&self) -> Result<()> {
        self.wire.send(&format!("NICK {}", self.config.nick)).await?;
        self.wire
            .send(&format!(
                "USER {} 0 * :{}",
                self.config.user, self.config.realname
            ))
            .await
    }

    /// Join every startup-requested channel and flip the joined flag. The
    /// MOTD-end predicate self-disables on the flag, so repeats are no-ops.
    pub(crate) async fn join_startup_channels(&self) -> Result<()> {
        for channel in &self.config.channels {
            self.wire
                .send(&format!("JOIN {}", irc::hash_prefixed(channel)))
                .await?;
        }
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Part every given channel, quit, and stop. The stop happens whether
    /// or not the farewell lines could still be written.
    pub async fn signoff(&self, channels: &[String], quit_message: &str) -> Result<()> {
        let mut result = Ok(());
        for channel in channels {
            result = self
                .wire
                .send(&format!("PART {} :Bye bye", irc::hash_prefixed(channel)))
                .await;
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            result = self.wire.send(&format!("QUIT :{quit_message}")).await;
        }
        self.stop().await;
        result
    }

    /// Stop the session: clear the flags, close the wire, wake both loops.
    /// Safe to call more than once and from either loop.
    pub async fn stop(&self) {
        self.joined.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.wire.close().await;
        self.shutdown.cancel();
    }

    /// Drive the session to completion: negotiate auth, register, then run
    /// the network and input loops and join both.
    pub async fn run(
        self: Arc<Self>,
        auth: AuthStrategy,
        reader: Reader,
        input_rx: mpsc::Receiver<String>,
    ) -> Result<()> {
        auth.negotiate(&self).await?;
        self.register().await?;

        let network = tokio::spawn(Arc::clone(&self).network_loop(reader));
        let input = tokio::spawn(Arc::clone(&self).input_loop(input_rx));
        let (network, input) = tokio::join!(network, input);
        network.map_err(io::Error::other)??;
        input.map_err(io::Error::other)??;
        tracing::debug!("session closed");
        Ok(())
    }

    /// Read transport bytes, frame them into lines, dispatch each line.
    /// Unblocks on peer close or on `stop()` cancelling the session.
    async fn network_loop(self: Arc<Self>, mut reader: Reader) -> Result<()> {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; 1024];
        loop {
            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(n) => n,
                        Err(e) => {
                            tracing::debug!("transport read failed: {e}");
                            0
                        }
                    };
                    if n == 0 {
                        // Peer-initiated disconnect is a normal shutdown
                        // trigger, not an error.
                        let channels = self.registry.lock().channel_names();
                        if let Err(e) = self.signoff(&channels, DEFAULT_QUIT_MESSAGE).await {
                            tracing::debug!("signoff after peer disconnect: {e}");
                        }
                        break;
                    }
                    framer.push(&buf[..n]);
                    while let Some(line) = framer.next_line() {
                        handle_line(&self, &line).await;
                    }
                }
            }
        }
        tracing::info!("Disconnected.");
        self.draw("Disconnected.");
        self.stop().await;
        Ok(())
    }

    /// Read local input lines from the surface and dispatch commands.
    /// A closed channel or an empty line is the surface's disconnect
    /// signal and signs the session off.
    async fn input_loop(self: Arc<Self>, mut input_rx: mpsc::Receiver<String>) -> Result<()> {
        loop {
            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = input_rx.recv() => {
                    let Some(raw) = received else {
                        self.surface_disconnect().await;
                        break;
                    };
                    let input = irc::trim_crlf(&raw).to_string();
                    if input.is_empty() {
                        self.surface_disconnect().await;
                        break;
                    }
                    match self.commands.dispatch(&self, &input).await {
                        Ok(()) => {}
                        Err(Error::UnrecognizedCommand(_)) => {
                            // Recoverable: report to the surface, keep going.
                            let rendered =
                                format!(":client error :Unrecognized command: \"{input}\"");
                            tracing::warn!("{rendered}");
                            self.draw(&rendered);
                        }
                        Err(e) => {
                            // Usually a dead wire; end the session through
                            // the normal stop path, never the process.
                            tracing::error!("input command failed: {e}");
                            self.stop().await;
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn surface_disconnect(&self) {
        tracing::info!("input surface disconnected");
        let channels = self.registry.lock().channel_names();
        if let Err(e) = self.signoff(&channels, DEFAULT_QUIT_MESSAGE).await {
            tracing::debug!("signoff after surface disconnect: {e}");
        }
    }
}

/// Log, render, then dispatch one framed protocol line. Reactions run in
/// registration order; a failing reaction (e.g. a PONG write against a
/// closing wire) is logged and the loop keeps running.
async fn handle_line(session: &Arc<Session>, line: &str) {
    tracing::info!("{line}");
    session.draw(line);
    let matched = session.events.read().match_line(line);
    let Some((key, reactions)) = matched else {
        return;
    };
    for reaction in reactions {
        if let Err(e) = reaction(Arc::clone(session), line.to_string()).await {
            tracing::warn!("{key} reaction failed: {e}");
        }
    }
}
