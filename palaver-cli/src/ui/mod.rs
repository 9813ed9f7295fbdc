//! Input/output surfaces: bridge the session's line channels to a terminal
//! renderer or a unix-socket peer.
//!
//! The contract matches what the engine expects: every line sent on the
//! output channel gets rendered, local input lines flow into the input
//! channel, and closing the input channel is the disconnect signal that
//! signs the session off.

mod socket;
mod terminal;

use std::path::PathBuf;

use tokio::sync::mpsc;

/// The closed set of surfaces, selected once at startup.
pub enum Surface {
    Terminal(terminal::TerminalSurface),
    Socket(socket::SocketSurface),
}

impl Surface {
    /// Start the configured surface: the socket bridge when a listen path
    /// is given, the terminal renderer otherwise. Returns the surface and
    /// the output/input channel ends the session engine consumes.
    pub async fn start(
        listen: Option<PathBuf>,
    ) -> anyhow::Result<(Self, mpsc::UnboundedSender<String>, mpsc::Receiver<String>)> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::channel(64);
        let surface = match listen {
            Some(path) => {
                Self::Socket(socket::SocketSurface::start(path, output_rx, input_tx).await?)
            }
            None => Self::Terminal(terminal::TerminalSurface::start(output_rx, input_tx)?),
        };
        Ok((surface, output_tx, input_rx))
    }

    pub async fn shutdown(self) {
        match self {
            Self::Terminal(terminal) => terminal.shutdown().await,
            Self::Socket(socket) => socket.shutdown().await,
        }
    }
}
