//! Single-client unix-socket bridge.
//!
//! Binds the configured path, accepts exactly one client, and relays lines
//! both ways: session output to the client, client lines into the session.
//! The client disconnecting closes the input channel, which signs the
//! session off.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct SocketSurface {
    path: PathBuf,
    relay: JoinHandle<()>,
}

impl SocketSurface {
    pub async fn start(
        path: PathBuf,
        mut output_rx: mpsc::UnboundedReceiver<String>,
        input_tx: mpsc::Sender<String>,
    ) -> anyhow::Result<Self> {
        // A stale socket file from a previous run would make bind fail.
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)?;
        tracing::info!("waiting for socket client: {}", path.display());

        let relay = tokio::spawn(async move {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::error!("socket accept failed: {e}");
                    return;
                }
            };
            tracing::info!("client connected to socket");

            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            loop {
                tokio::select! {
                    output = output_rx.recv() => match output {
                        Some(line) => {
                            if write_half.write_all(line.as_bytes()).await.is_err()
                                || write_half.write_all(b"\n").await.is_err()
                            {
                                break;
                            }
                        }
                        // Session ended; nothing left to relay.
                        None => break,
                    },
                    input = lines.next_line() => match input {
                        Ok(Some(line)) => {
                            if input_tx.send(line).await.is_err() {
                                break;
                            }
                        }
                        // EOF or error: dropping input_tx signs the
                        // session off.
                        _ => {
                            tracing::info!("socket client disconnected");
                            break;
                        }
                    },
                }
            }
        });

        Ok(Self { path, relay })
    }

    pub async fn shutdown(self) {
        self.relay.abort();
        let _ = self.relay.await;
        let _ = std::fs::remove_file(&self.path);
    }
}
