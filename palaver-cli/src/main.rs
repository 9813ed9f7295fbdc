//! palaver: a terminal/headless IRC client.
//!
//! Wires the pieces together: parse options, set up logging, pick the
//! surface (terminal renderer or unix-socket bridge), establish the
//! transport, and run the session to completion.

mod cli;
mod logging;
mod ui;

use anyhow::Context;
use clap::Parser;

use palaver_sdk::auth::AuthStrategy;
use palaver_sdk::session::{Session, SessionConfig};
use palaver_sdk::transport::{ConnectConfig, establish_connection};

use crate::cli::Cli;
use crate::ui::Surface;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let instance = args.instance.clone().unwrap_or_else(new_instance_id);
    let log_path = args.log.join(format!("palaver-{instance}.log"));
    // In terminal mode the TUI owns the tty; logs go to the file only.
    let console_logs = args.listen.is_some();
    logging::init(&log_path, console_logs)?;

    tracing::info!(
        instance = %instance,
        server = %args.server,
        port = args.port,
        "starting palaver"
    );

    let auth = if args.sasl {
        let password = args
            .password
            .clone()
            .context("--sasl requires --password")?;
        AuthStrategy::Sasl {
            identity: args.nick.clone(),
            password,
        }
    } else if let Some(password) = args.password.clone() {
        AuthStrategy::NickServ { password }
    } else {
        AuthStrategy::None
    };

    // Connect before the surface starts so failures land on stderr.
    let conn = establish_connection(&ConnectConfig {
        host: args.server.clone(),
        port: args.port,
        tls: args.tls,
        tls_verify: args.tls_verify,
    })
    .await?;
    tracing::info!(tls = conn.is_tls(), "connected");

    let (surface, surface_tx, input_rx) = Surface::start(args.listen.clone()).await?;

    let config = SessionConfig {
        nick: args.nick.clone(),
        user: args.nick.clone(),
        realname: args.realname.clone().unwrap_or_else(|| args.nick.clone()),
        channels: args.channel_list(),
    };
    let (session, reader) = Session::new(conn, config, surface_tx);
    let result = session.run(auth, reader, input_rx).await;

    surface.shutdown().await;
    result.map_err(Into::into)
}

fn new_instance_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
