//! palaver-sdk: a headless IRC session engine.
//!
//! One session drives one connection: transport establishment (plain or
//! TLS), IRC registration, optional SASL/NickServ authentication, and
//! channel/user/WHOIS state tracking from server replies, bridged to a
//! line-oriented local surface.
//!
//! The engine runs two concurrent loops — one reading the transport, one
//! reading local input — that share the session state and shut down through
//! a single race-free signoff path. Protocol lines are routed through an
//! append-only predicate → reactions table ([`events::DispatchTable`]);
//! authentication strategies ([`auth::AuthStrategy`]) participate purely by
//! attaching reactions and emitting lines.
//!
//! ```rust,no_run
//! use palaver_sdk::auth::AuthStrategy;
//! use palaver_sdk::session::{Session, SessionConfig};
//! use palaver_sdk::transport::{establish_connection, ConnectConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> palaver_sdk::error::Result<()> {
//! let conn = establish_connection(&ConnectConfig {
//!     host: "irc.example.net".into(),
//!     port: 6697,
//!     ..Default::default()
//! })
//! .await?;
//!
//! let (surface_tx, _surface_rx) = mpsc::unbounded_channel();
//! let (_input_tx, input_rx) = mpsc::channel(64);
//! let config = SessionConfig {
//!     nick: "palaver".into(),
//!     user: "palaver".into(),
//!     realname: "palaver".into(),
//!     channels: vec!["#general".into()],
//! };
//! let (session, reader) = Session::new(conn, config, surface_tx);
//! session.run(AuthStrategy::None, reader, input_rx).await
//! # }
//! ```

pub mod auth;
pub mod commands;
pub mod error;
pub mod events;
pub mod irc;
pub mod session;
pub mod state;
pub mod transport;

pub use error::Error;
pub use session::{DEFAULT_QUIT_MESSAGE, Session, SessionConfig};
