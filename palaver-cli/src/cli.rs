//! Command-line options.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "palaver", about = "Terminal/headless IRC client")]
pub struct Cli {
    /// Nickname.
    #[arg(long)]
    pub nick: String,

    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    pub server: String,

    /// Server port; 6697 selects TLS automatically.
    #[arg(long, default_value_t = 6667)]
    pub port: u16,

    /// Comma-separated channels to join once registration completes.
    #[arg(long, default_value = "")]
    pub channels: String,

    /// Log directory; the file name is derived from the instance id.
    #[arg(long, default_value = ".")]
    pub log: PathBuf,

    /// Unix-socket path; when set, the socket bridge replaces the
    /// terminal UI.
    #[arg(long)]
    pub listen: Option<PathBuf>,

    /// Instance id; a random 16-byte hex id when unset.
    #[arg(long)]
    pub instance: Option<String>,

    /// Authenticate with SASL PLAIN (the nick as identity, --password as
    /// password).
    #[arg(long)]
    pub sasl: bool,

    /// Real name; defaults to the nick.
    #[arg(long)]
    pub realname: Option<String>,

    /// Password for SASL or NickServ identification.
    #[arg(long, env = "PALAVER_PASSWORD")]
    pub password: Option<String>,

    /// Force TLS on a port other than 6697.
    #[arg(long)]
    pub tls: bool,

    /// Verify the server certificate instead of accepting self-signed ones.
    #[arg(long)]
    pub tls_verify: bool,
}

impl Cli {
    pub fn channel_list(&self) -> Vec<String> {
        self.channels
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
