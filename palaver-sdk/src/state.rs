//! Channel, user, and WHOIS state tracking.
//!
//! The registry is the canonical owner of every tracked [`User`]; channels
//! hold rosters of nick keys into it, never copies. A nick seen in several
//! channels resolves to the same entry, so its status marker reflects the
//! most recently processed channel context.

use std::collections::BTreeMap;

use crate::irc;

/// WHOIS detail, accumulated incrementally across the numeric family.
/// A field set by one reply is never cleared by a later reply that does not
/// carry it; only the terminal 318 ends the sequence, without mutating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisState {
    pub username: Option<String>,
    pub host: Option<String>,
    pub realname: Option<String>,
    pub server: Option<String>,
    pub server_info: Option<String>,
    pub channels: Option<String>,
    pub idle_seconds: Option<String>,
    pub signon_time: Option<String>,
    pub away_message: Option<String>,
    pub is_operator: bool,
}

/// A tracked user, keyed by bare nick in the registry.
#[derive(Debug, Clone)]
pub struct User {
    pub nick: String,
    /// `""`, `"@"` (operator) or `"+"` (voice), from the last NAMES reply
    /// that mentioned this nick.
    pub status: String,
    pub whois: Option<WhoisState>,
}

impl User {
    fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            status: String::new(),
            whois: None,
        }
    }

    fn whois_mut(&mut self) -> &mut WhoisState {
        self.whois.get_or_insert_with(WhoisState::default)
    }
}

/// A tracked channel: name (with leading `#`) plus the ordered roster of
/// nick keys. Replaced wholesale on every NAMES reply.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub name: String,
    pub users: Vec<String>,
}

/// Canonical session state: all tracked users and channels.
#[derive(Debug, Default)]
pub struct Registry {
    users: BTreeMap<String, User>,
    channels: BTreeMap<String, Channel>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user, inserting a fresh entry (empty status, no WHOIS
    /// detail) when the nick is unknown.
    pub fn find_or_create_user(&mut self, nick: &str) -> &mut User {
        self.users
            .entry(nick.to_string())
            .or_insert_with(|| User::new(nick))
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(nick)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// All tracked channel names, in registry order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Rebuild a channel roster from a NAMES (353) reply.
    ///
    /// `:server 353 nick = #general :@Alice +Bob Carl`
    ///
    /// Status prefixes are stripped into the user's status marker; the
    /// roster is a full replacement, never a merge.
    pub fn handle_name_reply(&mut self, line: &str) {
        let (head, tail) = match line.split_once(" :") {
            Some((head, tail)) => (head, Some(tail)),
            None => (line, None),
        };
        let head_tokens: Vec<&str> = head.split_whitespace().collect();
        let Some(&channel) = head_tokens.get(4) else {
            return;
        };
        let nick_tokens: Vec<&str> = match tail {
            Some(tail) => tail.split_whitespace().collect(),
            None => head_tokens[5..].to_vec(),
        };

        let mut roster = Vec::with_capacity(nick_tokens.len());
        for token in nick_tokens {
            let (status, nick) = irc::strip_status(token);
            if nick.is_empty() {
                continue;
            }
            let user = self.find_or_create_user(nick);
            user.status = status.to_string();
            roster.push(nick.to_string());
        }

        let entry = self.channels.entry(channel.to_string()).or_default();
        entry.name = channel.to_string();
        entry.users = roster;
    }

    /// Apply one WHOIS-family numeric to the target user's detail block.
    ///
    /// Each numeric sets only the fields it carries. The terminal 318
    /// mutates nothing and instead returns a summary of what accumulated,
    /// for the caller to render.
    pub fn apply_whois(&mut self, line: &str) -> Option<String> {
        let (head, tail) = match line.split_once(" :") {
            Some((head, tail)) => (head, Some(tail.to_string())),
            None => (line, None),
        };
        let tokens: Vec<&str> = head.split_whitespace().collect();
        let code = *tokens.get(1)?;
        let nick = *tokens.get(3)?;

        if code == "318" {
            return self.whois_summary(nick);
        }

        let whois = self.find_or_create_user(nick).whois_mut();
        match code {
            "301" => whois.away_message = tail,
            "311" => {
                whois.username = tokens.get(4).map(|s| s.to_string());
                whois.host = tokens.get(5).map(|s| s.to_string());
                whois.realname = tail;
            }
            "312" => {
                whois.server = tokens.get(4).map(|s| s.to_string());
                whois.server_info = tail;
            }
            "313" => whois.is_operator = true,
            "317" => {
                whois.idle_seconds = tokens.get(4).map(|s| s.to_string());
                whois.signon_time = tokens.get(5).map(|s| s.to_string());
            }
            "319" => whois.channels = tail,
            _ => {}
        }
        None
    }

    /// One-line rendering of the accumulated WHOIS detail for a nick.
    fn whois_summary(&self, nick: &str) -> Option<String> {
        let user = self.users.get(nick)?;
        let whois = user.whois.as_ref()?;
        let mut parts = Vec::new();
        if let Some(realname) = &whois.realname {
            parts.push(realname.clone());
        }
        if let (Some(username), Some(host)) = (&whois.username, &whois.host) {
            parts.push(format!("{username}@{host}"));
        }
        if let Some(server) = &whois.server {
            match &whois.server_info {
                Some(info) => parts.push(format!("server: {server} ({info})")),
                None => parts.push(format!("server: {server}")),
            }
        }
        if let Some(channels) = &whois.channels {
            parts.push(format!("channels: {channels}"));
        }
        if let Some(idle) = &whois.idle_seconds {
            parts.push(format!("idle: {idle}s"));
        }
        if let Some(signon) = &whois.signon_time {
            parts.push(format!("signon: {signon}"));
        }
        if let Some(away) = &whois.away_message {
            parts.push(format!("away: {away}"));
        }
        if whois.is_operator {
            parts.push("operator".to_string());
        }
        Some(format!(":client whois {nick} :{}", parts.join(" | ")))
    }

    /// Render `/users <channel>`: the status-prefixed roster, or an explicit
    /// not-found message.
    pub fn format_user_list(&self, channel: &str) -> String {
        let chan = irc::trim_crlf(channel);
        if chan.is_empty() {
            return ":client error :No channel specified.".to_string();
        }
        let chan = irc::hash_prefixed(chan);
        match self.channels.get(&chan) {
            Some(channel) if !channel.users.is_empty() => {
                let list = channel
                    .users
                    .iter()
                    .map(|nick| {
                        let status = self
                            .users
                            .get(nick)
                            .map(|u| u.status.as_str())
                            .unwrap_or("");
                        format!("{status}{nick}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(":client users {chan} :{list}")
            }
            _ => format!(":client error :channel {chan} not found or no users."),
        }
    }

    /// Render `/channels`: the comma-joined tracked channel names.
    pub fn format_channel_list(&self) -> String {
        let list = self.channel_names().join(", ");
        format!(":client channels :{list}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_reply_builds_roster_with_statuses() {
        let mut registry = Registry::new();
        registry.handle_name_reply(":server 353 nick = #general :@Alice +Bob Carl");

        let channel = registry.channel("#general").unwrap();
        assert_eq!(channel.users, vec!["Alice", "Bob", "Carl"]);
        assert_eq!(registry.user("Alice").unwrap().status, "@");
        assert_eq!(registry.user("Bob").unwrap().status, "+");
        assert_eq!(registry.user("Carl").unwrap().status, "");
    }

    #[test]
    fn name_reply_replaces_roster_wholesale() {
        let mut registry = Registry::new();
        registry.handle_name_reply(":server 353 nick = #general :@Alice +Bob Carl");
        registry.handle_name_reply(":server 353 nick = #general :Dana");

        let channel = registry.channel("#general").unwrap();
        assert_eq!(channel.users, vec!["Dana"]);
        // Alice is still tracked as a user, just no longer on the roster.
        assert!(registry.user("Alice").is_some());
    }

    #[test]
    fn whois_fields_accumulate_without_clearing() {
        let mut registry = Registry::new();
        let _ = registry.apply_whois(":server 311 me Alice alice host.example * :Alice A.");
        let _ = registry.apply_whois(":server 312 me Alice irc.example :Example net");
        let _ = registry.apply_whois(":server 317 me Alice 42 1700000000 :seconds idle");

        let whois = registry.user("Alice").unwrap().whois.clone().unwrap();
        assert_eq!(whois.realname.as_deref(), Some("Alice A."));
        assert_eq!(whois.username.as_deref(), Some("alice"));
        assert_eq!(whois.host.as_deref(), Some("host.example"));
        assert_eq!(whois.server.as_deref(), Some("irc.example"));
        assert_eq!(whois.idle_seconds.as_deref(), Some("42"));
        assert_eq!(whois.signon_time.as_deref(), Some("1700000000"));

        // A later reply that doesn't carry realname leaves it untouched.
        let _ = registry.apply_whois(":server 319 me Alice :#general #test");
        let whois = registry.user("Alice").unwrap().whois.clone().unwrap();
        assert_eq!(whois.realname.as_deref(), Some("Alice A."));
        assert_eq!(whois.channels.as_deref(), Some("#general #test"));
    }

    #[test]
    fn whois_terminal_reports_without_mutating() {
        let mut registry = Registry::new();
        let _ = registry.apply_whois(":server 311 me Alice alice host.example * :Alice A.");
        let _ = registry.apply_whois(":server 313 me Alice :is an IRC operator");

        let summary = registry
            .apply_whois(":server 318 me Alice :End of /WHOIS list")
            .unwrap();
        assert!(summary.starts_with(":client whois Alice :"));
        assert!(summary.contains("Alice A."));
        assert!(summary.contains("operator"));
        // Detail survives the terminal numeric.
        assert!(registry.user("Alice").unwrap().whois.is_some());
    }

    #[test]
    fn whois_terminal_without_detail_is_silent() {
        let mut registry = Registry::new();
        assert!(
            registry
                .apply_whois(":server 318 me Ghost :End of /WHOIS list")
                .is_none()
        );
    }

    #[test]
    fn user_list_formats_statuses_and_missing_channels() {
        let mut registry = Registry::new();
        registry.handle_name_reply(":server 353 nick = #general :@Alice +Bob Carl");

        assert_eq!(
            registry.format_user_list("general"),
            ":client users #general :@Alice, +Bob, Carl"
        );
        assert_eq!(
            registry.format_user_list("#nowhere"),
            ":client error :channel #nowhere not found or no users."
        );
        assert_eq!(
            registry.format_user_list(""),
            ":client error :No channel specified."
        );
    }

    #[test]
    fn channel_list_renders_in_registry_order() {
        let mut registry = Registry::new();
        assert_eq!(registry.format_channel_list(), ":client channels :");
        registry.handle_name_reply(":server 353 nick = #zeta :a");
        registry.handle_name_reply(":server 353 nick = #alpha :b");
        assert_eq!(
            registry.format_channel_list(),
            ":client channels :#alpha, #zeta"
        );
    }
}
