//! Protocol-line event dispatch: predicates, reaction lists, and the
//! built-in reactions.
//!
//! Each received line is matched against the table in registration order;
//! the first predicate that matches consumes the line and every reaction
//! registered under that key runs, in registration order. Lines matching no
//! predicate are dropped silently — that is normal, not an error.
//!
//! Keys and predicates are registered once, during session construction;
//! auth negotiation attaches additional reactions to existing keys. The
//! table is append-only for the lifetime of the session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::session::Session;

/// Symbolic event keys.
pub mod key {
    pub const PING: &str = "PING";
    pub const NAME_REPLY: &str = "RPL_NAMEREPLY";
    pub const MOTD_END: &str = "MOTD_END";
    pub const PRIVMSG: &str = "PRIVMSG";
    pub const CAP: &str = "CAP";
    pub const WHOIS: &str = "WHOIS";
    pub const SASL_SUCCESS: &str = "903";
    pub const SASL_FAILED: &str = "904";
    pub const SASL_TOO_LONG: &str = "905";
    pub const SASL_ABORTED: &str = "906";
    pub const SASL_ALREADY: &str = "907";
}

pub type BoxFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
pub type Reaction = Arc<dyn Fn(Arc<Session>, String) -> BoxFuture + Send + Sync>;

/// Wrap an async closure as a [`Reaction`].
pub fn reaction<F, Fut>(f: F) -> Reaction
where
    F: Fn(Arc<Session>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |session, line| Box::pin(f(session, line)))
}

struct EventHandler {
    key: &'static str,
    predicate: Predicate,
    reactions: Vec<Reaction>,
}

/// Ordered predicate → reactions table. A line matches at most one key.
#[derive(Default)]
pub struct DispatchTable {
    entries: Vec<EventHandler>,
}

impl DispatchTable {
    /// Register an event key with its predicate and no reactions yet.
    pub fn register(&mut self, key: &'static str, predicate: Predicate) {
        self.entries.push(EventHandler {
            key,
            predicate,
            reactions: Vec::new(),
        });
    }

    /// Append a reaction to an already-registered key.
    pub fn add_reaction(&mut self, key: &str, reaction: Reaction) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.key == key)
            .ok_or_else(|| Error::UnknownEventKey(key.to_string()))?;
        entry.reactions.push(reaction);
        Ok(())
    }

    /// Match a line against the table: the key and reaction list of the
    /// first predicate that accepts it.
    pub fn match_line(&self, line: &str) -> Option<(&'static str, Vec<Reaction>)> {
        self.entries
            .iter()
            .find(|e| (e.predicate)(line))
            .map(|e| (e.key, e.reactions.clone()))
    }
}

/// Register the canonical event keys and predicates. Reactions are attached
/// separately, during session construction and auth negotiation.
///
/// The MOTD-end predicate is self-disabling: once the startup channels are
/// joined it never matches again.
pub(crate) fn register_keys(table: &mut DispatchTable, joined: Arc<AtomicBool>) {
    table.register(key::PING, Box::new(|line| line.starts_with("PING ")));
    table.register(
        key::NAME_REPLY,
        Box::new(|line| line.contains(" 353 ")),
    );
    table.register(
        key::MOTD_END,
        Box::new(move |line| {
            !joined.load(Ordering::SeqCst) && (line.contains("376") || line.contains("422"))
        }),
    );
    table.register(
        key::PRIVMSG,
        Box::new(|line| line.contains(" PRIVMSG ")),
    );
    table.register(
        key::CAP,
        Box::new(|line| line.contains(" CAP ") || line.starts_with("CAP ")),
    );
    table.register(
        key::WHOIS,
        Box::new(|line| {
            [" 301 ", " 311 ", " 312 ", " 313 ", " 317 ", " 318 ", " 319 "]
                .iter()
                .any(|needle| line.contains(needle))
        }),
    );
    for code in [
        key::SASL_SUCCESS,
        key::SASL_FAILED,
        key::SASL_TOO_LONG,
        key::SASL_ABORTED,
        key::SASL_ALREADY,
    ] {
        let needle = format!(" {code} ");
        table.register(code, Box::new(move |line| line.contains(needle.as_str())));
    }
}

/// Attach the built-in reactions: PONG replies, NAMES roster rebuilds,
/// startup JOINs on MOTD end, and WHOIS accumulation.
pub(crate) fn register_core_reactions(table: &mut DispatchTable) {
    table
        .add_reaction(
            key::PING,
            reaction(|session, line| async move {
                let payload = line
                    .split_once(':')
                    .map(|(_, payload)| payload)
                    .unwrap_or_else(|| line.strip_prefix("PING ").unwrap_or(""));
                let payload = crate::irc::trim_crlf(payload);
                session.wire().send(&format!("PONG :{payload}")).await
            }),
        )
        .expect("PING key registered");

    table
        .add_reaction(
            key::NAME_REPLY,
            reaction(|session, line| async move {
                session.registry().lock().handle_name_reply(&line);
                Ok(())
            }),
        )
        .expect("NAMES key registered");

    table
        .add_reaction(
            key::MOTD_END,
            reaction(|session, _line| async move { session.join_startup_channels().await }),
        )
        .expect("MOTD_END key registered");

    table
        .add_reaction(
            key::PRIVMSG,
            reaction(|_session, line| async move {
                tracing::debug!("privmsg: {line}");
                Ok(())
            }),
        )
        .expect("PRIVMSG key registered");

    table
        .add_reaction(
            key::WHOIS,
            reaction(|session, line| async move {
                let summary = session.registry().lock().apply_whois(&line);
                if let Some(summary) = summary {
                    session.draw(&summary);
                }
                Ok(())
            }),
        )
        .expect("WHOIS key registered");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_keys() -> DispatchTable {
        let mut table = DispatchTable::default();
        register_keys(&mut table, Arc::new(AtomicBool::new(false)));
        table
    }

    #[test]
    fn first_matching_key_wins() {
        let table = table_with_keys();
        // A PING line also containing " PRIVMSG " still dispatches as PING.
        let (key, _) = table.match_line("PING :x PRIVMSG y").unwrap();
        assert_eq!(key, key::PING);
    }

    #[test]
    fn unmatched_lines_are_dropped() {
        let table = table_with_keys();
        assert!(table.match_line(":server 001 nick :Welcome").is_none());
    }

    #[test]
    fn motd_end_predicate_self_disables() {
        let joined = Arc::new(AtomicBool::new(false));
        let mut table = DispatchTable::default();
        register_keys(&mut table, joined.clone());

        let line = ":server 376 nick :End of /MOTD command";
        assert_eq!(table.match_line(line).unwrap().0, key::MOTD_END);
        joined.store(true, Ordering::SeqCst);
        assert!(table.match_line(line).is_none());
    }

    #[test]
    fn sasl_numerics_have_individual_keys() {
        let table = table_with_keys();
        let (key, _) = table
            .match_line(":server 904 nick :SASL authentication failed")
            .unwrap();
        assert_eq!(key, key::SASL_FAILED);
    }

    #[test]
    fn cap_matches_with_and_without_prefix() {
        let table = table_with_keys();
        assert_eq!(
            table.match_line(":server CAP * LS :sasl").unwrap().0,
            key::CAP
        );
        assert_eq!(table.match_line("CAP * ACK :sasl").unwrap().0, key::CAP);
    }

    #[test]
    fn reactions_require_registered_keys() {
        let mut table = DispatchTable::default();
        let result = table.add_reaction(
            "NOPE",
            reaction(|_s, _l| async move { Ok(()) }),
        );
        assert!(matches!(result, Err(Error::UnknownEventKey(_))));
    }
}
