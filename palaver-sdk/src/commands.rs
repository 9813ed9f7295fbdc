//! Local operator command dispatch.
//!
//! Input lines from the surface are matched against a fixed-order table;
//! the first predicate that matches wins. A line matching nothing is a
//! recoverable error the input loop reports back to the surface — it does
//! not tear the session down.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::BoxFuture;
use crate::irc;
use crate::session::{DEFAULT_QUIT_MESSAGE, Session};

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Handler = Box<dyn Fn(Arc<Session>, String) -> BoxFuture + Send + Sync>;

struct CommandEntry {
    predicate: Predicate,
    handler: Handler,
}

/// Fixed-order, first-match-wins command table. Populated once at session
/// construction and immutable thereafter.
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// The built-in commands: /quit, /users, /channels, /input.
    pub fn with_builtins() -> Self {
        let mut table = Self {
            entries: Vec::new(),
        };

        table.add(
            |input| input == "/quit",
            |session, _input| {
                Box::pin(async move {
                    tracing::info!("disconnect requested");
                    let channels = session.registry().lock().channel_names();
                    session.signoff(&channels, DEFAULT_QUIT_MESSAGE).await
                })
            },
        );

        table.add(
            |input| input.starts_with("/users "),
            |session, input| {
                Box::pin(async move {
                    let channel = &input["/users ".len()..];
                    let rendered = session.registry().lock().format_user_list(channel);
                    session.draw(&rendered);
                    Ok(())
                })
            },
        );

        table.add(
            |input| input == "/channels",
            |session, _input| {
                Box::pin(async move {
                    let rendered = session.registry().lock().format_channel_list();
                    session.draw(&rendered);
                    Ok(())
                })
            },
        );

        table.add(
            |input| input.starts_with("/input "),
            |session, input| {
                Box::pin(async move {
                    let raw = irc::trim_crlf(&input["/input ".len()..]);
                    session.wire().send(raw).await
                })
            },
        );

        table
    }

    fn add<P, H>(&mut self, predicate: P, handler: H)
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        H: Fn(Arc<Session>, String) -> BoxFuture + Send + Sync + 'static,
    {
        self.entries.push(CommandEntry {
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        });
    }

    /// Index of the first entry whose predicate accepts the input.
    fn matching_index(&self, input: &str) -> Option<usize> {
        self.entries.iter().position(|e| (e.predicate)(input))
    }

    /// Run the first matching handler, or report the input as unrecognized.
    pub async fn dispatch(&self, session: &Arc<Session>, input: &str) -> Result<()> {
        match self.matching_index(input) {
            Some(index) => (self.entries[index].handler)(session.clone(), input.to_string()).await,
            None => Err(Error::UnrecognizedCommand(input.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_match_in_registration_order() {
        let table = CommandTable::with_builtins();
        assert_eq!(table.matching_index("/quit"), Some(0));
        assert_eq!(table.matching_index("/users general"), Some(1));
        assert_eq!(table.matching_index("/channels"), Some(2));
        assert_eq!(table.matching_index("/input WHOIS Alice"), Some(3));
    }

    #[test]
    fn near_misses_do_not_match() {
        let table = CommandTable::with_builtins();
        // Exact-match commands reject trailing arguments; prefix commands
        // require their trailing space.
        assert_eq!(table.matching_index("/quit now"), None);
        assert_eq!(table.matching_index("/users"), None);
        assert_eq!(table.matching_index("/channels #x"), None);
        assert_eq!(table.matching_index("/input"), None);
        assert_eq!(table.matching_index("hello"), None);
    }
}
