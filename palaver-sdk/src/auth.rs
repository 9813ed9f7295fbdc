//! Authentication strategies: NickServ IDENTIFY and SASL PLAIN.
//!
//! A strategy never blocks the dispatch loop. It works entirely by
//! attaching reactions to the event table at negotiation time and emitting
//! protocol lines as the handshake advances.
//!
//! The SASL strategy is a small irreversible state machine:
//!
//! ```text
//! Idle --CAP * LS (sasl)--> LsSeen --CAP * ACK :sasl--> Authenticating
//! Authenticating --903--> Success   (CAP END)
//! Authenticating --904..907--> Failure   (CAP END, error rendered)
//! ```
//!
//! Once `CAP END` is sent the strategy takes no further action, even if
//! stray CAP or numeric lines recur.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;

use crate::error::Result;
use crate::events::{key, reaction};
use crate::session::Session;

/// How to authenticate, chosen once at startup.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// No authentication.
    None,
    /// Fire-and-forget `PRIVMSG NickServ :IDENTIFY` once the MOTD ends.
    NickServ { password: String },
    /// IRCv3 CAP negotiation with SASL PLAIN.
    Sasl { identity: String, password: String },
}

impl AuthStrategy {
    /// Wire the strategy into the session's event table and emit whatever
    /// opens the handshake. Runs before NICK/USER registration.
    pub async fn negotiate(&self, session: &Arc<Session>) -> Result<()> {
        match self {
            AuthStrategy::None => Ok(()),
            AuthStrategy::NickServ { password } => {
                let password = password.clone();
                session.add_event_reaction(
                    key::MOTD_END,
                    reaction(move |session, _line| {
                        let password = password.clone();
                        async move {
                            session
                                .wire()
                                .send(&format!("PRIVMSG NickServ :IDENTIFY {password}"))
                                .await
                        }
                    }),
                )?;
                Ok(())
            }
            AuthStrategy::Sasl { identity, password } => {
                let negotiator = Arc::new(SaslNegotiator::new(identity, password));
                SaslNegotiator::install(&negotiator, session)?;
                session.wire().send("CAP LS 302").await
            }
        }
    }
}

/// Base64 SASL PLAIN payload: `identity\0identity\0password`.
pub fn plain_payload(identity: &str, password: &str) -> String {
    STANDARD.encode(format!("{identity}\0{identity}\0{password}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    LsSeen,
    Authenticating,
    Success,
    Failure,
}

/// Drives the CAP/SASL handshake through its reactions. No transition is
/// reversible; phase guards make repeated or stray lines no-ops.
struct SaslNegotiator {
    identity: String,
    password: String,
    phase: Mutex<Phase>,
}

const SASL_FAILURES: [(&str, &str); 4] = [
    (key::SASL_FAILED, "SASL authentication failed"),
    (key::SASL_TOO_LONG, "SASL mechanism too long"),
    (key::SASL_ABORTED, "SASL aborted"),
    (key::SASL_ALREADY, "SASL already in progress"),
];

impl SaslNegotiator {
    fn new(identity: &str, password: &str) -> Self {
        Self {
            identity: identity.to_string(),
            password: password.to_string(),
            phase: Mutex::new(Phase::Idle),
        }
    }

    fn install(this: &Arc<Self>, session: &Arc<Session>) -> Result<()> {
        let negotiator = Arc::clone(this);
        session.add_event_reaction(
            key::CAP,
            reaction(move |session, line| {
                let negotiator = negotiator.clone();
                async move { negotiator.on_cap_ls(&session, &line).await }
            }),
        )?;

        let negotiator = Arc::clone(this);
        session.add_event_reaction(
            key::CAP,
            reaction(move |session, line| {
                let negotiator = negotiator.clone();
                async move { negotiator.on_cap_ack(&session, &line).await }
            }),
        )?;

        let negotiator = Arc::clone(this);
        session.add_event_reaction(
            key::SASL_SUCCESS,
            reaction(move |session, _line| {
                let negotiator = negotiator.clone();
                async move { negotiator.on_success(&session).await }
            }),
        )?;

        for (code, message) in SASL_FAILURES {
            let negotiator = Arc::clone(this);
            session.add_event_reaction(
                code,
                reaction(move |session, _line| {
                    let negotiator = negotiator.clone();
                    async move { negotiator.on_failure(&session, code, message).await }
                }),
            )?;
        }
        Ok(())
    }

    /// `CAP * LS` advertising sasl → request the capability.
    async fn on_cap_ls(&self, session: &Arc<Session>, line: &str) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Idle {
                return Ok(());
            }
            if !(line.contains("CAP * LS") && line.contains("sasl")) {
                return Ok(());
            }
            *phase = Phase::LsSeen;
        }
        session.wire().send("CAP REQ :sasl").await
    }

    /// `CAP * ACK :sasl` → send the PLAIN payload.
    async fn on_cap_ack(&self, session: &Arc<Session>, line: &str) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::LsSeen {
                return Ok(());
            }
            let tail = line.find("CAP").map(|at| line[at..].trim_end());
            if tail != Some("CAP * ACK :sasl") {
                return Ok(());
            }
            *phase = Phase::Authenticating;
        }
        let payload = plain_payload(&self.identity, &self.password);
        session.wire().send(&format!("AUTHENTICATE {payload}")).await
    }

    /// 903 → done; release capability negotiation.
    async fn on_success(&self, session: &Arc<Session>) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Authenticating {
                return Ok(());
            }
            *phase = Phase::Success;
        }
        session.wire().send("CAP END").await
    }

    /// 904–907 → report the failure, then release negotiation anyway so
    /// registration can proceed unauthenticated.
    async fn on_failure(&self, session: &Arc<Session>, code: &str, message: &str) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Authenticating {
                return Ok(());
            }
            *phase = Phase::Failure;
        }
        let out = format!("! SASL error ({code}): {message}");
        tracing::warn!("{out}");
        session.draw(&out);
        session.wire().send("CAP END").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_payload_encodes_identity_twice() {
        let encoded = plain_payload("tester", "hunter2");
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"tester\0tester\0hunter2");
    }
}
