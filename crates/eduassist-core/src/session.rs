//! Session-scoped conversation state
//!
//! A `Session` is created empty for each interactive run and dropped with it.
//! It owns the transcript and keeps USER/ASSISTANT turns paired: every
//! accepted submission eventually appends exactly one assistant turn, whether
//! the call succeeded, failed or was cancelled.

use crate::gateway::{Completion, CompletionError, CompletionGateway};
use crate::state::Turn;
use crate::transcript::Transcript;

/// A submitted question waiting for its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCompletion {
    pub id: u64,
    /// Transcript as it was before the question was appended
    pub history: Vec<Turn>,
    pub message: String,
}

impl PendingCompletion {
    pub async fn run(&self, gateway: &CompletionGateway) -> Completion {
        gateway.complete(&self.history, &self.message).await
    }
}

pub struct Session {
    transcript: Transcript,
    gateway: CompletionGateway,
    pending: Option<u64>,
    next_id: u64,
}

impl Session {
    pub fn new(gateway: CompletionGateway) -> Self {
        Self {
            transcript: Transcript::new(),
            gateway,
            pending: None,
            next_id: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn gateway(&self) -> &CompletionGateway {
        &self.gateway
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the user's question and hand back what must be sent.
    ///
    /// Returns `None` (and changes nothing) for a blank message or while
    /// another request is still outstanding.
    pub fn begin(&mut self, message: &str) -> Option<PendingCompletion> {
        if message.trim().is_empty() || self.pending.is_some() {
            return None;
        }

        let history = self.transcript.all().to_vec();
        self.transcript.append(Turn::user(message));

        let id = self.next_id;
        self.next_id += 1;
        self.pending = Some(id);

        Some(PendingCompletion {
            id,
            history,
            message: message.to_string(),
        })
    }

    /// Append the reply for request `id`. Stale ids are ignored; returns whether it was applied.
    pub fn finish(&mut self, id: u64, completion: &Completion) -> bool {
        if self.pending != Some(id) {
            log::debug!("Ignoring stale completion {}", id);
            return false;
        }
        self.pending = None;
        self.transcript.append(Turn::assistant(reply_text(completion)));
        true
    }

    /// Give up on the outstanding request, if any
    pub fn cancel(&mut self) -> bool {
        match self.pending {
            Some(id) => self.finish(id, &Err(CompletionError::Cancelled)),
            None => false,
        }
    }

    /// Send `message` and wait for the reply
    pub async fn submit(&mut self, message: &str) -> Option<Completion> {
        let pending = self.begin(message)?;
        let completion = pending.run(&self.gateway).await;
        self.finish(pending.id, &completion);
        Some(completion)
    }
}

/// What the assistant turn says for a given outcome
pub fn reply_text(completion: &Completion) -> String {
    match completion {
        Ok(text) => text.clone(),
        Err(e) => format!("Error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials, GatewayConfig};
    use crate::state::Role;

    fn session() -> Session {
        let config = Config {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..Config::default()
        };
        let gateway =
            CompletionGateway::new(GatewayConfig::resolve(&config, Credentials::new("a", "b")).unwrap());
        Session::new(gateway)
    }

    #[test]
    fn blank_messages_are_rejected() {
        let mut session = session();
        assert!(session.begin("").is_none());
        assert!(session.begin("   ").is_none());
        assert!(session.transcript().is_empty());
        assert!(!session.is_pending());
    }

    #[test]
    fn begin_snapshots_history_before_the_question() {
        let mut session = session();
        let first = session.begin("What is TBI?").unwrap();
        assert!(first.history.is_empty());
        assert_eq!(first.message, "What is TBI?");
        assert_eq!(session.transcript().len(), 1);
        assert!(session.finish(first.id, &Ok("- A brain injury".to_string())));

        let second = session.begin("And SCI?").unwrap();
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.history[0], Turn::user("What is TBI?"));
        assert_eq!(second.history[1], Turn::assistant("- A brain injury"));
    }

    #[test]
    fn one_request_at_a_time() {
        let mut session = session();
        let pending = session.begin("one").unwrap();
        assert!(session.begin("two").is_none());
        assert_eq!(session.transcript().len(), 1);

        session.finish(pending.id, &Ok("reply".to_string()));
        assert!(session.begin("two").is_some());
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut session = session();
        let pending = session.begin("one").unwrap();
        assert!(session.cancel());
        assert!(!session.finish(pending.id, &Ok("late reply".to_string())));

        let turns = session.transcript().all();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role(), Role::Assistant);
        assert_eq!(turns[1].message(), "Error: request cancelled");
    }

    #[test]
    fn cancel_without_pending_is_noop() {
        let mut session = session();
        assert!(!session.cancel());
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn failures_become_error_turns() {
        let mut session = session();
        let pending = session.begin("q").unwrap();
        session.finish(pending.id, &Err(CompletionError::Transport("connection refused".to_string())));
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert!(last.message().starts_with("Error: could not reach completion service"));
        assert!(!session.is_pending());
    }
}
