//! Scripted transport for tests.
//!
//! Records every batch it receives and answers from a queue of canned
//! replies. Clones share the same state, so a test can keep a handle while
//! a [`Client`](crate::Client) owns another.

use crate::error::{Error, Result};
use crate::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
enum Reply {
    Output(String),
    Transport(String),
    Connection(String),
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<Reply>,
    batches: Vec<String>,
}

/// In-memory transport with canned replies.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Create a mock that answers every batch with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(&self, output: impl Into<String>) -> &Self {
        self.push(Reply::Output(output.into()))
    }

    /// Queue a rejected batch.
    pub fn fail_next(&self, message: impl Into<String>) -> &Self {
        self.push(Reply::Transport(message.into()))
    }

    /// Queue an unreachable-platform failure.
    pub fn disconnect_next(&self, message: impl Into<String>) -> &Self {
        self.push(Reply::Connection(message.into()))
    }

    /// Batches received so far, in order.
    pub fn batches(&self) -> Vec<String> {
        self.lock().batches.clone()
    }

    fn push(&self, reply: Reply) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn execute(&self, commands: &str) -> Result<String> {
        let mut state = self.lock();
        state.batches.push(commands.to_string());
        match state.replies.pop_front() {
            None => Ok(String::new()),
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Transport(message)) => Err(Error::Transport {
                message,
                batch: commands.to_string(),
            }),
            Some(Reply::Connection(message)) => Err(Error::Connection { message }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_in_order_and_records_batches() {
        let mock = MockTransport::new();
        mock.reply("one").fail_next("nope");
        let handle = mock.clone();

        assert_eq!(mock.execute("a;").unwrap(), "one");
        assert!(matches!(mock.execute("b;"), Err(Error::Transport { .. })));
        assert_eq!(mock.execute("c;").unwrap(), "");
        assert_eq!(handle.batches(), ["a;", "b;", "c;"]);
    }
}
