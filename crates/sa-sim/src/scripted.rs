//! Scripted transport
//!
//! Replies come from a table keyed by the exact query text. A query with
//! several scripted replies returns them in order and then repeats the last
//! one, which is how "not yet valid, not yet valid, valid" sequences are
//! expressed. Every command written is kept for later inspection.

use std::collections::{HashMap, VecDeque};

use sa_protocol::{LinkSettings, Transport, TransportError};
use tracing::trace;

/// Transport that answers from a fixed script
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, VecDeque<String>>,
    binary: VecDeque<Vec<u8>>,
    polls: VecDeque<u8>,
    sent: Vec<String>,
    pending: Option<String>,
    strict: bool,
    open: bool,
    went_local: bool,
}

impl ScriptedTransport {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `reply`
    pub fn reply(mut self, query: &str, reply: &str) -> Self {
        self.replies
            .insert(query.to_string(), VecDeque::from([reply.to_string()]));
        self
    }

    /// Answer successive `query`s with `replies`, repeating the last one
    pub fn replies(mut self, query: &str, replies: &[&str]) -> Self {
        self.replies.insert(
            query.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    /// Queue a binary reply for the next binary read
    pub fn binary(mut self, data: Vec<u8>) -> Self {
        self.binary.push_back(data);
        self
    }

    /// Queue serial-poll status bytes; the last one repeats
    pub fn polls(mut self, status: &[u8]) -> Self {
        self.polls.extend(status);
        self
    }

    /// Time out on unscripted queries instead of answering with an empty line
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Every command written, in order
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Commands written that end in `?`
    pub fn queries(&self) -> Vec<&str> {
        self.sent
            .iter()
            .map(String::as_str)
            .filter(|c| c.trim_end().ends_with('?'))
            .collect()
    }

    /// Whether `command` was written at least once
    pub fn was_sent(&self, command: &str) -> bool {
        self.sent.iter().any(|c| c == command)
    }

    /// Whether the link is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the last close returned the instrument to local control
    pub fn went_local(&self) -> bool {
        self.went_local
    }

    fn next_reply(&mut self, query: &str) -> Option<String> {
        let queue = self.replies.get_mut(query)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, _settings: &LinkSettings) -> Result<(), TransportError> {
        self.open = true;
        self.went_local = false;
        Ok(())
    }

    fn close(&mut self, go_to_local: bool) {
        self.open = false;
        self.went_local = go_to_local;
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        trace!("script <- {}", command);
        self.sent.push(command.to_string());

        self.pending = match self.next_reply(command) {
            Some(reply) => Some(reply),
            None if command.trim_end().ends_with('?') && !self.strict => Some(String::new()),
            None => None,
        };
        Ok(())
    }

    fn read_ascii(&mut self, _max_len: usize) -> Result<String, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.pending
            .take()
            .map(|reply| format!("{}\n", reply))
            .ok_or_else(|| TransportError::Timeout("read".into()))
    }

    fn read_binary(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.pending = None;
        let mut data = self
            .binary
            .pop_front()
            .ok_or_else(|| TransportError::Timeout("binary read".into()))?;
        data.truncate(max_len);
        Ok(data)
    }

    fn serial_poll(&mut self) -> Result<u8, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let status = if self.polls.len() > 1 {
            self.polls.pop_front()
        } else {
            self.polls.front().copied()
        };
        Ok(status.unwrap_or(0))
    }
}
