//! Poll registry
//!
//! An explicitly owned store mapping poll ids to poll aggregates. The
//! registry is constructed once at process start and threaded into
//! every handler, so tests get isolation by simply building a fresh
//! one. Polls are never deleted; they live for the process lifetime.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::{poll::Poll, poll_id::PollId};

/// Errors that can occur when resolving a poll
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The poll id is unknown; a normal outcome, surfaced to the
    /// initiating connection rather than treated as internal failure
    #[error("poll not found")]
    PollNotFound,
}

/// The owned mapping from poll id to poll
#[derive(Default)]
pub struct Registry {
    polls: HashMap<PollId, Poll>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a poll and returns its freshly generated id
    ///
    /// Never fails. A missing title falls back to the default.
    pub fn create_poll(&mut self, title: Option<String>) -> PollId {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| crate::constants::poll::DEFAULT_TITLE.to_string());

        // ids are drawn from a small space; skip the rare collision
        let mut poll_id = PollId::new();
        while self.polls.contains_key(&poll_id) {
            poll_id = PollId::new();
        }

        self.polls.insert(poll_id, Poll::new(poll_id, title));
        poll_id
    }

    /// Looks up a poll
    ///
    /// # Errors
    ///
    /// Returns `Error::PollNotFound` for an unknown id.
    pub fn get(&self, poll_id: PollId) -> Result<&Poll, Error> {
        self.polls.get(&poll_id).ok_or(Error::PollNotFound)
    }

    /// Looks up a poll for mutation
    ///
    /// # Errors
    ///
    /// Returns `Error::PollNotFound` for an unknown id.
    pub fn get_mut(&mut self, poll_id: PollId) -> Result<&mut Poll, Error> {
        self.polls.get_mut(&poll_id).ok_or(Error::PollNotFound)
    }

    /// Iterates over every poll for mutation
    ///
    /// Used by the disconnect sweep, which must visit every roster.
    pub fn polls_mut(&mut self) -> impl Iterator<Item = &mut Poll> {
        self.polls.values_mut()
    }

    /// Number of polls in the registry
    pub fn len(&self) -> usize {
        self.polls.len()
    }

    /// Whether the registry holds no polls
    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}
