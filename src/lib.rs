//! # Classpoll Library
//!
//! This library provides the core coordination logic for a real-time
//! classroom polling system. A teacher creates a poll, attaches
//! multiple-choice questions, and runs them live against a roster of
//! students; answers are tallied per question and result percentages
//! are broadcast when a question's countdown elapses or the teacher
//! ends the poll early.
//!
//! The library is transport-agnostic: clients are reached through the
//! [`session::Tunnel`] trait, countdown timers are delegated to the
//! host process through `schedule_alarm` closures, and all persistent
//! state lives in the [`registry::Registry`] owned by the
//! [`coordinator::Coordinator`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod coordinator;
pub mod poll;
pub mod poll_id;
pub mod question;
pub mod registry;
pub mod roster;
pub mod session;

/// Messages sent to update clients' local view of a poll
///
/// Every outbound message, whether a room broadcast or a directed
/// notice, is one of these; the transport layer serializes them onto
/// whatever wire it manages.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Session-level messages: poll summaries and relayed chat
    Session(coordinator::UpdateMessage),
    /// Question lifecycle messages: started notices and results
    Question(question::UpdateMessage),
    /// Roster messages: participants snapshots, join acks, kick notices
    Roster(roster::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events
///
/// The coordinator hands these to the host process for delayed
/// delivery; when the delay elapses the host passes the message back
/// through [`coordinator::Coordinator::receive_alarm`].
#[derive(Debug, Clone, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Question countdown expiries
    Question(question::AlarmMessage),
}
