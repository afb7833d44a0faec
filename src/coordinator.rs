//! Session coordination and event dispatch
//!
//! The coordinator is the sole writer of the poll registry. Every
//! inbound event, whether a room event, an HTTP-originated command, or
//! a countdown expiry, is handled here one at a time: the target poll
//! is resolved, the relevant aggregate is mutated, and the resulting
//! broadcasts are assembled from the authoritative state immediately
//! before sending. Countdown timers are owned by the host process; the
//! coordinator only hands out alarm messages through a `schedule_alarm`
//! closure and treats their later delivery as an ordinary event.

use std::time::Duration;

use garde::Validate;
use serde::Serialize;
use thiserror::Error;
use web_time::SystemTime;

use super::{
    poll,
    poll::PollSummary,
    poll_id::{PollId, QuestionId},
    question::{self, QuestionConfig},
    registry::{self, Registry},
    roster::{self, Role},
    session::Tunnel,
};

/// Errors surfaced to the initiating connection
///
/// None of these are fatal; a rejected operation leaves the registry
/// untouched and the transport decides how to relay the rejection.
#[derive(Error, Debug)]
pub enum Error {
    /// The poll id is unknown
    #[error(transparent)]
    Registry(#[from] registry::Error),
    /// The question id is unknown within the poll
    #[error(transparent)]
    Poll(#[from] poll::Error),
    /// The roster rejected the operation
    #[error(transparent)]
    Roster(#[from] roster::Error),
    /// The question configuration failed validation
    #[error("invalid question: {0}")]
    InvalidQuestion(#[from] garde::Report),
}

/// A chat message relayed to the room
///
/// The engine keeps no chat history; relaying is stateless.
#[derive(Debug, Serialize, Clone)]
pub struct ChatMessage {
    /// The sender's display name
    pub name: String,
    /// The message body
    pub message: String,
    /// Server-assigned timestamp
    pub time: SystemTime,
}

/// Session-level messages sent to the room
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Full poll snapshot, sent after any structural change
    PollSummary(PollSummary),
    /// A relayed chat message
    Chat(ChatMessage),
}

/// The top-level poll-session coordinator
///
/// Owns the registry and composes the roster, question lifecycle, and
/// tally logic into the event handlers of the external interface.
#[derive(Default)]
pub struct Coordinator {
    registry: Registry,
}

impl Coordinator {
    /// Creates a coordinator with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a poll and returns its id; never fails
    pub fn create_poll(&mut self, title: Option<String>) -> PollId {
        let poll_id = self.registry.create_poll(title);
        tracing::debug!(%poll_id, "poll created");
        poll_id
    }

    /// Adds a question to a poll and broadcasts the updated summary
    ///
    /// # Errors
    ///
    /// Rejects unknown polls, invalid configurations, and full polls;
    /// state is unchanged on rejection.
    pub fn add_question<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        poll_id: PollId,
        config: QuestionConfig,
        tunnel_finder: F,
    ) -> Result<QuestionId, Error> {
        config.validate()?;

        let poll = self.registry.get_mut(poll_id)?;
        let question_id = poll.add_question(config)?;
        tracing::debug!(%poll_id, %question_id, "question added");

        let summary = UpdateMessage::PollSummary(poll.summary()).into();
        poll.roster.announce(&summary, &tunnel_finder);
        Ok(question_id)
    }

    /// Attaches a connection to a poll in the given role
    ///
    /// Sends a directed join acknowledgment, then the participants and
    /// poll-summary broadcasts. A second teacher connection overwrites
    /// the teacher slot.
    ///
    /// # Errors
    ///
    /// Rejects unknown polls and full rosters.
    pub fn join<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        poll_id: PollId,
        connection: roster::Id,
        role: Role,
        name: Option<String>,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let poll = self.registry.get_mut(poll_id)?;

        match role {
            Role::Teacher => {
                let name = display_name(name, crate::constants::roster::DEFAULT_TEACHER_NAME);
                poll.roster.join_teacher(connection, name);
                poll.roster.send_message(
                    &roster::UpdateMessage::JoinedAsTeacher { poll_id }.into(),
                    connection,
                    &tunnel_finder,
                );
            }
            Role::Student => {
                let name = display_name(name, crate::constants::roster::DEFAULT_STUDENT_NAME);
                poll.roster.join_student(connection, name.clone())?;
                poll.roster.send_message(
                    &roster::UpdateMessage::JoinedAsStudent { poll_id, name }.into(),
                    connection,
                    &tunnel_finder,
                );
            }
        }
        tracing::debug!(%poll_id, %connection, ?role, "joined poll");

        let summary = UpdateMessage::PollSummary(poll.summary()).into();
        poll.roster.announce(&summary, &tunnel_finder);
        let participants = poll.roster.participants().into();
        poll.roster.announce(&participants, &tunnel_finder);
        Ok(())
    }

    /// Starts a question's countdown
    ///
    /// Closes every other question first (forced inactivation, without
    /// result emission), opens a fresh activation round with cleared
    /// tallies and answered guards, arms the countdown through
    /// `schedule_alarm`, and broadcasts the question-started notice
    /// followed by the poll summary. Restarting a question before its
    /// countdown fires makes the old countdown stale; its expiry will
    /// be ignored on receipt.
    ///
    /// # Errors
    ///
    /// Rejects unknown polls and unknown question ids.
    pub fn start_question<
        T: Tunnel,
        F: Fn(roster::Id) -> Option<T>,
        S: FnMut(crate::AlarmMessage, Duration),
    >(
        &mut self,
        poll_id: PollId,
        question_id: QuestionId,
        mut schedule_alarm: S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let poll = self.registry.get_mut(poll_id)?;
        if poll.question(question_id).is_none() {
            tracing::warn!(%poll_id, %question_id, "start requested for unknown question");
            return Err(poll::Error::QuestionNotFound.into());
        }

        // only one active question per poll
        for question in poll.questions_mut() {
            if question.id() != question_id {
                question.close();
            }
        }

        // a new activation is a new round: everyone may answer again
        poll.roster.clear_answered(question_id);

        let Some(question) = poll.question_mut(question_id) else {
            return Err(poll::Error::QuestionNotFound.into());
        };
        let round = question.activate(SystemTime::now());
        let time_limit = question.time_limit();
        let started = question.start_message().into();
        tracing::debug!(%poll_id, %question_id, round, "question started");

        poll.roster.announce(&started, &tunnel_finder);
        schedule_alarm(
            question::AlarmMessage::QuestionExpired {
                poll_id,
                question_id,
                round,
            }
            .into(),
            time_limit,
        );

        let summary = UpdateMessage::PollSummary(poll.summary()).into();
        poll.roster.announce(&summary, &tunnel_finder);
        Ok(())
    }

    /// Handles a countdown expiry delivered by the host process
    ///
    /// Just another inbound event: unknown polls or questions and stale
    /// rounds are ignored, otherwise the question closes and the
    /// results and poll-summary broadcasts go out. The close transition
    /// guard makes result emission exactly-once per activation even if
    /// the poll was already ended early.
    pub fn receive_alarm<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        alarm: crate::AlarmMessage,
        tunnel_finder: F,
    ) {
        match alarm {
            crate::AlarmMessage::Question(question::AlarmMessage::QuestionExpired {
                poll_id,
                question_id,
                round,
            }) => {
                let Ok(poll) = self.registry.get_mut(poll_id) else {
                    tracing::debug!(%poll_id, "countdown expired for unknown poll");
                    return;
                };
                let Some(question) = poll.question_mut(question_id) else {
                    tracing::debug!(%poll_id, %question_id, "countdown expired for unknown question");
                    return;
                };
                if question.round() != round {
                    tracing::debug!(
                        %poll_id,
                        %question_id,
                        round,
                        current = question.round(),
                        "stale countdown ignored"
                    );
                    return;
                }
                if question.close() {
                    tracing::debug!(%poll_id, %question_id, round, "countdown elapsed");
                    let results = question.results_message().into();
                    poll.roster.announce(&results, &tunnel_finder);
                    let summary = UpdateMessage::PollSummary(poll.summary()).into();
                    poll.roster.announce(&summary, &tunnel_finder);
                }
            }
        }
    }

    /// Records a student's answer to the active question
    ///
    /// Fire-and-forget: submissions from non-students, to inactive
    /// questions, with out-of-range option indices, or after the
    /// student already answered this activation are silently dropped.
    /// An accepted answer triggers the poll-summary broadcast; results
    /// only go out when the activation closes.
    pub fn submit_answer<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        poll_id: PollId,
        question_id: QuestionId,
        connection: roster::Id,
        option_index: usize,
        tunnel_finder: F,
    ) {
        let Ok(poll) = self.registry.get_mut(poll_id) else {
            tracing::debug!(%poll_id, "answer for unknown poll");
            return;
        };
        if !poll.roster.is_student(connection) {
            tracing::debug!(%poll_id, %connection, "answer from non-student connection");
            return;
        }
        if poll.roster.has_answered(connection, question_id) {
            tracing::debug!(%poll_id, %question_id, %connection, "duplicate answer ignored");
            return;
        }
        let Some(question) = poll.question_mut(question_id) else {
            tracing::debug!(%poll_id, %question_id, "answer for unknown question");
            return;
        };

        match question.record_answer(connection, option_index) {
            Ok(()) => {
                poll.roster.mark_answered(connection, question_id);
                let summary = UpdateMessage::PollSummary(poll.summary()).into();
                poll.roster.announce(&summary, &tunnel_finder);
            }
            Err(error) => {
                tracing::debug!(%poll_id, %question_id, %connection, %error, "answer rejected");
            }
        }
    }

    /// Ends the poll early, closing every active question
    ///
    /// Each active question emits its results immediately; its pending
    /// countdown becomes a no-op on expiry. Idempotent when nothing is
    /// active.
    ///
    /// # Errors
    ///
    /// Rejects unknown polls.
    pub fn end_poll<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        poll_id: PollId,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let poll = self.registry.get_mut(poll_id)?;

        for question_id in poll.active_question_ids() {
            let Some(question) = poll.question_mut(question_id) else {
                continue;
            };
            if question.close() {
                tracing::debug!(%poll_id, %question_id, "question closed by early end");
                let results = question.results_message().into();
                poll.roster.announce(&results, &tunnel_finder);
            }
        }

        let summary = UpdateMessage::PollSummary(poll.summary()).into();
        poll.roster.announce(&summary, &tunnel_finder);
        Ok(())
    }

    /// Removes a student at the teacher's request
    ///
    /// The student is notified with a directed kick notice BEFORE being
    /// removed from the roster and detached; a participant is never
    /// removed silently out from under a still-connected client.
    ///
    /// # Errors
    ///
    /// Rejects unknown polls and connections that are not a current
    /// student; a kick racing a disconnect resolves to that rejection.
    pub fn kick_student<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        poll_id: PollId,
        student_id: roster::Id,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let poll = self.registry.get_mut(poll_id)?;
        if !poll.roster.is_student(student_id) {
            return Err(roster::Error::StudentNotFound.into());
        }

        // notify first, remove second
        poll.roster.send_message(
            &roster::UpdateMessage::Kicked.into(),
            student_id,
            &tunnel_finder,
        );
        poll.roster.remove(student_id);
        if let Some(tunnel) = tunnel_finder(student_id) {
            tunnel.close();
        }
        tracing::debug!(%poll_id, %student_id, "student kicked");

        let participants = poll.roster.participants().into();
        poll.roster.announce(&participants, &tunnel_finder);
        let summary = UpdateMessage::PollSummary(poll.summary()).into();
        poll.roster.announce(&summary, &tunnel_finder);
        Ok(())
    }

    /// Relays a chat message to the room with a server timestamp
    ///
    /// Empty or oversized messages and unknown polls drop the relay;
    /// an empty sender name falls back to the default.
    pub fn chat_message<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &self,
        poll_id: PollId,
        sender_name: Option<String>,
        message: &str,
        tunnel_finder: F,
    ) {
        let trimmed = message.trim();
        if trimmed.is_empty() || trimmed.chars().count() > crate::constants::chat::MAX_MESSAGE_LENGTH
        {
            tracing::debug!(%poll_id, "chat message dropped");
            return;
        }
        let Ok(poll) = self.registry.get(poll_id) else {
            tracing::debug!(%poll_id, "chat for unknown poll");
            return;
        };

        let chat = UpdateMessage::Chat(ChatMessage {
            name: display_name(sender_name, crate::constants::chat::DEFAULT_SENDER),
            message: trimmed.to_string(),
            time: SystemTime::now(),
        })
        .into();
        poll.roster.announce(&chat, &tunnel_finder);
    }

    /// Handles a transport-level disconnect
    ///
    /// Sweeps every poll: the connection is removed from whichever
    /// roster holds it, with participants and poll-summary broadcasts
    /// per affected poll. Unknown connections are a no-op.
    pub fn disconnect<T: Tunnel, F: Fn(roster::Id) -> Option<T>>(
        &mut self,
        connection: roster::Id,
        tunnel_finder: F,
    ) {
        for poll in self.registry.polls_mut() {
            if poll.roster.remove(connection) {
                tracing::debug!(poll_id = %poll.id(), %connection, "connection left poll");
                let participants = poll.roster.participants().into();
                poll.roster.announce(&participants, &tunnel_finder);
                let summary = UpdateMessage::PollSummary(poll.summary()).into();
                poll.roster.announce(&summary, &tunnel_finder);
            }
        }
    }
}

/// Picks a display name, falling back when empty or absent
fn display_name(name: Option<String>, fallback: &str) -> String {
    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
