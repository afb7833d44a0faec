//! Poll aggregate
//!
//! A poll owns its ordered question list and its roster. Nothing in a
//! poll is shared with any other poll; the registry owns the polls and
//! the coordinator is the sole writer.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    poll_id::{PollId, QuestionId},
    question::{Question, QuestionConfig, QuestionSummary},
    roster::Roster,
};

/// Errors that can occur when mutating a poll
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The question id is unknown within this poll
    #[error("question not found")]
    QuestionNotFound,
    /// The poll has reached the maximum number of questions
    #[error("maximum number of questions reached")]
    MaximumQuestions,
}

/// A full snapshot of a poll, broadcast after any structural change
#[derive(Debug, Serialize, Clone)]
pub struct PollSummary {
    /// The poll's id
    pub id: PollId,
    /// The poll's title
    pub title: String,
    /// Every question with its option counts (not percentages)
    pub questions: Vec<QuestionSummary>,
    /// Number of students currently attached
    pub student_count: usize,
}

/// A teacher-owned session: a titled, ordered list of questions plus
/// the roster of attached connections
#[derive(Serialize, Deserialize)]
pub struct Poll {
    /// The poll's id
    id: PollId,
    /// The poll's title
    title: String,
    /// Questions in creation order
    questions: Vec<Question>,
    /// The attached teacher and students
    pub roster: Roster,
}

impl Poll {
    /// Creates an empty poll
    pub fn new(id: PollId, title: String) -> Self {
        Self {
            id,
            title,
            questions: Vec::new(),
            roster: Roster::default(),
        }
    }

    /// The poll's id
    pub fn id(&self) -> PollId {
        self.id
    }

    /// The poll's title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Appends a question created from the given configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumQuestions` when the poll is full.
    pub fn add_question(&mut self, config: QuestionConfig) -> Result<QuestionId, Error> {
        if self.questions.len() >= crate::constants::poll::MAX_QUESTION_COUNT {
            return Err(Error::MaximumQuestions);
        }
        let question = Question::new(config);
        let question_id = question.id();
        self.questions.push(question);
        Ok(question_id)
    }

    /// Looks up a question by id
    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == question_id)
    }

    /// Looks up a question by id for mutation
    pub fn question_mut(&mut self, question_id: QuestionId) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id() == question_id)
    }

    /// Iterates over all questions for mutation
    pub fn questions_mut(&mut self) -> impl Iterator<Item = &mut Question> {
        self.questions.iter_mut()
    }

    /// Ids of every currently active question
    ///
    /// The single-active invariant makes this at most one element, but
    /// early termination closes whatever is active without assuming it.
    pub fn active_question_ids(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| q.is_active())
            .map(Question::id)
            .collect_vec()
    }

    /// Builds the poll summary snapshot from current state
    pub fn summary(&self) -> PollSummary {
        PollSummary {
            id: self.id,
            title: self.title.clone(),
            questions: self.questions.iter().map(Question::summary).collect_vec(),
            student_count: self.roster.student_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use web_time::SystemTime;

    fn poll_with_questions(count: usize) -> Poll {
        let mut poll = Poll::new(PollId::new(), "Quiz".to_string());
        for i in 0..count {
            poll.add_question(QuestionConfig::new(
                format!("q{i}?"),
                vec!["a".into(), "b".into()],
                Some(Duration::from_secs(15)),
            ))
            .unwrap();
        }
        poll
    }

    #[test]
    fn test_question_lookup_by_id() {
        let mut poll = poll_with_questions(3);
        let id = poll.summary().questions[1].id;

        assert_eq!(poll.question(id).unwrap().text(), "q1?");
        assert!(poll.question_mut(id).is_some());
        assert!(poll.question(crate::poll_id::QuestionId::new()).is_none());
    }

    #[test]
    fn test_active_question_ids_tracks_lifecycle() {
        let mut poll = poll_with_questions(2);
        assert!(poll.active_question_ids().is_empty());

        let id = poll.summary().questions[0].id;
        poll.question_mut(id).unwrap().activate(SystemTime::now());

        assert_eq!(poll.active_question_ids(), [id]);
    }

    #[test]
    fn test_summary_counts_students() {
        let mut poll = poll_with_questions(1);
        poll.roster
            .join_student(crate::roster::Id::new(), "A".to_string())
            .unwrap();
        poll.roster
            .join_student(crate::roster::Id::new(), "B".to_string())
            .unwrap();

        let summary = poll.summary();
        assert_eq!(summary.student_count, 2);
        assert_eq!(summary.title, "Quiz");
        assert_eq!(summary.questions.len(), 1);
        assert!(!summary.questions[0].active);
    }
}
