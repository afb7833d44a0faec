//! Question lifecycle and answer tallying
//!
//! A question moves through `Pending` -> `Active` -> `Closed`, and may
//! be re-activated for another round with freshly cleared tallies. The
//! countdown is not owned here: activation hands back a round number,
//! the coordinator schedules an alarm carrying that round, and an alarm
//! whose round no longer matches is stale and ignored. Bumping the
//! round on re-activation is therefore an unconditional cancellation of
//! the previous countdown.

use std::{collections::HashSet, time::Duration};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::SystemTime;

use super::{
    poll_id::{PollId, QuestionId},
    roster,
};

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the countdown length for a question
fn validate_time_limit(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::question::MIN_TIME_LIMIT },
        { crate::constants::question::MAX_TIME_LIMIT },
    >("time_limit", val)
}

/// Validates that a string is non-empty once trimmed
fn validate_trimmed(field: &'static str, val: &str) -> ValidationResult {
    if val.trim().is_empty() {
        Err(garde::Error::new(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Validates every answer option: non-empty after trimming and bounded
fn validate_options(options: &[String]) -> ValidationResult {
    for (index, option) in options.iter().enumerate() {
        if option.trim().is_empty() {
            return Err(garde::Error::new(format!(
                "option {index} must not be empty"
            )));
        }
        if option.chars().count() > crate::constants::question::MAX_OPTION_LENGTH {
            return Err(garde::Error::new(format!("option {index} is too long")));
        }
    }
    Ok(())
}

/// The countdown length applied when a question is added without one
fn default_time_limit() -> Duration {
    Duration::from_secs(crate::constants::question::DEFAULT_TIME_LIMIT)
}

/// Configuration for a multiple-choice question
///
/// Text and options are immutable once the question is created.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question prompt shown to the room
    #[garde(length(max = crate::constants::question::MAX_TEXT_LENGTH), custom(|v, _| validate_trimmed("text", v)))]
    text: String,
    /// The fixed list of answer options
    #[garde(
        length(min = crate::constants::question::MIN_OPTION_COUNT, max = crate::constants::question::MAX_OPTION_COUNT),
        custom(|v, _| validate_options(v))
    )]
    options: Vec<String>,
    /// How long the room may answer once the question starts
    #[garde(custom(|v, _| validate_time_limit(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_time_limit")]
    time_limit: Duration,
}

impl QuestionConfig {
    /// Creates a question configuration, applying the default time
    /// limit when none is given
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        time_limit: Option<Duration>,
    ) -> Self {
        Self {
            text: text.into(),
            options,
            time_limit: time_limit.unwrap_or_else(default_time_limit),
        }
    }
}

/// Lifecycle state of a question
///
/// Invariant: within one poll at most one question is `Active` at any
/// instant; the coordinator closes every sibling before activating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Created, never started
    Pending,
    /// Countdown running, accepting answers
    Active {
        /// When this activation started
        started: SystemTime,
    },
    /// Countdown elapsed or ended early; tallies frozen until the next
    /// activation
    Closed,
}

/// Errors that can occur when recording an answer
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The question is not currently accepting answers
    #[error("question is not accepting answers")]
    NotActive,
    /// The submitted option index does not name an existing option
    #[error("option index {0} is out of range")]
    OptionOutOfRange(usize),
}

/// One row of a computed result breakdown
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OptionResult {
    /// The option text
    pub text: String,
    /// How many respondents chose this option
    pub count: usize,
    /// Share of all answers, rounded half-up; 0 when nobody answered
    pub percent: u8,
}

/// Per-question entry of a poll summary broadcast
///
/// Carries raw counts rather than percentages; percentages are only
/// computed when an activation closes.
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub struct QuestionSummary {
    /// The question id
    pub id: QuestionId,
    /// The question prompt
    pub text: String,
    /// The answer options
    pub options: Vec<String>,
    /// The configured countdown length in seconds
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
    /// Whether the question is currently accepting answers
    pub active: bool,
    /// Answer count per option index
    pub answers: Vec<usize>,
}

/// Question-related messages sent to the room
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Sent once per activation when the countdown starts
    QuestionStarted {
        /// The started question's id
        question_id: QuestionId,
        /// The question prompt
        text: String,
        /// The answer options
        options: Vec<String>,
        /// The countdown length in seconds
        #[serde_as(as = "serde_with::DurationSeconds<u64>")]
        time_limit: Duration,
    },
    /// Sent exactly once per activation when it closes, by countdown
    /// expiry or early end
    QuestionResults {
        /// The closed question's id
        question_id: QuestionId,
        /// The question prompt, echoed for display
        text: String,
        /// The answer options, echoed for display
        options: Vec<String>,
        /// Percentage per option, aligned with `options`
        percents: Vec<u8>,
    },
}

/// Scheduled countdown expirations delivered back into the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// A question's countdown ran out
    QuestionExpired {
        /// The poll owning the question
        poll_id: PollId,
        /// The question whose countdown was armed
        question_id: QuestionId,
        /// The activation round the countdown belongs to; stale rounds
        /// are ignored on receipt
        round: u64,
    },
}

/// Rounds a count into a share of the total, half-up; 0 when total is 0
fn percent(count: usize, total: usize) -> u8 {
    if total == 0 {
        0
    } else {
        ((count as f64 / total as f64) * 100.0).round() as u8
    }
}

/// One multiple-choice question with its lifecycle state and tallies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique id within the owning poll
    id: QuestionId,
    /// The immutable configuration this question was created from
    config: QuestionConfig,
    /// Current lifecycle state
    lifecycle: Lifecycle,
    /// Activation round, bumped on every activation
    round: u64,
    /// Per-option sets of respondent connection ids for the current
    /// activation
    answers: Vec<HashSet<roster::Id>>,
}

impl Question {
    /// Creates a pending question with one empty tally set per option
    pub fn new(config: QuestionConfig) -> Self {
        let answers = config.options.iter().map(|_| HashSet::new()).collect_vec();
        Self {
            id: QuestionId::new(),
            config,
            lifecycle: Lifecycle::Pending,
            round: 0,
            answers,
        }
    }

    /// The question's id
    pub fn id(&self) -> QuestionId {
        self.id
    }

    /// The question prompt
    pub fn text(&self) -> &str {
        &self.config.text
    }

    /// The answer options
    pub fn options(&self) -> &[String] {
        &self.config.options
    }

    /// The configured countdown length
    pub fn time_limit(&self) -> Duration {
        self.config.time_limit
    }

    /// Whether the question is currently accepting answers
    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active { .. })
    }

    /// The current activation round
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Opens a new activation round
    ///
    /// Clears every tally, records the start time, and bumps the round
    /// so any countdown armed for a previous activation becomes stale.
    ///
    /// # Returns
    ///
    /// The new round, to be carried by the scheduled alarm.
    pub fn activate(&mut self, now: SystemTime) -> u64 {
        for tally in &mut self.answers {
            tally.clear();
        }
        self.lifecycle = Lifecycle::Active { started: now };
        self.round += 1;
        self.round
    }

    /// Closes the current activation
    ///
    /// # Returns
    ///
    /// `true` when the question was active, i.e. exactly once per
    /// activation. Callers use this to gate result emission.
    pub fn close(&mut self) -> bool {
        if self.is_active() {
            self.lifecycle = Lifecycle::Closed;
            true
        } else {
            false
        }
    }

    /// Records one respondent's choice
    ///
    /// The one-answer-per-student guard lives on the roster, not here;
    /// the tally sets only make double counting of a single connection
    /// impossible.
    ///
    /// # Errors
    ///
    /// `Error::NotActive` when the question is not accepting answers,
    /// `Error::OptionOutOfRange` when the index names no option.
    pub fn record_answer(&mut self, respondent: roster::Id, option_index: usize) -> Result<(), Error> {
        if !self.is_active() {
            return Err(Error::NotActive);
        }
        let Some(tally) = self.answers.get_mut(option_index) else {
            return Err(Error::OptionOutOfRange(option_index));
        };
        tally.insert(respondent);
        Ok(())
    }

    /// Computes the result breakdown for the current tallies
    ///
    /// Pure derivation: per option the count and its rounded share of
    /// all answers, all zeros when nobody answered.
    pub fn results(&self) -> Vec<OptionResult> {
        let counts = self.answers.iter().map(HashSet::len).collect_vec();
        let total: usize = counts.iter().sum();

        self.config
            .options
            .iter()
            .zip(counts)
            .map(|(text, count)| OptionResult {
                text: text.clone(),
                count,
                percent: percent(count, total),
            })
            .collect_vec()
    }

    /// Builds the question-started notice for this activation
    pub fn start_message(&self) -> UpdateMessage {
        UpdateMessage::QuestionStarted {
            question_id: self.id,
            text: self.config.text.clone(),
            options: self.config.options.clone(),
            time_limit: self.config.time_limit,
        }
    }

    /// Builds the results notice from the current tallies
    pub fn results_message(&self) -> UpdateMessage {
        UpdateMessage::QuestionResults {
            question_id: self.id,
            text: self.config.text.clone(),
            options: self.config.options.clone(),
            percents: self.results().into_iter().map(|r| r.percent).collect_vec(),
        }
    }

    /// Builds this question's entry of a poll summary broadcast
    pub fn summary(&self) -> QuestionSummary {
        QuestionSummary {
            id: self.id,
            text: self.config.text.clone(),
            options: self.config.options.clone(),
            time_limit: self.config.time_limit,
            active: self.is_active(),
            answers: self.answers.iter().map(HashSet::len).collect_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(options: &[&str]) -> QuestionConfig {
        QuestionConfig::new(
            "2+2?",
            options.iter().map(|s| (*s).to_string()).collect(),
            Some(Duration::from_secs(15)),
        )
    }

    fn active_question(options: &[&str]) -> Question {
        let mut question = Question::new(config(options));
        question.activate(SystemTime::now());
        question
    }

    #[test]
    fn test_config_validation_accepts_wellformed() {
        assert!(config(&["3", "4"]).validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_blank_text() {
        let config = QuestionConfig::new("   ", vec!["a".into(), "b".into()], None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_blank_option() {
        assert!(config(&["3", "  "]).validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_single_option() {
        assert!(config(&["only"]).validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_out_of_bounds_time_limit() {
        let config = QuestionConfig::new(
            "q?",
            vec!["a".into(), "b".into()],
            Some(Duration::from_secs(1)),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_time_limit_is_sixty_seconds() {
        let config = QuestionConfig::new("q?", vec!["a".into(), "b".into()], None);
        assert_eq!(config.time_limit, Duration::from_secs(60));
    }

    #[test]
    fn test_time_limit_defaults_when_absent_from_payload() {
        let config: QuestionConfig =
            serde_json::from_str(r#"{"text":"q?","options":["a","b"]}"#).unwrap();
        assert_eq!(config.time_limit, Duration::from_secs(60));
    }

    #[test]
    fn test_new_question_is_pending() {
        let question = Question::new(config(&["3", "4"]));
        assert!(!question.is_active());
        assert_eq!(question.round(), 0);
        assert_eq!(question.summary().answers, [0, 0]);
    }

    #[test]
    fn test_record_answer_rejected_while_pending() {
        let mut question = Question::new(config(&["3", "4"]));
        assert_eq!(
            question.record_answer(roster::Id::new(), 1),
            Err(Error::NotActive)
        );
    }

    #[test]
    fn test_record_answer_rejects_out_of_range_index() {
        let mut question = active_question(&["3", "4"]);
        assert_eq!(
            question.record_answer(roster::Id::new(), 2),
            Err(Error::OptionOutOfRange(2))
        );
        assert_eq!(question.summary().answers, [0, 0]);
    }

    #[test]
    fn test_same_connection_cannot_double_count_one_option() {
        let mut question = active_question(&["3", "4"]);
        let respondent = roster::Id::new();

        question.record_answer(respondent, 1).unwrap();
        question.record_answer(respondent, 1).unwrap();

        assert_eq!(question.summary().answers, [0, 1]);
    }

    #[test]
    fn test_activation_clears_tallies_and_bumps_round() {
        let mut question = active_question(&["3", "4"]);
        question.record_answer(roster::Id::new(), 0).unwrap();
        assert_eq!(question.round(), 1);

        let round = question.activate(SystemTime::now());

        assert_eq!(round, 2);
        assert_eq!(question.summary().answers, [0, 0]);
        assert!(question.is_active());
    }

    #[test]
    fn test_close_fires_exactly_once_per_activation() {
        let mut question = active_question(&["3", "4"]);

        assert!(question.close());
        assert!(!question.close());

        question.activate(SystemTime::now());
        assert!(question.close());
    }

    #[test]
    fn test_results_all_zero_without_answers() {
        let question = active_question(&["3", "4"]);
        let results = question.results();
        assert_eq!(results[0].percent, 0);
        assert_eq!(results[1].percent, 0);
        assert_eq!(results.iter().map(|r| r.count).sum::<usize>(), 0);
    }

    #[test]
    fn test_results_single_answer_is_full_share() {
        let mut question = active_question(&["3", "4"]);
        question.record_answer(roster::Id::new(), 1).unwrap();

        let results = question.results();
        assert_eq!(results[0].percent, 0);
        assert_eq!(results[1].percent, 100);
    }

    #[test]
    fn test_results_split_evenly() {
        let mut question = active_question(&["3", "4"]);
        question.record_answer(roster::Id::new(), 0).unwrap();
        question.record_answer(roster::Id::new(), 1).unwrap();

        let percents = question
            .results()
            .into_iter()
            .map(|r| r.percent)
            .collect::<Vec<_>>();
        assert_eq!(percents, [50, 50]);
    }

    #[test]
    fn test_results_rounding_sums_near_hundred() {
        let mut question = active_question(&["a", "b", "c"]);
        question.record_answer(roster::Id::new(), 0).unwrap();
        question.record_answer(roster::Id::new(), 1).unwrap();
        question.record_answer(roster::Id::new(), 2).unwrap();

        let percents = question
            .results()
            .into_iter()
            .map(|r| u32::from(r.percent))
            .collect::<Vec<_>>();
        assert_eq!(percents, [33, 33, 33]);
        let sum: u32 = percents.iter().sum();
        assert!((99..=101).contains(&sum));
    }

    #[test]
    fn test_results_rounding_half_up() {
        let mut question = active_question(&["a", "b"]);
        question.record_answer(roster::Id::new(), 0).unwrap();
        question.record_answer(roster::Id::new(), 0).unwrap();
        question.record_answer(roster::Id::new(), 1).unwrap();

        let percents = question
            .results()
            .into_iter()
            .map(|r| r.percent)
            .collect::<Vec<_>>();
        assert_eq!(percents, [67, 33]);
    }

    #[test]
    fn test_results_message_echoes_question() {
        let mut question = active_question(&["3", "4"]);
        question.record_answer(roster::Id::new(), 1).unwrap();

        let UpdateMessage::QuestionResults {
            question_id,
            text,
            options,
            percents,
        } = question.results_message()
        else {
            panic!("expected results message");
        };

        assert_eq!(question_id, question.id());
        assert_eq!(text, "2+2?");
        assert_eq!(options, ["3", "4"]);
        assert_eq!(percents, [0, 100]);
    }
}
