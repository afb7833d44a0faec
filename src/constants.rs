//! Configuration constants for the classpoll engine
//!
//! This module contains the limits and bounds enforced across the
//! engine, from question validation to roster capacity.

/// Poll-level configuration constants
pub mod poll {
    /// Maximum length of a poll title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of questions in a single poll
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum number of students attached to a single poll
    pub const MAX_STUDENT_COUNT: usize = 1000;
    /// Title used when a poll is created without one
    pub const DEFAULT_TITLE: &str = "Untitled Poll";
}

/// Question configuration constants
pub mod question {
    /// Maximum length of a question text in characters
    pub const MAX_TEXT_LENGTH: usize = 400;
    /// Minimum number of answer options for a question
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of answer options for a question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a single answer option in characters
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Minimum countdown length in seconds
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum countdown length in seconds
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Countdown length in seconds applied when none is given
    pub const DEFAULT_TIME_LIMIT: u64 = 60;
}

/// Chat relay configuration constants
pub mod chat {
    /// Maximum length of a single chat message in characters
    pub const MAX_MESSAGE_LENGTH: usize = 500;
    /// Sender name used when a chat message arrives without one
    pub const DEFAULT_SENDER: &str = "Anonymous";
}

/// Roster configuration constants
pub mod roster {
    /// Display name used when a teacher joins without one
    pub const DEFAULT_TEACHER_NAME: &str = "Teacher";
    /// Display name used when a student joins without one
    pub const DEFAULT_STUDENT_NAME: &str = "Student";
}
