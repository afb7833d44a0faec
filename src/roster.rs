//! Participant roster management
//!
//! This module tracks which connections are attached to a poll and in
//! what role: at most one teacher and any number of students, each
//! keyed by their transport connection id. It also carries the
//! per-student answered-question guard and the broadcast helpers used
//! by the coordinator to reach the room.
//!
//! Connection ids are transport identities, not stable student
//! identities: a reconnect yields a fresh id with a fresh answered set.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{
    UpdateMessage as CrateUpdateMessage,
    poll_id::{PollId, QuestionId},
    session::Tunnel,
};

/// A unique identifier for one live client attachment
///
/// Ids are opaque references into the transport layer. The engine
/// never creates connections itself; it only keys state by their ids.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses a connection id from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role a connection holds within a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Role {
    /// The poll owner who starts questions and manages the roster
    Teacher,
    /// A participant who answers questions
    Student,
}

/// A student's roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// The student's display name
    name: String,
    /// Question ids this connection has answered in their current activation
    answered: HashSet<QuestionId>,
}

impl Student {
    /// The student's display name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The teacher's roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TeacherEntry {
    id: Id,
    name: String,
}

/// Errors that can occur when managing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The targeted connection is not a current student of this poll
    #[error("student not found")]
    StudentNotFound,
    /// The poll has reached the maximum number of students
    #[error("maximum number of students reached")]
    MaximumStudents,
}

/// Serialization helper for the Roster struct
#[derive(Deserialize)]
struct RosterSerde {
    teacher: Option<TeacherEntry>,
    students: HashMap<Id, Student>,
}

/// The set of connections currently attached to a poll
///
/// Invariant: a connection id appears in at most one role at a time.
/// Joining in a new role moves the connection, never duplicates it.
#[derive(Default, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    /// The single teacher slot; last joiner wins
    teacher: Option<TeacherEntry>,
    /// Student entries keyed by connection id
    students: HashMap<Id, Student>,

    /// Reverse mapping organized by role for membership checks and counts
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<Role, HashSet<Id>>,
}

impl From<RosterSerde> for Roster {
    /// Reconstructs the roster from serialized data
    ///
    /// Rebuilds the reverse mapping, which is not serialized.
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde { teacher, students } = serde;
        let mut reverse_mapping: EnumMap<Role, HashSet<Id>> = EnumMap::default();
        if let Some(entry) = &teacher {
            reverse_mapping[Role::Teacher].insert(entry.id);
        }
        for id in students.keys() {
            reverse_mapping[Role::Student].insert(*id);
        }
        Self {
            teacher,
            students,
            reverse_mapping,
        }
    }
}

/// Roster-related messages sent to participants
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A snapshot of everyone attached to the poll, sent to the room
    /// after any roster change
    Participants {
        /// Connection id of the current teacher, if any
        teacher_id: Option<Id>,
        /// Display name of the current teacher, if any
        teacher_name: Option<String>,
        /// Current students as (id, name) entries
        students: Vec<Participant>,
    },
    /// Directed acknowledgment of a successful teacher join
    JoinedAsTeacher {
        /// The poll that was joined
        poll_id: PollId,
    },
    /// Directed acknowledgment of a successful student join
    JoinedAsStudent {
        /// The poll that was joined
        poll_id: PollId,
        /// The display name recorded for the student
        name: String,
    },
    /// Directed notice that the recipient has been removed by the teacher
    Kicked,
}

/// One student entry in a participants snapshot
#[derive(Debug, Serialize, Clone)]
pub struct Participant {
    /// The student's connection id
    pub id: Id,
    /// The student's display name
    pub name: String,
}

impl Roster {
    /// Seats a connection in the teacher slot
    ///
    /// A second teacher connection overwrites the slot (last joiner
    /// wins) so a teacher can reconnect under a fresh connection id.
    pub fn join_teacher(&mut self, id: Id, name: String) {
        if self.students.remove(&id).is_some() {
            self.reverse_mapping[Role::Student].remove(&id);
        }
        if let Some(previous) = self.teacher.take() {
            self.reverse_mapping[Role::Teacher].remove(&previous.id);
        }
        self.reverse_mapping[Role::Teacher].insert(id);
        self.teacher = Some(TeacherEntry { id, name });
    }

    /// Adds a connection as a student with an empty answered set
    ///
    /// Rejoining with the same connection id resets the entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumStudents` when the poll is full.
    pub fn join_student(&mut self, id: Id, name: String) -> Result<(), Error> {
        if self.students.len() >= crate::constants::poll::MAX_STUDENT_COUNT
            && !self.students.contains_key(&id)
        {
            return Err(Error::MaximumStudents);
        }

        if self.teacher.as_ref().is_some_and(|t| t.id == id) {
            self.teacher = None;
            self.reverse_mapping[Role::Teacher].remove(&id);
        }
        self.students.insert(
            id,
            Student {
                name,
                answered: HashSet::new(),
            },
        );
        self.reverse_mapping[Role::Student].insert(id);
        Ok(())
    }

    /// Removes a connection from whichever role holds it
    ///
    /// Removing the teacher leaves the poll teacherless, which is not
    /// an error state. Idempotent: removing an absent id is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed
    pub fn remove(&mut self, id: Id) -> bool {
        if self.students.remove(&id).is_some() {
            self.reverse_mapping[Role::Student].remove(&id);
            return true;
        }
        if self.teacher.as_ref().is_some_and(|t| t.id == id) {
            self.teacher = None;
            self.reverse_mapping[Role::Teacher].remove(&id);
            return true;
        }
        false
    }

    /// Returns the role currently held by a connection, if any
    pub fn role_of(&self, id: Id) -> Option<Role> {
        self.reverse_mapping
            .iter()
            .find(|(_, members)| members.contains(&id))
            .map(|(role, _)| role)
    }

    /// Whether the connection is a current student of this poll
    pub fn is_student(&self, id: Id) -> bool {
        self.reverse_mapping[Role::Student].contains(&id)
    }

    /// The current teacher's id and name, if seated
    pub fn teacher(&self) -> Option<(Id, &str)> {
        self.teacher.as_ref().map(|t| (t.id, t.name.as_str()))
    }

    /// Number of students currently attached
    pub fn student_count(&self) -> usize {
        self.reverse_mapping[Role::Student].len()
    }

    /// Whether the student has already answered the current activation
    /// of the given question
    pub fn has_answered(&self, id: Id, question_id: QuestionId) -> bool {
        self.students
            .get(&id)
            .is_some_and(|s| s.answered.contains(&question_id))
    }

    /// Records that the student answered the given question
    ///
    /// # Returns
    ///
    /// `false` if the connection is not a current student
    pub fn mark_answered(&mut self, id: Id, question_id: QuestionId) -> bool {
        match self.students.get_mut(&id) {
            Some(student) => student.answered.insert(question_id),
            None => false,
        }
    }

    /// Clears the answered guard for one question across all students
    ///
    /// Runs on every activation so a re-run accepts answers again.
    pub fn clear_answered(&mut self, question_id: QuestionId) {
        for student in self.students.values_mut() {
            student.answered.remove(&question_id);
        }
    }

    /// Builds a participants snapshot from the current roster
    ///
    /// Students are sorted by name for stable output.
    pub fn participants(&self) -> UpdateMessage {
        UpdateMessage::Participants {
            teacher_id: self.teacher.as_ref().map(|t| t.id),
            teacher_name: self.teacher.as_ref().map(|t| t.name.clone()),
            students: self
                .students
                .iter()
                .map(|(id, student)| Participant {
                    id: *id,
                    name: student.name.clone(),
                })
                .sorted_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)))
                .collect_vec(),
        }
    }

    /// Sends a message to every connection attached to the poll
    ///
    /// Connections without a live tunnel are skipped.
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &CrateUpdateMessage,
        tunnel_finder: F,
    ) {
        for id in self
            .reverse_mapping
            .values()
            .flat_map(|members| members.iter().copied())
        {
            if let Some(tunnel) = tunnel_finder(id) {
                tunnel.send_message(message);
            }
        }
    }

    /// Sends a message to one specific connection
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &CrateUpdateMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(tunnel) = tunnel_finder(id) else {
            return;
        };

        tunnel.send_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with_students(names: &[&str]) -> (Roster, Vec<Id>) {
        let mut roster = Roster::default();
        let ids = names
            .iter()
            .map(|name| {
                let id = Id::new();
                roster.join_student(id, (*name).to_string()).unwrap();
                id
            })
            .collect();
        (roster, ids)
    }

    #[test]
    fn test_teacher_slot_last_joiner_wins() {
        let mut roster = Roster::default();
        let first = Id::new();
        let second = Id::new();

        roster.join_teacher(first, "Ms. A".to_string());
        roster.join_teacher(second, "Ms. A (reconnected)".to_string());

        assert_eq!(
            roster.teacher(),
            Some((second, "Ms. A (reconnected)"))
        );
        assert_eq!(roster.role_of(first), None);
    }

    #[test]
    fn test_connection_holds_at_most_one_role() {
        let mut roster = Roster::default();
        let id = Id::new();

        roster.join_student(id, "Sam".to_string()).unwrap();
        assert_eq!(roster.role_of(id), Some(Role::Student));

        roster.join_teacher(id, "Sam".to_string());
        assert_eq!(roster.role_of(id), Some(Role::Teacher));
        assert!(!roster.is_student(id));
        assert_eq!(roster.student_count(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut roster, ids) = roster_with_students(&["A"]);

        assert!(roster.remove(ids[0]));
        assert!(!roster.remove(ids[0]));
        assert!(!roster.remove(Id::new()));
        assert_eq!(roster.student_count(), 0);
    }

    #[test]
    fn test_remove_teacher_clears_slot() {
        let mut roster = Roster::default();
        let teacher = Id::new();
        roster.join_teacher(teacher, "T".to_string());

        assert!(roster.remove(teacher));
        assert_eq!(roster.teacher(), None);
    }

    #[test]
    fn test_rejoin_resets_answered_set() {
        let (mut roster, ids) = roster_with_students(&["A"]);
        let question = QuestionId::new();

        assert!(roster.mark_answered(ids[0], question));
        assert!(roster.has_answered(ids[0], question));

        roster.join_student(ids[0], "A".to_string()).unwrap();
        assert!(!roster.has_answered(ids[0], question));
    }

    #[test]
    fn test_mark_answered_requires_student() {
        let mut roster = Roster::default();
        let stranger = Id::new();
        assert!(!roster.mark_answered(stranger, QuestionId::new()));
    }

    #[test]
    fn test_clear_answered_scopes_one_question() {
        let (mut roster, ids) = roster_with_students(&["A", "B"]);
        let first = QuestionId::new();
        let second = QuestionId::new();

        roster.mark_answered(ids[0], first);
        roster.mark_answered(ids[0], second);
        roster.mark_answered(ids[1], first);

        roster.clear_answered(first);

        assert!(!roster.has_answered(ids[0], first));
        assert!(!roster.has_answered(ids[1], first));
        assert!(roster.has_answered(ids[0], second));
    }

    #[test]
    fn test_participants_snapshot_sorted_by_name() {
        let (mut roster, _) = roster_with_students(&["Zoe", "Amy", "Mia"]);
        roster.join_teacher(Id::new(), "T".to_string());

        let UpdateMessage::Participants {
            teacher_name,
            students,
            ..
        } = roster.participants()
        else {
            panic!("expected participants snapshot");
        };

        assert_eq!(teacher_name.as_deref(), Some("T"));
        let names = students.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Amy", "Mia", "Zoe"]);
    }

    #[test]
    fn test_serde_rebuilds_reverse_mapping() {
        let (mut roster, ids) = roster_with_students(&["A", "B"]);
        roster.join_teacher(Id::new(), "T".to_string());

        let json = serde_json::to_string(&roster).unwrap();
        let restored: Roster = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.student_count(), 2);
        assert!(restored.is_student(ids[0]));
        assert!(restored.is_student(ids[1]));
        assert!(restored.teacher().is_some());
    }
}
