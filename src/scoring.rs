//! Per-participant score keeping
//!
//! The ledger holds one [`ScoreRecord`] per participant of a session. A
//! record is created when the participant joins and dropped when they
//! leave. Only the first submission for a question counts; later ones may
//! change the stored answer but never the tally.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constants::scoring::{BASE_POINTS, FAST_POINTS},
    error::{Missing, Result},
    question::{Question, QuestionId},
    watcher::Id,
};

/// Running tally of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Display name at join time
    pub name: String,
    /// Number of questions answered correctly
    pub correct_answers: u64,
    /// Sum of awarded points
    pub total_points: u64,
    /// Questions this participant has already been scored on
    answered_question_ids: HashSet<QuestionId>,
    /// Join order, used to break ties
    seat: u64,
}

impl ScoreRecord {
    /// Number of distinct questions answered
    pub fn total_answered(&self) -> u64 {
        self.answered_question_ids.len() as u64
    }

    /// Whether the participant has been scored on `question_id`
    pub fn has_answered(&self, question_id: QuestionId) -> bool {
        self.answered_question_ids.contains(&question_id)
    }

    /// Join order within the session
    pub fn seat(&self) -> u64 {
        self.seat
    }
}

/// What happened to a submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the submitted answer matches the correct one
    pub correct: bool,
    /// Whether this submission was the one that got scored
    pub counted: bool,
}

/// Points a correct answer earns
///
/// Elapsed time is measured in whole seconds from the activation. Answers
/// within the first half of the limit (rounded down) earn the bonus. A
/// question that was never stamped earns the base points.
pub fn calculate_points(
    time_limit: u32,
    started_at: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
) -> u64 {
    let Some(started_at) = started_at else {
        return BASE_POINTS;
    };

    let elapsed = (submitted_at - started_at).num_seconds().max(0);

    if elapsed <= i64::from(time_limit / 2) {
        FAST_POINTS
    } else {
        BASE_POINTS
    }
}

/// Score records of every participant in a session
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    records: HashMap<Id, ScoreRecord>,
    next_seat: u64,
}

impl Ledger {
    /// Opens a zeroed record for a participant
    ///
    /// An existing record is kept as is.
    pub fn enroll(&mut self, id: Id, name: String) -> &ScoreRecord {
        let next_seat = &mut self.next_seat;
        self.records.entry(id).or_insert_with(|| {
            let seat = *next_seat;
            *next_seat += 1;
            ScoreRecord {
                name,
                correct_answers: 0,
                total_points: 0,
                answered_question_ids: HashSet::new(),
                seat,
            }
        })
    }

    /// Drops the record of a participant
    pub fn remove(&mut self, id: Id) -> Option<ScoreRecord> {
        self.records.remove(&id)
    }

    /// Gets the record of a participant
    pub fn get(&self, id: Id) -> Option<&ScoreRecord> {
        self.records.get(&id)
    }

    /// Scores an answer to `question`
    ///
    /// The first submission per question updates the tally. Later ones are
    /// reported with `counted: false` and leave the record untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the participant has no record.
    pub fn record_answer(
        &mut self,
        id: Id,
        question: &Question,
        answer: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Outcome> {
        let record = self.records.get_mut(&id).ok_or(Missing::Participant)?;
        let correct = question.is_correct(answer);

        if !record.answered_question_ids.insert(question.id()) {
            return Ok(Outcome {
                correct,
                counted: false,
            });
        }

        if correct {
            record.correct_answers += 1;
            record.total_points +=
                calculate_points(question.time_limit(), question.started_at(), submitted_at);
        }

        Ok(Outcome {
            correct,
            counted: true,
        })
    }

    /// Iterates over records in join order
    pub fn roster(&self) -> impl Iterator<Item = (Id, &ScoreRecord)> {
        self.records
            .iter()
            .sorted_by_key(|(_, record)| record.seat)
            .map(|(id, record)| (*id, record))
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
