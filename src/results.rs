//! Per-question result snapshots
//!
//! Snapshots are computed on demand from the question's response log and
//! the session roster. They are never stored, so they always reflect the
//! participants currently in the session.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    question::{Question, QuestionId},
    scoring::Ledger,
    watcher::Id,
};

/// Votes for one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    /// The option text
    pub option: String,
    /// Number of participants whose latest answer is this option
    pub count: usize,
    /// Rounded share of all responses, 0 to 100
    pub percentage: u32,
    /// Whether this is the correct option
    pub correct: bool,
}

/// Aggregated answers to a question, correct answer disclosed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    /// The question these results belong to
    pub question_id: QuestionId,
    /// The prompt
    pub question: String,
    /// One entry per option, in display order
    pub breakdown: Vec<OptionResult>,
    /// The correct option
    pub correct_answer: String,
    /// Number of counted responses
    pub total_responses: usize,
    /// Names of participants without an answer, in join order
    pub not_answered: Vec<String>,
}

/// Rounded percentage of `part` in `total`, 0 if `total` is 0
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

impl ResultSnapshot {
    /// Aggregates the responses of `question`
    ///
    /// Every option starts at zero. Each participant still in `ledger`
    /// contributes their latest answer; answers of participants that left
    /// are ignored, as are answers that are not an option.
    pub fn compute(question: &Question, ledger: &Ledger) -> Self {
        let latest: HashMap<Id, &str> = question
            .responses()
            .iter()
            .filter(|response| ledger.get(response.participant_id).is_some())
            .filter(|response| question.has_option(&response.answer))
            .map(|response| (response.participant_id, response.answer.as_str()))
            .collect();

        let counts = latest.values().copied().counts();
        let total_responses = latest.len();

        let breakdown = question
            .options()
            .iter()
            .map(|option| {
                let count = counts.get(option.as_str()).copied().unwrap_or_default();
                OptionResult {
                    option: option.clone(),
                    count,
                    percentage: percentage(count, total_responses),
                    correct: question.is_correct(option),
                }
            })
            .collect_vec();

        let answered: HashSet<Id> = latest.keys().copied().collect();
        let not_answered = ledger
            .roster()
            .filter(|(id, _)| !answered.contains(id))
            .map(|(_, record)| record.name.clone())
            .collect_vec();

        Self {
            question_id: question.id(),
            question: question.prompt().to_owned(),
            breakdown,
            correct_answer: question.correct_answer().to_owned(),
            total_responses,
            not_answered,
        }
    }

    /// Votes for `option`, 0 if it is not an option
    pub fn count(&self, option: &str) -> usize {
        self.option(option).map_or(0, |result| result.count)
    }

    /// Rounded share of `option`, 0 if it is not an option
    pub fn percentage(&self, option: &str) -> u32 {
        self.option(option).map_or(0, |result| result.percentage)
    }

    fn option(&self, option: &str) -> Option<&OptionResult> {
        self.breakdown.iter().find(|result| result.option == option)
    }
}
