//! Leaderboard and end-of-quiz report
//!
//! Both views are derived from the session's [`Ledger`] on demand. Entries
//! are ordered by total points, highest first; participants with equal
//! points keep their join order.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{
    TruncatedVec,
    results::percentage,
    scoring::{Ledger, ScoreRecord},
    session_code::SessionCode,
};

/// Score summary of one participant
///
/// Field names are stable: clients persist these summaries in their quiz
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Display name
    pub name: String,
    /// Questions answered correctly
    pub correct_answers: u64,
    /// Distinct questions answered
    pub total_answered: u64,
    /// Questions answered incorrectly
    pub wrong_answers: u64,
    /// Sum of awarded points
    pub total_points: u64,
    /// Rounded share of correct answers among answered ones, 0 to 100
    pub percentage: u32,
}

impl From<&ScoreRecord> for ScoreSummary {
    fn from(record: &ScoreRecord) -> Self {
        let total_answered = record.total_answered();
        Self {
            name: record.name.clone(),
            correct_answers: record.correct_answers,
            total_answered,
            wrong_answers: total_answered.saturating_sub(record.correct_answers),
            total_points: record.total_points,
            percentage: percentage(record.correct_answers as usize, total_answered as usize),
        }
    }
}

/// Every summary in leaderboard order
pub fn standings(ledger: &Ledger) -> Vec<ScoreSummary> {
    // roster is in join order and the sort is stable
    ledger
        .roster()
        .map(|(_, record)| ScoreSummary::from(record))
        .sorted_by(|a, b| b.total_points.cmp(&a.total_points))
        .collect_vec()
}

/// The top `top_n` summaries along with the total participant count
pub fn compute_leaderboard(ledger: &Ledger, top_n: usize) -> TruncatedVec<ScoreSummary> {
    let standings = standings(ledger);
    let exact_count = standings.len();
    TruncatedVec::new(standings.into_iter(), top_n, exact_count)
}

/// Final report of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// The session's join code
    pub session_code: SessionCode,
    /// Quiz title
    pub title: String,
    /// Presenter display name
    pub presenter_name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Number of questions in the session
    pub total_questions: usize,
    /// Number of participants in the session
    pub total_participants: usize,
    /// Every participant, leaderboard order, untruncated
    pub participants: Vec<ScoreSummary>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        question::{Question, QuestionDraft},
        watcher::Id,
    };

    fn play(ledger: &mut Ledger, answers: &[(Id, &str, i64)]) {
        let mut question =
            Question::new(QuestionDraft::new("2+2?", ["3", "4", "5"], "4", Some(20)), 30).unwrap();
        let start = Utc::now();
        question.activate(start);

        for (id, answer, seconds) in answers {
            ledger
                .record_answer(*id, &question, answer, start + Duration::seconds(*seconds))
                .unwrap();
        }
    }

    fn enroll(ledger: &mut Ledger, names: &[&str]) -> Vec<Id> {
        names
            .iter()
            .map(|name| {
                let id = Id::new();
                ledger.enroll(id, (*name).to_owned());
                id
            })
            .collect_vec()
    }

    #[test]
    fn test_summary_fields() {
        let mut ledger = Ledger::default();
        let ids = enroll(&mut ledger, &["Alice"]);
        play(&mut ledger, &[(ids[0], "4", 3)]);
        play(&mut ledger, &[(ids[0], "3", 3)]);
        play(&mut ledger, &[(ids[0], "4", 15)]);

        let summary = ScoreSummary::from(ledger.get(ids[0]).unwrap());
        assert_eq!(
            summary,
            ScoreSummary {
                name: "Alice".to_owned(),
                correct_answers: 2,
                total_answered: 3,
                wrong_answers: 1,
                total_points: 3,
                percentage: 67,
            }
        );
    }

    #[test]
    fn test_nothing_answered_is_zero_percent() {
        let mut ledger = Ledger::default();
        let ids = enroll(&mut ledger, &["Idle"]);

        let summary = ScoreSummary::from(ledger.get(ids[0]).unwrap());
        assert_eq!(summary.percentage, 0);
        assert_eq!(summary.wrong_answers, 0);
    }

    #[test]
    fn test_order_by_points_then_join_order() {
        let mut ledger = Ledger::default();
        let ids = enroll(&mut ledger, &["a", "b", "c", "d"]);
        play(
            &mut ledger,
            &[(ids[0], "4", 15), (ids[1], "4", 1), (ids[2], "3", 1), (ids[3], "4", 15)],
        );

        let names = standings(&ledger)
            .into_iter()
            .map(|summary| summary.name)
            .collect_vec();
        assert_eq!(names, ["b", "a", "d", "c"]);
    }

    #[test]
    fn test_leaderboard_truncates() {
        let mut ledger = Ledger::default();
        let ids = enroll(&mut ledger, &["a", "b", "c", "d", "e"]);
        play(&mut ledger, &[(ids[4], "4", 1)]);

        let leaderboard = compute_leaderboard(&ledger, 3);

        assert_eq!(leaderboard.exact_count(), 5);
        assert_eq!(leaderboard.items().len(), 3);
        assert_eq!(leaderboard.items()[0].name, "e");
        assert_eq!(leaderboard.items()[1].name, "a");
    }

    #[test]
    fn test_empty_leaderboard() {
        let leaderboard = compute_leaderboard(&Ledger::default(), 3);
        assert_eq!(leaderboard.exact_count(), 0);
        assert!(leaderboard.items().is_empty());
    }

    #[test]
    fn test_summary_field_names() {
        let mut ledger = Ledger::default();
        let ids = enroll(&mut ledger, &["a"]);
        let json = serde_json::to_value(ScoreSummary::from(ledger.get(ids[0]).unwrap())).unwrap();

        for field in [
            "name",
            "correctAnswers",
            "totalAnswered",
            "wrongAnswers",
            "totalPoints",
            "percentage",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
