//! The ordered questions of a session
//!
//! Lifecycle constraints (a live question cannot be edited or deleted) are
//! enforced by the caller, which knows the session state; this module only
//! owns ordering and lookup.

use serde::{Deserialize, Serialize};

use crate::{
    constants::session::MAX_QUESTION_COUNT,
    error::{Error, Missing, Result},
    question::{Question, QuestionDraft, QuestionId, QuestionUpdate},
};

/// Ordered list of questions, in the order they were added
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Validates a draft and appends it as a new question
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the draft is malformed or the session
    /// already holds the maximum number of questions.
    pub fn add(&mut self, draft: QuestionDraft, default_time_limit: u32) -> Result<&Question> {
        if self.questions.len() >= MAX_QUESTION_COUNT {
            return Err(Error::Validation(format!(
                "a session holds at most {MAX_QUESTION_COUNT} questions"
            )));
        }

        let question = Question::new(draft, default_time_limit)?;
        self.questions.push(question);

        let index = self.questions.len() - 1;
        Ok(&self.questions[index])
    }

    /// Applies a partial update to an existing question
    ///
    /// # Errors
    ///
    /// * `Error::NotFound` - No question with this id
    /// * `Error::Validation` - The merged question is malformed
    pub fn update(&mut self, id: QuestionId, update: QuestionUpdate) -> Result<&Question> {
        let question = self.get_mut(id).ok_or(Missing::Question)?;
        question.apply(update)?;
        Ok(question)
    }

    /// Removes a question, returning it
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no question has this id.
    pub fn delete(&mut self, id: QuestionId) -> Result<Question> {
        let index = self.index_of(id).ok_or(Missing::Question)?;
        Ok(self.questions.remove(index))
    }

    /// Gets a question by id
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Gets a mutable question by id
    pub fn get_mut(&mut self, id: QuestionId) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id() == id)
    }

    /// Position of a question in the list
    pub fn index_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id() == id)
    }

    /// Whether every question in the list has been started at least once
    pub fn all_asked(&self) -> bool {
        !self.questions.is_empty() && self.questions.iter().all(|q| q.started_at().is_some())
    }

    /// Number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Iterates over the questions in order
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn draft(prompt: &str) -> QuestionDraft {
        QuestionDraft::new(prompt, ["a", "b"], "a", None)
    }

    #[test]
    fn test_add_keeps_order() {
        let mut set = QuestionSet::default();
        let first = set.add(draft("one"), 30).unwrap().id();
        let second = set.add(draft("two"), 30).unwrap().id();

        assert_eq!(set.len(), 2);
        assert_eq!(set.index_of(first), Some(0));
        assert_eq!(set.index_of(second), Some(1));
    }

    #[test]
    fn test_invalid_draft_is_not_added() {
        let mut set = QuestionSet::default();
        let result = set.add(QuestionDraft::new("", ["a", "b"], "a", None), 30);

        assert_matches!(result, Err(Error::Validation(_)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_question_limit() {
        let mut set = QuestionSet::default();
        for i in 0..MAX_QUESTION_COUNT {
            set.add(draft(&i.to_string()), 30).unwrap();
        }

        assert_matches!(set.add(draft("extra"), 30), Err(Error::Validation(_)));
    }

    #[test]
    fn test_update_missing_question() {
        let mut set = QuestionSet::default();
        let result = set.update(QuestionId::new(), QuestionUpdate::default());
        assert_matches!(result, Err(Error::NotFound(Missing::Question)));
    }

    #[test]
    fn test_update_changes_prompt() {
        let mut set = QuestionSet::default();
        let id = set.add(draft("one"), 30).unwrap().id();

        let updated = set
            .update(
                id,
                QuestionUpdate {
                    question: Some("uno".to_owned()),
                    ..QuestionUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.prompt(), "uno");
        assert_eq!(set.get(id).map(Question::prompt), Some("uno"));
    }

    #[test]
    fn test_delete() {
        let mut set = QuestionSet::default();
        let id = set.add(draft("one"), 30).unwrap().id();

        assert_eq!(set.delete(id).unwrap().id(), id);
        assert!(set.get(id).is_none());
        assert_matches!(set.delete(id), Err(Error::NotFound(Missing::Question)));
    }

    #[test]
    fn test_all_asked_ignores_order() {
        let mut set = QuestionSet::default();
        assert!(!set.all_asked());

        let first = set.add(draft("one"), 30).unwrap().id();
        let second = set.add(draft("two"), 30).unwrap().id();

        set.get_mut(second).unwrap().activate(Utc::now());
        assert!(!set.all_asked());

        set.get_mut(first).unwrap().activate(Utc::now());
        assert!(set.all_asked());

        set.add(draft("three"), 30).unwrap();
        assert!(!set.all_asked());
    }
}
