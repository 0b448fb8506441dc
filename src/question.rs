//! Multiple choice questions
//!
//! A question is owned by exactly one session. It carries the secret correct
//! answer, which only ever leaves the engine through presenter-facing
//! messages or after the question has ended. Participants get the redacted
//! [`QuestionAnnouncement`] instead.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay, skip_serializing_none};
use uuid::Uuid;

use crate::{
    constants::question::{
        MAX_OPTION_COUNT, MAX_OPTION_LENGTH, MAX_PROMPT_LENGTH, MAX_TIME_LIMIT, MIN_OPTION_COUNT,
        MIN_PROMPT_LENGTH, MIN_TIME_LIMIT,
    },
    error::{Error, Result},
    watcher::Id,
};

/// A unique identifier for a question
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// Creates a new random question ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuestionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The fields a presenter supplies when adding a question
///
/// Blank options are dropped and all text is trimmed before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    /// The prompt shown to participants
    #[garde(length(chars, min = MIN_PROMPT_LENGTH, max = MAX_PROMPT_LENGTH))]
    pub question: String,
    /// The answer options, in display order
    #[garde(
        length(min = MIN_OPTION_COUNT, max = MAX_OPTION_COUNT),
        inner(length(chars, max = MAX_OPTION_LENGTH))
    )]
    pub options: Vec<String>,
    /// The option that scores
    #[garde(skip)]
    pub correct_answer: String,
    /// Seconds participants have to answer, the session default if absent
    #[garde(range(min = MIN_TIME_LIMIT, max = MAX_TIME_LIMIT))]
    #[serde(default)]
    pub time_limit: Option<u32>,
}

impl QuestionDraft {
    /// Creates a draft from its parts
    pub fn new<S: Into<String>, O: IntoIterator<Item = S>>(
        question: impl Into<String>,
        options: O,
        correct_answer: impl Into<String>,
        time_limit: Option<u32>,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect_vec(),
            correct_answer: correct_answer.into(),
            time_limit,
        }
    }

    /// Trims every text field and drops blank options
    fn normalize(self) -> Self {
        Self {
            question: self.question.trim().to_owned(),
            options: self
                .options
                .iter()
                .map(|option| option.trim())
                .filter(|option| !option.is_empty())
                .map(str::to_owned)
                .collect_vec(),
            correct_answer: self.correct_answer.trim().to_owned(),
            time_limit: self.time_limit,
        }
    }

    /// Normalizes and validates the draft
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` when the prompt is empty, fewer than two
    /// non-empty options remain, options repeat, limits are exceeded, or the
    /// correct answer is not one of the options.
    fn checked(self) -> Result<Self> {
        let draft = self.normalize();

        draft.validate()?;

        if !draft.options.iter().all_unique() {
            return Err(Error::Validation("options must be distinct".to_owned()));
        }
        if !draft.options.contains(&draft.correct_answer) {
            return Err(Error::Validation(
                "correct answer must be one of the options".to_owned(),
            ));
        }

        Ok(draft)
    }
}

/// A partial change to an existing question
///
/// Absent fields keep their current value. The merged result is validated
/// as a whole, so changing the options without keeping the correct answer
/// among them is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionUpdate {
    /// New prompt
    pub question: Option<String>,
    /// New options
    pub options: Option<Vec<String>>,
    /// New correct answer
    pub correct_answer: Option<String>,
    /// New time limit in seconds
    pub time_limit: Option<u32>,
}

/// One participant's latest answer during an activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Who answered
    pub participant_id: Id,
    /// Their display name at the time
    pub participant_name: String,
    /// The chosen option
    pub answer: String,
    /// When the answer arrived
    pub submitted_at: DateTime<Utc>,
}

/// A multiple choice question, including its secret answer
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    id: QuestionId,
    question: String,
    options: Vec<String>,
    correct_answer: String,
    time_limit: u32,
    #[serde(default)]
    responses: Vec<Response>,
    started_at: Option<DateTime<Utc>>,
}

/// What participants see of a question while it is live
///
/// Deliberately lacks the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnnouncement {
    /// The question's id, echoed back with answers
    pub id: QuestionId,
    /// The prompt
    pub question: String,
    /// The options
    pub options: Vec<String>,
    /// Seconds to answer (informational countdown)
    pub time_limit: u32,
    /// Position of the question in the session (0-based)
    pub index: usize,
    /// Number of questions in the session
    pub count: usize,
}

impl Question {
    /// Creates a question from a draft
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the draft is malformed.
    pub fn new(draft: QuestionDraft, default_time_limit: u32) -> Result<Self> {
        let draft = QuestionDraft {
            time_limit: draft.time_limit.or(Some(default_time_limit)),
            ..draft
        }
        .checked()?;

        Ok(Self {
            id: QuestionId::new(),
            question: draft.question,
            options: draft.options,
            correct_answer: draft.correct_answer,
            time_limit: draft.time_limit.unwrap_or(default_time_limit),
            responses: Vec::new(),
            started_at: None,
        })
    }

    /// Applies a partial update, all or nothing
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the merged question is malformed; the
    /// question is left untouched in that case.
    pub fn apply(&mut self, update: QuestionUpdate) -> Result<()> {
        let draft = QuestionDraft {
            question: update.question.unwrap_or_else(|| self.question.clone()),
            options: update.options.unwrap_or_else(|| self.options.clone()),
            correct_answer: update
                .correct_answer
                .unwrap_or_else(|| self.correct_answer.clone()),
            time_limit: Some(update.time_limit.unwrap_or(self.time_limit)),
        }
        .checked()?;

        self.question = draft.question;
        self.options = draft.options;
        self.correct_answer = draft.correct_answer;
        self.time_limit = draft.time_limit.unwrap_or(self.time_limit);

        Ok(())
    }

    /// Returns the question's id
    pub fn id(&self) -> QuestionId {
        self.id
    }

    /// Returns the prompt
    pub fn prompt(&self) -> &str {
        &self.question
    }

    /// Returns the options in display order
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns the secret correct answer
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// Returns the time limit in seconds
    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    /// Returns when the question was last activated
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the responses of the current activation
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Checks whether `answer` is one of the options
    pub fn has_option(&self, answer: &str) -> bool {
        self.options.iter().any(|option| option == answer)
    }

    /// Checks an answer against the correct one (exact match)
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }

    /// Starts a new activation: forgets old responses and stamps the start
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.responses.clear();
        self.started_at = Some(now);
    }

    /// Records a participant's answer, replacing any earlier one
    pub fn record_response(&mut self, response: Response) {
        match self
            .responses
            .iter_mut()
            .find(|r| r.participant_id == response.participant_id)
        {
            Some(existing) => *existing = response,
            None => self.responses.push(response),
        }
    }

    /// Drops the answer of a participant who left during this activation
    pub fn forget_response(&mut self, participant_id: Id) -> Option<Response> {
        let index = self
            .responses
            .iter()
            .position(|r| r.participant_id == participant_id)?;
        Some(self.responses.remove(index))
    }

    /// Gets the latest answer of a participant in this activation
    pub fn response_of(&self, participant_id: Id) -> Option<&Response> {
        self.responses
            .iter()
            .find(|r| r.participant_id == participant_id)
    }

    /// Builds the redacted view sent to participants
    pub fn announcement(&self, index: usize, count: usize) -> QuestionAnnouncement {
        QuestionAnnouncement {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            time_limit: self.time_limit,
            index,
            count,
        }
    }
}
