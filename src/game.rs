//! Quiz lifecycle and session state management
//!
//! This module contains the main [`Game`] struct, which owns everything a
//! single quiz session knows about: its metadata, questions, participants,
//! scores and the current lifecycle state. Every operation that changes the
//! session also notifies the connected watchers through a `tunnel_finder`.
//!
//! The lifecycle is `Idle -> QuestionActive -> Idle -> ... -> QuizEnded`.
//! Only one question can be live at a time and only the presenter can open
//! or close it.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::{
    TruncatedVec,
    config::Config,
    constants,
    error::{Conflict, Error, Missing, Result},
    leaderboard::{self, Report, ScoreSummary},
    names::Names,
    question::{
        Question, QuestionAnnouncement, QuestionDraft, QuestionId, QuestionUpdate, Response,
    },
    question_set::QuestionSet,
    results::ResultSnapshot,
    scoring::Ledger,
    session_code::SessionCode,
    tunnel::Tunnel,
    watcher::{Id, Participant, Value, ValueKind, Watchers},
};

/// The phase a quiz is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum State {
    /// No question is live, the presenter may edit or start questions
    Idle,
    /// A question is live and accepting answers
    QuestionActive {
        /// The live question, always present in the question set
        question_id: QuestionId,
    },
    /// The quiz is over, no more questions can be started
    QuizEnded,
}

/// Metadata fixed when a session is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Code students use to join
    #[garde(skip)]
    pub code: SessionCode,
    /// Quiz title
    #[garde(length(chars, min = 1, max = constants::session::MAX_TITLE_LENGTH))]
    pub title: String,
    /// Presenter display name
    #[garde(length(chars, min = 1, max = constants::names::MAX_LENGTH))]
    pub presenter_name: String,
    /// Creation time
    #[garde(skip)]
    pub created_at: DateTime<Utc>,
    /// Whatever the join artifact generator produced, or the plain join URL
    #[garde(skip)]
    pub join_artifact: String,
}

impl Session {
    /// Creates session metadata, applying defaults to blank fields
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the title or presenter name is too long.
    pub fn new(
        code: SessionCode,
        title: &str,
        presenter_name: &str,
        join_artifact: String,
    ) -> Result<Self> {
        let or_default = |value: &str, default: &str| match value.trim() {
            "" => default.to_owned(),
            trimmed => trimmed.to_owned(),
        };

        let session = Self {
            code,
            title: or_default(title, constants::session::DEFAULT_TITLE),
            presenter_name: or_default(presenter_name, constants::session::DEFAULT_PRESENTER_NAME),
            created_at: Utc::now(),
            join_artifact,
        };
        session.validate()?;

        Ok(session)
    }
}

/// Per-session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Time limit for questions added without one
    #[garde(range(
        min = constants::question::MIN_TIME_LIMIT,
        max = constants::question::MAX_TIME_LIMIT
    ))]
    pub default_time_limit: u32,
    /// Entries on the leaderboard sent when the quiz ends
    #[garde(range(min = 1, max = constants::leaderboard::MAX_TOP_N))]
    pub leaderboard_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_time_limit: constants::question::DEFAULT_TIME_LIMIT,
            leaderboard_size: constants::leaderboard::DEFAULT_TOP_N,
        }
    }
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        Self {
            default_time_limit: config.default_time_limit,
            leaderboard_size: config.leaderboard_size,
        }
    }
}

/// A quiz session
///
/// Holds the session metadata, the ordered questions, every watcher, the
/// score ledger and the lifecycle state. Callers must serialize access to
/// a `Game`; the registry keeps each one behind its own lock.
#[derive(Serialize, Deserialize)]
pub struct Game {
    /// Fixed metadata
    session: Session,
    /// Questions in the order they were added
    questions: QuestionSet,
    /// The presenter and every participant
    pub watchers: Watchers,
    /// Participant display names
    names: Names,
    /// Score records, one per participant
    ledger: Ledger,
    /// Current phase
    pub state: State,
    /// Session settings
    options: Options,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("session", &self.session)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Messages received from watchers
///
/// The outer variant names the role the sender must have.
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Commands only the presenter may issue
    Presenter(IncomingPresenterMessage),
    /// Messages from participants
    Participant(IncomingParticipantMessage),
}

impl IncomingMessage {
    /// Checks that the message matches the sender's role
    fn follows(&self, sender_kind: ValueKind) -> bool {
        matches!(
            (self, sender_kind),
            (IncomingMessage::Presenter(_), ValueKind::Presenter)
                | (IncomingMessage::Participant(_), ValueKind::Participant)
        )
    }

    /// The error reported when the sender does not have the required role
    fn missing_role(&self) -> Missing {
        match self {
            IncomingMessage::Presenter(_) => Missing::Presenter,
            IncomingMessage::Participant(_) => Missing::Participant,
        }
    }
}

/// Commands issued by the presenter
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all_fields = "camelCase")]
pub enum IncomingPresenterMessage {
    /// Append a new question
    AddQuestion(QuestionDraft),
    /// Change fields of an idle question
    UpdateQuestion {
        /// Question to change
        question_id: QuestionId,
        /// Fields to change
        update: QuestionUpdate,
    },
    /// Remove an idle question
    DeleteQuestion(QuestionId),
    /// Open a question for answers
    StartQuestion(QuestionId),
    /// Close the live question
    ///
    /// Whether this ends the quiz is decided from the question list.
    EndQuestion,
    /// Finish the quiz before the last question
    EndQuiz,
    /// Fetch the leaderboard, optionally with a custom size
    GetLeaderboard(Option<usize>),
    /// Fetch the full report
    GetReport,
    /// Fetch results of any question
    GetResults(QuestionId),
    /// Fetch the presenter view of the session
    GetSession,
}

/// Messages sent by participants
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all_fields = "camelCase")]
pub enum IncomingParticipantMessage {
    /// Answer the live question
    SubmitAnswer {
        /// The question being answered
        question_id: QuestionId,
        /// The chosen option
        answer: String,
    },
}

/// Confirmation sent to a participant after joining
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Joined {
    /// The participant's id, to be used for reconnection
    pub id: Id,
    /// The accepted (trimmed) display name
    pub name: String,
    /// Quiz title
    pub title: String,
    /// Presenter display name
    pub presenter_name: String,
}

/// Acknowledgement of a submitted answer
///
/// Never says whether the answer was correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAck {
    /// The answered question
    pub question_id: QuestionId,
    /// The stored answer
    pub answer: String,
}

/// Outcome of closing a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEnded {
    /// Final results of the question
    pub results: ResultSnapshot,
    /// Whether this was the last question and the quiz is now over
    pub quiz_ended: bool,
}

/// A participant as listed in the presenter view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEntry {
    /// Participant id
    pub id: Id,
    /// Participant data
    #[serde(flatten)]
    pub participant: Participant,
}

/// Everything the presenter needs to render a session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session metadata
    #[serde(flatten)]
    pub session: Session,
    /// Questions, correct answers included
    pub questions: Vec<Question>,
    /// Participants in join order
    pub participants: Vec<ParticipantEntry>,
    /// Index of the live question
    pub active_question_index: Option<usize>,
    /// Current phase
    pub state: State,
}

/// Replies to an [`IncomingMessage`], returned to its sender
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum Reply {
    /// A question after it was added or updated
    Question(Question),
    /// The removed question
    QuestionDeleted(QuestionId),
    /// The question that was started, as participants see it
    QuestionStarted(QuestionAnnouncement),
    /// The closed question's results
    QuestionEnded(QuestionEnded),
    /// The leaderboard
    Leaderboard(TruncatedVec<ScoreSummary>),
    /// The full report
    Report(Report),
    /// Results of a question
    Results(ResultSnapshot),
    /// The presenter view
    Session(SessionSnapshot),
    /// Acknowledgement of an answer
    AnswerAccepted(AnswerAck),
}

/// Update messages sent to watchers when the session changes
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all_fields = "camelCase")]
pub enum UpdateMessage {
    /// The number of questions changed (participants)
    QuestionsChanged {
        /// New number of questions
        count: usize,
    },
    /// A question was added (presenter)
    QuestionAdded(Question),
    /// A question was edited (presenter)
    QuestionUpdated(Question),
    /// A question was removed (presenter)
    QuestionDeleted(QuestionId),
    /// A question is now live, correct answer withheld
    QuestionStarted(QuestionAnnouncement),
    /// The live question closed, correct answer disclosed
    QuestionEnded(ResultSnapshot),
    /// The quiz is over
    QuizEnded {
        /// The recipient's own score, absent for the presenter
        score: Option<ScoreSummary>,
        /// Top of the leaderboard
        leaderboard: TruncatedVec<ScoreSummary>,
    },
    /// Someone joined
    ParticipantJoined {
        /// Their display name
        name: String,
        /// Participants now in the session
        count: usize,
    },
    /// Someone left
    ParticipantLeft {
        /// Their display name
        name: String,
        /// Participants now in the session
        count: usize,
    },
    /// Confirms a join to the participant who joined
    Joined(Joined),
    /// Confirms an answer to the participant who sent it
    AnswerAccepted(AnswerAck),
    /// Live results after each answer (presenter)
    ResultsUpdate(ResultSnapshot),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Sync messages bringing a watcher's view up to date
///
/// Sent after joining and on reconnection.
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all_fields = "camelCase")]
pub enum SyncMessage {
    /// Full presenter view
    Session(Box<SessionSnapshot>),
    /// Participant waiting for the next question
    Waiting {
        /// Quiz title
        title: String,
        /// Presenter display name
        presenter_name: String,
        /// Participants in the session
        count: usize,
    },
    /// Participant during a live question
    Question {
        /// The live question, correct answer withheld
        question: QuestionAnnouncement,
        /// The participant's current answer, if any
        answer: Option<String>,
    },
    /// Participant after the quiz ended
    QuizEnded {
        /// The participant's own score
        score: Option<ScoreSummary>,
        /// Top of the leaderboard
        leaderboard: TruncatedVec<ScoreSummary>,
    },
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

// Convenience methods
impl Game {
    /// Number of participants in the session
    fn participant_count(&self) -> usize {
        self.watchers.specific_count(ValueKind::Participant)
    }

    /// The live question, if any
    fn active_question_id(&self) -> Option<QuestionId> {
        match self.state {
            State::QuestionActive { question_id } => Some(question_id),
            State::Idle | State::QuizEnded => None,
        }
    }

    /// Rejects changes to the live question
    fn ensure_not_active(&self, question_id: QuestionId) -> Result<()> {
        if self.active_question_id() == Some(question_id) {
            return Err(Conflict::QuestionLocked.into());
        }
        Ok(())
    }

    /// Score summary of a participant
    fn score(&self, watcher_id: Id) -> Option<ScoreSummary> {
        self.ledger.get(watcher_id).map(ScoreSummary::from)
    }

    /// Pushes fresh results of the live question to the presenter
    fn update_presenter_results<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        let Some(question) = self
            .active_question_id()
            .and_then(|question_id| self.questions.get(question_id))
        else {
            return;
        };

        self.watchers.announce_specific(
            ValueKind::Presenter,
            &UpdateMessage::ResultsUpdate(ResultSnapshot::compute(question, &self.ledger)),
            tunnel_finder,
        );
    }

    /// Notifies the presenter of a question change and participants of the
    /// new question count
    fn announce_question_change<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        presenter_message: UpdateMessage,
        tunnel_finder: F,
    ) {
        let count = self.questions.len();
        self.watchers.announce_with(
            |_, kind| {
                Some(match kind {
                    ValueKind::Presenter => presenter_message.clone(),
                    ValueKind::Participant => UpdateMessage::QuestionsChanged { count },
                })
            },
            tunnel_finder,
        );
    }

    /// Ends the quiz and sends everyone the final standings
    fn finish<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.state = State::QuizEnded;

        let leaderboard = self.leaderboard(None);

        self.watchers.announce_with(
            |id, kind| {
                Some(UpdateMessage::QuizEnded {
                    score: match kind {
                        ValueKind::Participant => self.score(id),
                        ValueKind::Presenter => None,
                    },
                    leaderboard: leaderboard.clone(),
                })
            },
            tunnel_finder,
        );

        tracing::info!(
            code = %self.session.code,
            participants = self.participant_count(),
            "quiz ended"
        );
    }
}

impl Game {
    /// Creates a new session with the presenter already registered
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quizroom::game::{Game, Options, Session, State};
    /// use quizroom::session_code::SessionCode;
    /// use quizroom::watcher::Id;
    ///
    /// let session = Session::new(SessionCode::new(), "Quiz 1", "Ms. X", String::new()).unwrap();
    /// let game = Game::new(session, Options::default(), Id::new());
    /// assert_eq!(game.state, State::Idle);
    /// ```
    pub fn new(session: Session, options: Options, presenter_id: Id) -> Self {
        Self {
            session,
            questions: QuestionSet::default(),
            watchers: Watchers::with_presenter_id(presenter_id),
            names: Names::default(),
            ledger: Ledger::default(),
            state: State::Idle,
            options,
        }
    }

    /// Session metadata
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The session's questions
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    /// The session's score records
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // Questions

    /// Adds a question to the end of the list
    ///
    /// The presenter receives the full question, participants only the new
    /// question count.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the draft is malformed.
    pub fn add_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        draft: QuestionDraft,
        tunnel_finder: F,
    ) -> Result<Question> {
        let question = self
            .questions
            .add(draft, self.options.default_time_limit)?
            .clone();

        tracing::debug!(code = %self.session.code, question = %question.id(), "question added");

        self.announce_question_change(UpdateMessage::QuestionAdded(question.clone()), tunnel_finder);

        Ok(question)
    }

    /// Applies a partial update to a question that is not live
    ///
    /// # Errors
    ///
    /// * `Error::NotFound` - No such question
    /// * `Error::Conflict` - The question is live
    /// * `Error::Validation` - The merged question is malformed
    pub fn update_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        question_id: QuestionId,
        update: QuestionUpdate,
        tunnel_finder: F,
    ) -> Result<Question> {
        if self.questions.get(question_id).is_none() {
            return Err(Missing::Question.into());
        }
        self.ensure_not_active(question_id)?;

        let question = self.questions.update(question_id, update)?.clone();

        self.watchers.announce_specific(
            ValueKind::Presenter,
            &UpdateMessage::QuestionUpdated(question.clone()),
            tunnel_finder,
        );

        Ok(question)
    }

    /// Removes a question that is not live
    ///
    /// # Errors
    ///
    /// * `Error::NotFound` - No such question
    /// * `Error::Conflict` - The question is live
    pub fn delete_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        question_id: QuestionId,
        tunnel_finder: F,
    ) -> Result<Question> {
        if self.questions.get(question_id).is_none() {
            return Err(Missing::Question.into());
        }
        self.ensure_not_active(question_id)?;

        let question = self.questions.delete(question_id)?;

        self.announce_question_change(UpdateMessage::QuestionDeleted(question_id), tunnel_finder);

        Ok(question)
    }

    // Lifecycle

    /// Opens a question for answers
    ///
    /// Forgets the question's previous responses and every participant's
    /// pending answer, stamps the start time, and broadcasts the question
    /// without its correct answer.
    ///
    /// # Errors
    ///
    /// * `Error::Conflict` - A question is already live, or the quiz ended
    /// * `Error::NotFound` - No such question
    pub fn start_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        question_id: QuestionId,
        tunnel_finder: F,
    ) -> Result<QuestionAnnouncement> {
        match self.state {
            State::QuestionActive { .. } => return Err(Conflict::QuestionActive.into()),
            State::QuizEnded => return Err(Conflict::QuizEnded.into()),
            State::Idle => {}
        }

        let index = self
            .questions
            .index_of(question_id)
            .ok_or(Missing::Question)?;
        let count = self.questions.len();

        let question = self
            .questions
            .get_mut(question_id)
            .ok_or(Missing::Question)?;
        question.activate(Utc::now());
        let announcement = question.announcement(index, count);

        self.watchers.clear_current_answers();
        self.state = State::QuestionActive { question_id };

        self.watchers.announce(
            &UpdateMessage::QuestionStarted(announcement.clone()),
            tunnel_finder,
        );

        tracing::info!(
            code = %self.session.code,
            question = %question_id,
            index,
            count,
            "question started"
        );

        Ok(announcement)
    }

    /// Closes the live question and discloses its results
    ///
    /// Once every question in the list has been asked, in any order, closing
    /// a question also ends the quiz. Every participant is then sent their
    /// own score and the top of the leaderboard.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if no question is live.
    pub fn end_question<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        tunnel_finder: F,
    ) -> Result<QuestionEnded> {
        let question_id = self
            .active_question_id()
            .ok_or(Conflict::NoActiveQuestion)?;
        let question = self
            .questions
            .get(question_id)
            .ok_or(Missing::Question)?;

        let results = ResultSnapshot::compute(question, &self.ledger);
        self.state = State::Idle;

        self.watchers.announce(
            &UpdateMessage::QuestionEnded(results.clone()),
            &tunnel_finder,
        );

        tracing::info!(
            code = %self.session.code,
            question = %question_id,
            responses = results.total_responses,
            "question ended"
        );

        let quiz_ended = self.questions.all_asked();
        if quiz_ended {
            self.finish(&tunnel_finder);
        }

        Ok(QuestionEnded {
            results,
            quiz_ended,
        })
    }

    /// Ends the quiz while no question is live
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if a question is live or the quiz already
    /// ended.
    pub fn end_quiz<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) -> Result<Report> {
        match self.state {
            State::QuestionActive { .. } => Err(Conflict::QuestionActive.into()),
            State::QuizEnded => Err(Conflict::QuizEnded.into()),
            State::Idle => {
                self.finish(tunnel_finder);
                Ok(self.report())
            }
        }
    }

    // Participants

    /// Adds a participant to the session
    ///
    /// The participant receives a [`Joined`] confirmation followed by the
    /// current state; everyone is told the new participant count.
    ///
    /// # Errors
    ///
    /// * `Error::Conflict` - The name is taken, the session is full, the
    ///   quiz ended, or `watcher_id` is already the presenter or a participant
    /// * `Error::Validation` - The name is empty, too long or inappropriate
    pub fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        name: &str,
        tunnel_finder: F,
    ) -> Result<Joined> {
        if self.state == State::QuizEnded {
            return Err(Conflict::QuizEnded.into());
        }
        if self.watchers.has_watcher(watcher_id) {
            return Err(Conflict::AlreadyJoined.into());
        }

        let name = self.names.set_name(watcher_id, name)?;

        if let Err(error) = self.watchers.add_watcher(
            watcher_id,
            Value::Participant(Participant::new(name.clone())),
        ) {
            self.names.remove(&watcher_id);
            return Err(error.into());
        }

        self.ledger.enroll(watcher_id, name.clone());

        let joined = Joined {
            id: watcher_id,
            name: name.clone(),
            title: self.session.title.clone(),
            presenter_name: self.session.presenter_name.clone(),
        };

        self.watchers.send_message(
            &UpdateMessage::Joined(joined.clone()),
            watcher_id,
            &tunnel_finder,
        );
        self.watchers.send_state(
            &self.state_message(watcher_id, ValueKind::Participant),
            watcher_id,
            &tunnel_finder,
        );

        let count = self.participant_count();
        self.watchers.announce(
            &UpdateMessage::ParticipantJoined { name, count },
            &tunnel_finder,
        );

        tracing::debug!(code = %self.session.code, participant = %watcher_id, count, "participant joined");

        Ok(joined)
    }

    /// Removes a participant together with their score record
    ///
    /// An answer they gave to the live question is dropped as well. The presenter is never removed. Returns the departed participant's
    /// name, or `None` if `watcher_id` is not a participant.
    pub fn leave<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> Option<String> {
        self.watchers.participant(watcher_id)?;
        let Some(Value::Participant(participant)) = self.watchers.remove_watcher(watcher_id) else {
            return None;
        };

        self.names.remove(&watcher_id);
        self.ledger.remove(watcher_id);
        if let Some(question) = self
            .active_question_id()
            .and_then(|question_id| self.questions.get_mut(question_id))
        {
            question.forget_response(watcher_id);
        }

        let count = self.participant_count();
        self.watchers.announce(
            &UpdateMessage::ParticipantLeft {
                name: participant.name.clone(),
                count,
            },
            &tunnel_finder,
        );
        self.update_presenter_results(&tunnel_finder);

        tracing::debug!(code = %self.session.code, participant = %watcher_id, count, "participant left");

        Some(participant.name)
    }

    /// Records a participant's answer to the live question
    ///
    /// The first answer per question is scored; later ones replace the
    /// stored answer without touching the score. The participant gets an
    /// acknowledgement that never reveals correctness, and the presenter
    /// gets fresh results.
    ///
    /// # Errors
    ///
    /// * `Error::NotFound` - Unknown participant or question
    /// * `Error::Conflict` - The question is not the live one
    /// * `Error::Validation` - The answer is not one of the options
    pub fn submit_answer<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        question_id: QuestionId,
        answer: &str,
        submitted_at: DateTime<Utc>,
        tunnel_finder: F,
    ) -> Result<AnswerAck> {
        let name = self
            .watchers
            .get_name(watcher_id)
            .ok_or(Missing::Participant)?;

        if self.questions.get(question_id).is_none() {
            return Err(Missing::Question.into());
        }
        if self.active_question_id() != Some(question_id) {
            return Err(Conflict::QuestionClosed.into());
        }

        let question = self
            .questions
            .get_mut(question_id)
            .ok_or(Missing::Question)?;
        if !question.has_option(answer) {
            return Err(Error::Validation(format!(
                "'{answer}' is not an option of this question"
            )));
        }

        let outcome = self
            .ledger
            .record_answer(watcher_id, question, answer, submitted_at)?;

        question.record_response(Response {
            participant_id: watcher_id,
            participant_name: name,
            answer: answer.to_owned(),
            submitted_at,
        });
        if let Some(participant) = self.watchers.participant_mut(watcher_id) {
            participant.current_answer = Some(answer.to_owned());
        }

        tracing::debug!(
            code = %self.session.code,
            participant = %watcher_id,
            question = %question_id,
            correct = outcome.correct,
            counted = outcome.counted,
            "answer received"
        );

        let ack = AnswerAck {
            question_id,
            answer: answer.to_owned(),
        };

        self.watchers.send_message(
            &UpdateMessage::AnswerAccepted(ack.clone()),
            watcher_id,
            &tunnel_finder,
        );
        self.update_presenter_results(&tunnel_finder);

        Ok(ack)
    }

    // Aggregates

    /// Results of any question, computed now
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if there is no such question.
    pub fn results(&self, question_id: QuestionId) -> Result<ResultSnapshot> {
        let question = self
            .questions
            .get(question_id)
            .ok_or(Missing::Question)?;
        Ok(ResultSnapshot::compute(question, &self.ledger))
    }

    /// The top of the leaderboard
    ///
    /// `top_n` defaults to the session's leaderboard size and is capped.
    pub fn leaderboard(&self, top_n: Option<usize>) -> TruncatedVec<ScoreSummary> {
        let top_n = top_n
            .unwrap_or(self.options.leaderboard_size)
            .min(constants::leaderboard::MAX_TOP_N);
        leaderboard::compute_leaderboard(&self.ledger, top_n)
    }

    /// The full report of the session
    pub fn report(&self) -> Report {
        Report {
            session_code: self.session.code,
            title: self.session.title.clone(),
            presenter_name: self.session.presenter_name.clone(),
            created_at: self.session.created_at,
            total_questions: self.questions.len(),
            total_participants: self.participant_count(),
            participants: leaderboard::standings(&self.ledger),
        }
    }

    /// The presenter view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            questions: self.questions.iter().cloned().collect_vec(),
            participants: self
                .ledger
                .roster()
                .filter_map(|(id, _)| {
                    Some(ParticipantEntry {
                        id,
                        participant: self.watchers.participant(id)?.clone(),
                    })
                })
                .collect_vec(),
            active_question_index: self
                .active_question_id()
                .and_then(|question_id| self.questions.index_of(question_id)),
            state: self.state,
        }
    }

    // Network

    /// Handles a message from a watcher
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the sender is unknown or does not have
    /// the role the message requires, and whatever the handler returns
    /// otherwise.
    pub fn receive_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        tunnel_finder: F,
    ) -> Result<Reply> {
        let sender_kind = self
            .watchers
            .get_watcher_value(watcher_id)
            .map(|value| value.kind());

        if !sender_kind.is_some_and(|kind| message.follows(kind)) {
            return Err(message.missing_role().into());
        }

        let reply = match message {
            IncomingMessage::Presenter(command) => match command {
                IncomingPresenterMessage::AddQuestion(draft) => {
                    self.add_question(draft, tunnel_finder).map(Reply::from)
                }
                IncomingPresenterMessage::UpdateQuestion {
                    question_id,
                    update,
                } => self
                    .update_question(question_id, update, tunnel_finder)
                    .map(Reply::from),
                IncomingPresenterMessage::DeleteQuestion(question_id) => self
                    .delete_question(question_id, tunnel_finder)
                    .map(|question| Reply::QuestionDeleted(question.id())),
                IncomingPresenterMessage::StartQuestion(question_id) => self
                    .start_question(question_id, tunnel_finder)
                    .map(Reply::from),
                IncomingPresenterMessage::EndQuestion => {
                    self.end_question(tunnel_finder).map(Reply::from)
                }
                IncomingPresenterMessage::EndQuiz => self.end_quiz(tunnel_finder).map(Reply::from),
                IncomingPresenterMessage::GetLeaderboard(top_n) => {
                    Ok(Reply::from(self.leaderboard(top_n)))
                }
                IncomingPresenterMessage::GetReport => Ok(Reply::from(self.report())),
                IncomingPresenterMessage::GetResults(question_id) => {
                    self.results(question_id).map(Reply::from)
                }
                IncomingPresenterMessage::GetSession => Ok(Reply::from(self.snapshot())),
            },
            IncomingMessage::Participant(IncomingParticipantMessage::SubmitAnswer {
                question_id,
                answer,
            }) => self
                .submit_answer(watcher_id, question_id, &answer, Utc::now(), tunnel_finder)
                .map(Reply::from),
        };

        if let Err(error) = &reply {
            tracing::debug!(code = %self.session.code, watcher = %watcher_id, %error, "message rejected");
        }

        reply
    }

    /// Returns the message that brings a watcher's view up to date
    pub fn state_message(&self, watcher_id: Id, watcher_kind: ValueKind) -> SyncMessage {
        if watcher_kind == ValueKind::Presenter {
            return SyncMessage::Session(Box::new(self.snapshot()));
        }

        match self.state {
            State::Idle => SyncMessage::Waiting {
                title: self.session.title.clone(),
                presenter_name: self.session.presenter_name.clone(),
                count: self.participant_count(),
            },
            State::QuestionActive { question_id } => {
                let announcement = self.questions.index_of(question_id).and_then(|index| {
                    self.questions
                        .get(question_id)
                        .map(|question| question.announcement(index, self.questions.len()))
                });
                match announcement {
                    Some(question) => SyncMessage::Question {
                        question,
                        answer: self
                            .watchers
                            .participant(watcher_id)
                            .and_then(|participant| participant.current_answer.clone()),
                    },
                    None => SyncMessage::Waiting {
                        title: self.session.title.clone(),
                        presenter_name: self.session.presenter_name.clone(),
                        count: self.participant_count(),
                    },
                }
            }
            State::QuizEnded => SyncMessage::QuizEnded {
                score: self.score(watcher_id),
                leaderboard: self.leaderboard(None),
            },
        }
    }

    /// Resends the current state to a reconnecting watcher
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(watcher_value) = self.watchers.get_watcher_value(watcher_id) else {
            return;
        };

        if let Value::Participant(participant) = &watcher_value {
            self.watchers.send_message(
                &UpdateMessage::Joined(Joined {
                    id: watcher_id,
                    name: participant.name.clone(),
                    title: self.session.title.clone(),
                    presenter_name: self.session.presenter_name.clone(),
                }),
                watcher_id,
                &tunnel_finder,
            );
        }

        self.watchers.send_state(
            &self.state_message(watcher_id, watcher_value.kind()),
            watcher_id,
            tunnel_finder,
        );
    }
}
