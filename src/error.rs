//! Error types shared by every quiz operation
//!
//! Errors are serializable so a transport can forward them to the caller
//! unchanged. None of them is fatal: the session that produced one stays
//! usable.

use serde::Serialize;
use thiserror::Error;

use crate::{names, watcher};

/// The kind of entity an operation could not find
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// No session with the given code
    #[error("session")]
    Session,
    /// No question with the given id in the session
    #[error("question")]
    Question,
    /// The sender is not a participant of the session
    #[error("participant")]
    Participant,
    /// The sender is not the presenter of the session
    #[error("presenter")]
    Presenter,
}

/// Requests that are well-formed but clash with the current session state
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// A question is already live
    #[error("another question is already active")]
    QuestionActive,
    /// Ending a question while none is live
    #[error("no question is active")]
    NoActiveQuestion,
    /// Editing or deleting the live question
    #[error("the active question cannot be modified")]
    QuestionLocked,
    /// Answering a question whose window is closed
    #[error("question not active")]
    QuestionClosed,
    /// The display name is taken within the session
    #[error("name already in use")]
    NameTaken,
    /// The quiz has already been finished
    #[error("the quiz has ended")]
    QuizEnded,
    /// The session reached its participant limit
    #[error("maximum number of participants reached")]
    SessionFull,
    /// The id is already the presenter or a participant
    #[error("already joined this session")]
    AlreadyJoined,
}

/// Errors returned by quiz operations
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unknown session, question or participant
    #[error("{0} not found")]
    NotFound(Missing),
    /// Malformed input, rejected before any state was touched
    #[error("validation failed: {0}")]
    Validation(String),
    /// The request clashes with the session state
    #[error(transparent)]
    Conflict(#[from] Conflict),
    /// An external collaborator is unavailable
    #[error("collaborator unavailable: {0}")]
    Connection(String),
}

impl From<Missing> for Error {
    fn from(missing: Missing) -> Self {
        Self::NotFound(missing)
    }
}

impl From<garde::Report> for Error {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

impl From<names::Error> for Error {
    fn from(error: names::Error) -> Self {
        match error {
            names::Error::Used => Conflict::NameTaken.into(),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<watcher::Error> for Error {
    fn from(error: watcher::Error) -> Self {
        match error {
            watcher::Error::MaximumParticipants => Conflict::SessionFull.into(),
            watcher::Error::AlreadyJoined => Conflict::AlreadyJoined.into(),
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
