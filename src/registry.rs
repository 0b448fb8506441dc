//! Session registry
//!
//! The registry owns every live session. Each session sits behind its own
//! lock, so commands for one session never wait on another. The registry
//! also remembers which session every watcher belongs to, which lets a
//! transport route a message knowing only the sender's id.

use std::sync::Arc;

use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    config::Config,
    error::{Error, Missing, Result},
    game::{AnswerAck, Game, IncomingMessage, Joined, Options, Reply, Session, SessionSnapshot},
    join_artifact::{JoinArtifactGenerator, PlainUrl, generate_or_fallback},
    question::QuestionId,
    session_code::SessionCode,
    tunnel::Tunnel,
    watcher::Id,
};

/// Shared handle to one session
pub type SharedGame = Arc<Mutex<Game>>;

/// What the presenter gets back after creating a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    /// Code students join with
    pub code: SessionCode,
    /// Final title, after defaults
    pub title: String,
    /// Final presenter name, after defaults
    pub presenter_name: String,
    /// URL students open to join
    pub join_url: String,
    /// Generated join artifact, or the join URL if generation failed
    pub join_artifact: String,
    /// The presenter's watcher id, needed to issue commands
    pub presenter_id: Id,
}

/// Owner of every session in the process
pub struct Registry {
    config: Config,
    options: Options,
    artifacts: Box<dyn JoinArtifactGenerator + Send + Sync>,
    sessions: DashMap<SessionCode, SharedGame>,
    seats: DashMap<Id, SessionCode>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Registry {
    /// Creates a registry that uses the join URL as the join artifact
    pub fn new(config: Config) -> Self {
        Self::with_generator(config, PlainUrl)
    }

    /// Creates a registry with a custom join artifact generator
    pub fn with_generator<G>(config: Config, generator: G) -> Self
    where
        G: JoinArtifactGenerator + Send + Sync + 'static,
    {
        Self {
            options: Options::from(&config),
            config,
            artifacts: Box::new(generator),
            sessions: DashMap::new(),
            seats: DashMap::new(),
        }
    }

    /// The registry's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a session with a fresh code
    ///
    /// Blank titles and presenter names get defaults. The join artifact is
    /// produced once; if the generator fails the plain join URL is stored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the title or presenter name is too long.
    pub fn create_session(&self, title: &str, presenter_name: &str) -> Result<SessionCreated> {
        let presenter_id = Id::new();

        loop {
            let code = SessionCode::new();
            if self.sessions.contains_key(&code) {
                continue;
            }

            let mut session = Session::new(code, title, presenter_name, String::new())?;
            let join_url = self.config.join_url(code.as_str());
            session.join_artifact = generate_or_fallback(&*self.artifacts, &join_url);

            // the code may have been taken while the artifact was generated
            let Entry::Vacant(entry) = self.sessions.entry(code) else {
                continue;
            };

            let created = SessionCreated {
                code,
                title: session.title.clone(),
                presenter_name: session.presenter_name.clone(),
                join_url,
                join_artifact: session.join_artifact.clone(),
                presenter_id,
            };

            entry.insert(Arc::new(Mutex::new(Game::new(
                session,
                self.options,
                presenter_id,
            ))));
            self.seats.insert(presenter_id, code);

            tracing::info!(%code, title = %created.title, "session created");

            return Ok(created);
        }
    }

    /// Gets the shared handle of a session
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if there is no such session.
    pub fn session(&self, code: SessionCode) -> Result<SharedGame> {
        self.sessions
            .get(&code)
            .map(|game| Arc::clone(game.value()))
            .ok_or(Error::NotFound(Missing::Session))
    }

    /// Gets the presenter view of a session
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if there is no such session.
    pub fn get_session(&self, code: SessionCode) -> Result<SessionSnapshot> {
        Ok(self.session(code)?.lock().snapshot())
    }

    /// The session a watcher belongs to
    fn seat(&self, watcher_id: Id, missing: Missing) -> Result<(SessionCode, SharedGame)> {
        let code = self
            .seats
            .get(&watcher_id)
            .map(|seat| *seat.value())
            .ok_or(missing)?;
        Ok((code, self.session(code)?))
    }

    /// Adds a participant to a session
    ///
    /// `watcher_id` is chosen by the transport before joining, typically
    /// one per connection, so the tunnel finder can already reach it. The
    /// seat is claimed before the session is touched and released again if
    /// the join fails.
    ///
    /// # Errors
    ///
    /// * `Error::NotFound` - No such session
    /// * `Error::Conflict` - Name taken, session full, or quiz ended
    /// * `Error::Validation` - Bad name, or the id already joined a session
    pub fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        code: SessionCode,
        name: &str,
        tunnel_finder: F,
    ) -> Result<Joined> {
        match self.seats.entry(watcher_id) {
            Entry::Occupied(_) => {
                return Err(Error::Validation(
                    "this connection already joined a session".to_owned(),
                ));
            }
            Entry::Vacant(seat) => {
                seat.insert(code);
            }
        }

        let joined = self
            .session(code)
            .and_then(|game| game.lock().join(watcher_id, name, tunnel_finder));
        if joined.is_err() {
            self.seats.remove(&watcher_id);
        }

        joined
    }

    /// Records an answer from a participant, stamped with the current time
    ///
    /// # Errors
    ///
    /// See [`Game::submit_answer`]; `Error::NotFound` also covers a sender
    /// that never joined.
    pub fn submit_answer<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        question_id: QuestionId,
        answer: &str,
        tunnel_finder: F,
    ) -> Result<AnswerAck> {
        let (_, game) = self.seat(watcher_id, Missing::Participant)?;
        game.lock()
            .submit_answer(watcher_id, question_id, answer, Utc::now(), tunnel_finder)
    }

    /// Handles a message from a presenter or participant
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the sender has no session, and whatever
    /// [`Game::receive_message`] returns otherwise.
    pub fn receive_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        message: IncomingMessage,
        tunnel_finder: F,
    ) -> Result<Reply> {
        let missing = match &message {
            IncomingMessage::Presenter(_) => Missing::Presenter,
            IncomingMessage::Participant(_) => Missing::Participant,
        };
        let (_, game) = self.seat(watcher_id, missing)?;
        game.lock()
            .receive_message(watcher_id, message, tunnel_finder)
    }

    /// Handles a closed connection
    ///
    /// A participant is removed from their session together with their
    /// score. The presenter keeps their seat so they can reconnect.
    pub fn disconnect<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, watcher_id: Id, tunnel_finder: F) {
        let Ok((code, game)) = self.seat(watcher_id, Missing::Participant) else {
            return;
        };

        let left = game.lock().leave(watcher_id, tunnel_finder);
        match left {
            Some(_) => {
                self.seats.remove(&watcher_id);
            }
            None => tracing::debug!(%code, watcher = %watcher_id, "presenter disconnected"),
        }
    }

    /// Resends the current state to a reconnecting watcher
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the watcher has no session.
    pub fn resync<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        tunnel_finder: F,
    ) -> Result<()> {
        let (_, game) = self.seat(watcher_id, Missing::Participant)?;
        game.lock().update_session(watcher_id, tunnel_finder);
        Ok(())
    }
}
