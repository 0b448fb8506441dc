//! Presenter and participant watcher management
//!
//! This module tracks everyone subscribed to a session: the presenter who
//! drives it and the participants answering questions. It is the explicit
//! subscriber list the broadcast helpers fan out over, so the engine never
//! relies on a transport's own notion of rooms.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    constants,
    game::{SyncMessage, UpdateMessage},
    tunnel::Tunnel,
};

/// A unique identifier for a presenter or participant
///
/// Ids are generated by the engine and are independent of whatever
/// connection the transport uses to reach the watcher.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random watcher ID
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

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// One student taking part in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Display name, unique within the session
    pub name: String,
    /// When the participant joined
    pub joined_at: DateTime<Utc>,
    /// Latest answer for the active question, cleared when a question starts
    pub current_answer: Option<String>,
}

impl Participant {
    /// Creates a participant that joined just now
    pub fn new(name: String) -> Self {
        Self {
            name,
            joined_at: Utc::now(),
            current_answer: None,
        }
    }
}

/// The role of a watcher and its associated data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// The presenter who controls the quiz
    Presenter,
    /// A student answering questions
    Participant(Participant),
}

/// The kind of watcher without associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum ValueKind {
    /// The presenter
    Presenter,
    /// A participant
    Participant,
}

impl Value {
    /// Returns the kind of this value without the associated data
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Presenter => ValueKind::Presenter,
            Value::Participant(_) => ValueKind::Participant,
        }
    }
}

/// Serialization helper for Watchers struct
#[derive(Deserialize)]
struct WatchersSerde {
    mapping: HashMap<Id, Value>,
}

/// Manages all watchers of a session
///
/// Tracks every subscriber, its role, and provides the fan-out helpers used
/// to reach everyone, only the presenter, or a single participant.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "WatchersSerde")]
pub struct Watchers {
    /// Primary mapping from watcher ID to their value
    mapping: HashMap<Id, Value>,

    /// Reverse mapping organized by watcher kind for efficient filtering
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<ValueKind, HashSet<Id>>,
}

impl From<WatchersSerde> for Watchers {
    /// Rebuilds the reverse mapping, which is not serialized
    fn from(serde: WatchersSerde) -> Self {
        let WatchersSerde { mapping } = serde;
        let mut reverse_mapping: EnumMap<ValueKind, HashSet<Id>> = EnumMap::default();
        for (id, value) in &mapping {
            reverse_mapping[value.kind()].insert(*id);
        }
        Self {
            mapping,
            reverse_mapping,
        }
    }
}

/// Errors that can occur when managing watchers
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of participants
    #[error("maximum number of participants reached")]
    MaximumParticipants,
    /// The id already belongs to a watcher of the session
    #[error("already joined this session")]
    AlreadyJoined,
}

impl Watchers {
    /// Creates the watcher list of a new session, holding only its presenter
    pub fn with_presenter_id(presenter_id: Id) -> Self {
        let mut watchers = Self::default();
        watchers.mapping.insert(presenter_id, Value::Presenter);
        watchers.reverse_mapping[ValueKind::Presenter].insert(presenter_id);
        watchers
    }

    /// Watchers of `kind` (or of every kind) that have a tunnel right now
    fn connected<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        kind: Option<ValueKind>,
        tunnel_finder: F,
    ) -> impl Iterator<Item = (Id, ValueKind, T)> {
        self.reverse_mapping
            .iter()
            .filter(move |(candidate, _)| kind.is_none_or(|kind| kind == *candidate))
            .flat_map(|(kind, ids)| ids.iter().map(move |id| (*id, kind)))
            .filter_map(move |(id, kind)| tunnel_finder(id).map(|tunnel| (id, kind, tunnel)))
    }

    /// Number of watchers of `kind`, connected or not
    pub fn specific_count(&self, kind: ValueKind) -> usize {
        self.reverse_mapping[kind].len()
    }

    /// Registers a watcher
    ///
    /// # Errors
    ///
    /// * `Error::AlreadyJoined` - `watcher_id` is already registered, as
    ///   presenter or participant
    /// * `Error::MaximumParticipants` - The session cannot take another
    ///   participant
    pub fn add_watcher(&mut self, watcher_id: Id, watcher_value: Value) -> Result<(), Error> {
        if self.has_watcher(watcher_id) {
            return Err(Error::AlreadyJoined);
        }

        let kind = watcher_value.kind();

        if kind == ValueKind::Participant
            && self.specific_count(kind) >= constants::session::MAX_PARTICIPANT_COUNT
        {
            return Err(Error::MaximumParticipants);
        }

        self.reverse_mapping[kind].insert(watcher_id);
        self.mapping.insert(watcher_id, watcher_value);

        Ok(())
    }

    /// Unregisters a watcher, returning what was stored for it
    pub fn remove_watcher(&mut self, watcher_id: Id) -> Option<Value> {
        let value = self.mapping.remove(&watcher_id)?;
        self.reverse_mapping[value.kind()].remove(&watcher_id);
        Some(value)
    }

    /// What is stored for a watcher
    pub fn get_watcher_value(&self, watcher_id: Id) -> Option<Value> {
        self.mapping.get(&watcher_id).cloned()
    }

    /// Participant data of a watcher, `None` for the presenter
    pub fn participant(&self, watcher_id: Id) -> Option<&Participant> {
        match self.mapping.get(&watcher_id)? {
            Value::Participant(participant) => Some(participant),
            Value::Presenter => None,
        }
    }

    /// Mutable participant data of a watcher, `None` for the presenter
    pub fn participant_mut(&mut self, watcher_id: Id) -> Option<&mut Participant> {
        match self.mapping.get_mut(&watcher_id)? {
            Value::Participant(participant) => Some(participant),
            Value::Presenter => None,
        }
    }

    /// Display name of a participant
    pub fn get_name(&self, watcher_id: Id) -> Option<String> {
        self.participant(watcher_id)
            .map(|participant| participant.name.clone())
    }

    /// Forgets every participant's pending answer
    pub fn clear_current_answers(&mut self) {
        for value in self.mapping.values_mut() {
            if let Value::Participant(participant) = value {
                participant.current_answer = None;
            }
        }
    }

    /// Whether `watcher_id` belongs to this session
    pub fn has_watcher(&self, watcher_id: Id) -> bool {
        self.mapping.contains_key(&watcher_id)
    }

    /// Sends `message` to one watcher, if connected
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(watcher_id) {
            tunnel.send_message(message);
        }
    }

    /// Sends `state` to one watcher, if connected
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        state: &SyncMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(watcher_id) {
            tunnel.send_state(state);
        }
    }

    /// Sends each connected watcher the message `sender` builds for it
    ///
    /// Watchers for which `sender` returns `None` are skipped.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, ValueKind) -> Option<UpdateMessage>,
    {
        for (id, kind, tunnel) in self.connected(None, tunnel_finder) {
            if let Some(message) = sender(id, kind) {
                tunnel.send_message(&message);
            }
        }
    }

    /// Sends `message` to every connected watcher
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, _, tunnel) in self.connected(None, tunnel_finder) {
            tunnel.send_message(message);
        }
    }

    /// Sends `message` to every connected watcher of `kind`
    pub fn announce_specific<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        kind: ValueKind,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, _, tunnel) in self.connected(Some(kind), tunnel_finder) {
            tunnel.send_message(message);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        messages: Rc<RefCell<Vec<UpdateMessage>>>,
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.borrow_mut().push(message.clone());
        }

        fn send_state(&self, _state: &SyncMessage) {}
    }

    fn participant(name: &str) -> Value {
        Value::Participant(Participant::new(name.to_owned()))
    }

    #[test]
    fn test_id_round_trip_display() {
        let id = Id::new();
        assert_eq!(Id::from_str(&id.to_string()).unwrap(), id);
        assert!(Id::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_with_presenter_id() {
        let presenter = Id::new();
        let watchers = Watchers::with_presenter_id(presenter);

        assert_eq!(watchers.specific_count(ValueKind::Presenter), 1);
        assert_eq!(watchers.specific_count(ValueKind::Participant), 0);
        assert_eq!(watchers.get_watcher_value(presenter), Some(Value::Presenter));
    }

    #[test]
    fn test_add_and_remove_participant() {
        let mut watchers = Watchers::with_presenter_id(Id::new());
        let id = Id::new();

        watchers.add_watcher(id, participant("Alice")).unwrap();
        assert!(watchers.has_watcher(id));
        assert_eq!(watchers.get_name(id), Some("Alice".to_owned()));
        assert_eq!(watchers.specific_count(ValueKind::Participant), 1);

        assert!(matches!(
            watchers.remove_watcher(id),
            Some(Value::Participant(_))
        ));
        assert!(!watchers.has_watcher(id));
        assert_eq!(watchers.specific_count(ValueKind::Participant), 0);
        assert_eq!(watchers.remove_watcher(id), None);
    }

    #[test]
    fn test_add_existing_id_keeps_first_value() {
        let presenter = Id::new();
        let mut watchers = Watchers::with_presenter_id(presenter);

        assert_eq!(
            watchers.add_watcher(presenter, participant("Bob")),
            Err(Error::AlreadyJoined)
        );
        assert_eq!(watchers.get_watcher_value(presenter), Some(Value::Presenter));
        assert_eq!(watchers.specific_count(ValueKind::Presenter), 1);
        assert_eq!(watchers.specific_count(ValueKind::Participant), 0);

        let alice = Id::new();
        watchers.add_watcher(alice, participant("Alice")).unwrap();
        assert_eq!(
            watchers.add_watcher(alice, participant("Alicia")),
            Err(Error::AlreadyJoined)
        );
        assert_eq!(watchers.get_name(alice), Some("Alice".to_owned()));
        assert_eq!(watchers.specific_count(ValueKind::Participant), 1);
    }

    #[test]
    fn test_clear_current_answers() {
        let mut watchers = Watchers::default();
        let id = Id::new();
        watchers.add_watcher(id, participant("Alice")).unwrap();

        watchers.participant_mut(id).unwrap().current_answer = Some("4".to_owned());
        watchers.clear_current_answers();

        assert_eq!(watchers.participant(id).unwrap().current_answer, None);
    }

    #[test]
    fn test_announce_specific_reaches_only_kind() {
        let presenter = Id::new();
        let mut watchers = Watchers::with_presenter_id(presenter);
        let student = Id::new();
        watchers.add_watcher(student, participant("Bob")).unwrap();

        let presenter_tunnel = MockTunnel::default();
        let student_tunnel = MockTunnel::default();
        let finder = |id: Id| {
            if id == presenter {
                Some(presenter_tunnel.clone())
            } else if id == student {
                Some(student_tunnel.clone())
            } else {
                None
            }
        };

        watchers.announce_specific(
            ValueKind::Presenter,
            &UpdateMessage::QuestionsChanged { count: 1 },
            &finder,
        );
        assert_eq!(presenter_tunnel.messages.borrow().len(), 1);
        assert!(student_tunnel.messages.borrow().is_empty());

        watchers.announce(&UpdateMessage::QuestionsChanged { count: 2 }, &finder);
        assert_eq!(presenter_tunnel.messages.borrow().len(), 2);
        assert_eq!(student_tunnel.messages.borrow().len(), 1);
    }

    #[test]
    fn test_disconnected_watchers_are_skipped() {
        let mut watchers = Watchers::default();
        watchers.add_watcher(Id::new(), participant("Ghost")).unwrap();

        let finder = |_: Id| None::<MockTunnel>;
        assert_eq!(watchers.connected(None, finder).count(), 0);
        assert_eq!(watchers.specific_count(ValueKind::Participant), 1);
    }

    #[test]
    fn test_watchers_serialization_rebuilds_reverse_mapping() {
        let presenter = Id::new();
        let mut watchers = Watchers::with_presenter_id(presenter);
        watchers.add_watcher(Id::new(), participant("Eve")).unwrap();

        let json = serde_json::to_string(&watchers).unwrap();
        let restored: Watchers = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.specific_count(ValueKind::Presenter), 1);
        assert_eq!(restored.specific_count(ValueKind::Participant), 1);
    }
}
