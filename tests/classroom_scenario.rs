use std::{collections::HashMap, sync::Arc, thread};

use assert_matches::assert_matches;
use chrono::Duration;
use parking_lot::Mutex;
use quizroom::{
    Error, Registry,
    config::Config,
    error::{Conflict, Missing},
    game::{IncomingMessage, IncomingPresenterMessage, Reply, State, SyncMessage, UpdateMessage},
    question::{QuestionDraft, QuestionId},
    session_code::SessionCode,
    tunnel::Tunnel,
    watcher::Id,
};

// Records everything a client would receive, as wire JSON
#[derive(Debug, Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Tunnel for Recorder {
    fn send_message(&self, message: &UpdateMessage) {
        self.messages.lock().push(message.to_message());
    }

    fn send_state(&self, state: &SyncMessage) {
        self.messages.lock().push(state.to_message());
    }
}

#[derive(Default)]
struct Clients {
    tunnels: Mutex<HashMap<Id, Recorder>>,
}

impl Clients {
    fn connect(&self, id: Id) -> Id {
        self.tunnels.lock().insert(id, Recorder::default());
        id
    }

    fn finder(&self) -> impl Fn(Id) -> Option<Recorder> + '_ {
        move |id| self.tunnels.lock().get(&id).cloned()
    }

    fn received(&self, id: Id) -> Vec<String> {
        self.tunnels
            .lock()
            .get(&id)
            .map(|tunnel| tunnel.messages.lock().clone())
            .unwrap_or_default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn add_question(
    registry: &Registry,
    presenter: Id,
    clients: &Clients,
    draft: QuestionDraft,
) -> QuestionId {
    let reply = registry
        .receive_message(
            presenter,
            IncomingMessage::Presenter(IncomingPresenterMessage::AddQuestion(draft)),
            clients.finder(),
        )
        .unwrap();
    match reply {
        Reply::Question(question) => question.id(),
        other => panic!("unexpected reply {other:?}"),
    }
}

fn presenter_command(
    registry: &Registry,
    presenter: Id,
    clients: &Clients,
    command: IncomingPresenterMessage,
) -> Result<Reply, Error> {
    registry.receive_message(
        presenter,
        IncomingMessage::Presenter(command),
        clients.finder(),
    )
}

#[test]
fn single_question_quiz() {
    init_tracing();

    let registry = Registry::default();
    let clients = Clients::default();

    let created = registry.create_session("Quiz 1", "Ms. X").unwrap();
    let presenter = clients.connect(created.presenter_id);

    let question_id = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("2+2?", ["3", "4", "5"], "4", Some(20)),
    );

    let alice = clients.connect(Id::new());
    let bob = clients.connect(Id::new());
    registry
        .join(alice, created.code, "Alice", clients.finder())
        .unwrap();
    registry
        .join(bob, created.code, "Bob", clients.finder())
        .unwrap();

    let reply = presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::StartQuestion(question_id),
    )
    .unwrap();
    assert_matches!(reply, Reply::QuestionStarted(announcement) if announcement.index == 0);

    // the live question never carries its answer to participants
    for message in clients.received(alice) {
        assert!(!message.contains("correctAnswer"), "leaked in {message}");
    }

    {
        let game = registry.session(created.code).unwrap();
        let mut game = game.lock();
        let started_at = game
            .questions()
            .get(question_id)
            .and_then(|question| question.started_at())
            .unwrap();

        game.submit_answer(
            alice,
            question_id,
            "4",
            started_at + Duration::seconds(3),
            clients.finder(),
        )
        .unwrap();
        game.submit_answer(
            bob,
            question_id,
            "3",
            started_at + Duration::seconds(12),
            clients.finder(),
        )
        .unwrap();
    }

    let Reply::QuestionEnded(ended) = presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::EndQuestion,
    )
    .unwrap() else {
        panic!("expected the question to end");
    };

    assert!(ended.quiz_ended);
    assert_eq!(ended.results.count("3"), 1);
    assert_eq!(ended.results.count("4"), 1);
    assert_eq!(ended.results.count("5"), 0);
    assert_eq!(ended.results.percentage("4"), 50);
    assert_eq!(ended.results.correct_answer, "4");
    assert!(ended.results.not_answered.is_empty());

    let Reply::Report(report) =
        presenter_command(&registry, presenter, &clients, IncomingPresenterMessage::GetReport)
            .unwrap()
    else {
        panic!("expected a report");
    };

    assert_eq!(report.title, "Quiz 1");
    assert_eq!(report.presenter_name, "Ms. X");
    assert_eq!(report.total_questions, 1);
    assert_eq!(report.total_participants, 2);

    let alice_summary = &report.participants[0];
    assert_eq!(alice_summary.name, "Alice");
    assert_eq!(alice_summary.total_points, 2);
    assert_eq!(alice_summary.correct_answers, 1);
    assert_eq!(alice_summary.percentage, 100);

    let bob_summary = &report.participants[1];
    assert_eq!(bob_summary.name, "Bob");
    assert_eq!(bob_summary.total_points, 0);
    assert_eq!(bob_summary.correct_answers, 0);
    assert_eq!(bob_summary.wrong_answers, 1);

    // every participant hears the final standings with their own score
    let last = clients.received(bob).pop().unwrap();
    assert!(last.starts_with(r#"{"QuizEnded""#), "{last}");
    assert!(last.contains(r#""name":"Bob""#));
    assert!(last.contains(r#""exactCount":2"#));

    assert_eq!(
        registry.get_session(created.code).unwrap().state,
        State::QuizEnded
    );
}

#[test]
fn time_bonus_boundaries() {
    let registry = Registry::default();
    let clients = Clients::default();
    let created = registry.create_session("Bonus", "T").unwrap();
    let presenter = clients.connect(created.presenter_id);

    let question_id = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("Pick a", ["a", "b"], "a", Some(20)),
    );
    add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("Another", ["a", "b"], "a", Some(20)),
    );

    let fast = clients.connect(Id::new());
    let slow = clients.connect(Id::new());
    let wrong = clients.connect(Id::new());
    for (id, name) in [(fast, "fast"), (slow, "slow"), (wrong, "wrong")] {
        registry
            .join(id, created.code, name, clients.finder())
            .unwrap();
    }

    presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::StartQuestion(question_id),
    )
    .unwrap();

    let game = registry.session(created.code).unwrap();
    let mut game = game.lock();
    let started_at = game
        .questions()
        .get(question_id)
        .and_then(|question| question.started_at())
        .unwrap();

    for (id, answer, seconds) in [(fast, "a", 9), (slow, "a", 11), (wrong, "b", 1)] {
        game.submit_answer(
            id,
            question_id,
            answer,
            started_at + Duration::seconds(seconds),
            clients.finder(),
        )
        .unwrap();
    }

    let points = |id| game.ledger().get(id).unwrap().total_points;
    assert_eq!(points(fast), 2);
    assert_eq!(points(slow), 1);
    assert_eq!(points(wrong), 0);
}

#[test]
fn repeated_submissions_are_idempotent() {
    let registry = Registry::default();
    let clients = Clients::default();
    let created = registry.create_session("Idem", "T").unwrap();
    let presenter = clients.connect(created.presenter_id);
    let question_id = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("2+2?", ["3", "4"], "4", None),
    );
    let alice = clients.connect(Id::new());
    registry
        .join(alice, created.code, "Alice", clients.finder())
        .unwrap();
    presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::StartQuestion(question_id),
    )
    .unwrap();

    for answer in ["4", "4", "3", "4"] {
        registry
            .submit_answer(alice, question_id, answer, clients.finder())
            .unwrap();
    }

    let game = registry.session(created.code).unwrap();
    let game = game.lock();
    let record = game.ledger().get(alice).unwrap();
    assert_eq!(record.total_answered(), 1);
    assert_eq!(record.correct_answers, 1);
    assert_eq!(record.total_points, 2);

    // the latest answer is the one shown in the results
    let results = game.results(question_id).unwrap();
    assert_eq!(results.total_responses, 1);
    assert_eq!(results.count("4"), 1);
}

#[test]
fn lifecycle_conflicts() {
    let registry = Registry::default();
    let clients = Clients::default();
    let created = registry.create_session("Conflicts", "T").unwrap();
    let presenter = clients.connect(created.presenter_id);

    let first = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("one", ["a", "b"], "a", None),
    );
    let second = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("two", ["a", "b"], "b", None),
    );

    assert_matches!(
        presenter_command(&registry, presenter, &clients, IncomingPresenterMessage::EndQuestion),
        Err(Error::Conflict(Conflict::NoActiveQuestion))
    );

    presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::StartQuestion(first),
    )
    .unwrap();
    assert_matches!(
        presenter_command(
            &registry,
            presenter,
            &clients,
            IncomingPresenterMessage::StartQuestion(second)
        ),
        Err(Error::Conflict(Conflict::QuestionActive))
    );
    assert_matches!(
        presenter_command(
            &registry,
            presenter,
            &clients,
            IncomingPresenterMessage::DeleteQuestion(first)
        ),
        Err(Error::Conflict(Conflict::QuestionLocked))
    );

    let snapshot = registry.get_session(created.code).unwrap();
    assert_eq!(snapshot.active_question_index, Some(0));
    assert_eq!(snapshot.state, State::QuestionActive { question_id: first });
}

#[test]
fn deleting_the_only_question() {
    let registry = Registry::default();
    let clients = Clients::default();
    let created = registry.create_session("Empty", "T").unwrap();
    let presenter = clients.connect(created.presenter_id);

    let only = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("one", ["a", "b"], "a", None),
    );
    assert_matches!(
        presenter_command(
            &registry,
            presenter,
            &clients,
            IncomingPresenterMessage::DeleteQuestion(only)
        ),
        Ok(Reply::QuestionDeleted(id)) if id == only
    );

    for question_id in [only, QuestionId::new()] {
        assert_matches!(
            presenter_command(
                &registry,
                presenter,
                &clients,
                IncomingPresenterMessage::StartQuestion(question_id)
            ),
            Err(Error::NotFound(Missing::Question))
        );
    }
}

#[test]
fn names_are_unique_per_session() {
    let registry = Registry::default();
    let clients = Clients::default();
    let first = registry.create_session("A", "T").unwrap();
    let second = registry.create_session("B", "T").unwrap();

    registry
        .join(clients.connect(Id::new()), first.code, "Sam", clients.finder())
        .unwrap();
    assert_matches!(
        registry.join(clients.connect(Id::new()), first.code, "Sam", clients.finder()),
        Err(Error::Conflict(Conflict::NameTaken))
    );
    registry
        .join(clients.connect(Id::new()), second.code, "Sam", clients.finder())
        .unwrap();
}

#[test]
fn codes_are_case_insensitive_on_input() {
    let registry = Registry::new(Config::default());
    let created = registry.create_session("Case", "T").unwrap();

    let typed: SessionCode = created.code.to_string().to_lowercase().parse().unwrap();
    assert_eq!(typed, created.code);
    assert!(registry.get_session(typed).is_ok());
}

#[test]
fn sessions_are_independent_across_threads() {
    let registry = Arc::new(Registry::default());

    let handles = (0..8)
        .map(|round| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let clients = Clients::default();
                let created = registry
                    .create_session(&format!("Quiz {round}"), "T")
                    .unwrap();
                let presenter = clients.connect(created.presenter_id);
                let question_id = add_question(
                    &registry,
                    presenter,
                    &clients,
                    QuestionDraft::new("2+2?", ["3", "4"], "4", None),
                );

                let students = (0..20)
                    .map(|i| {
                        let id = clients.connect(Id::new());
                        registry
                            .join(id, created.code, &format!("s{i}"), clients.finder())
                            .unwrap();
                        id
                    })
                    .collect::<Vec<_>>();

                presenter_command(
                    &registry,
                    presenter,
                    &clients,
                    IncomingPresenterMessage::StartQuestion(question_id),
                )
                .unwrap();
                for (i, id) in students.iter().enumerate() {
                    let answer = if i % 2 == 0 { "4" } else { "3" };
                    registry
                        .submit_answer(*id, question_id, answer, clients.finder())
                        .unwrap();
                }

                (created.code, question_id)
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let (code, question_id) = handle.join().unwrap();
        let game = registry.session(code).unwrap();
        let results = game.lock().results(question_id).unwrap();
        assert_eq!(results.total_responses, 20);
        assert_eq!(results.count("4"), 10);
        assert_eq!(results.percentage("3"), 50);
    }

    assert_eq!(registry.len(), 8);
}

#[test]
fn disconnect_removes_participant_from_results() {
    let registry = Registry::default();
    let clients = Clients::default();
    let created = registry.create_session("Leave", "T").unwrap();
    let presenter = clients.connect(created.presenter_id);
    let question_id = add_question(
        &registry,
        presenter,
        &clients,
        QuestionDraft::new("2+2?", ["3", "4"], "4", None),
    );

    let alice = clients.connect(Id::new());
    let bob = clients.connect(Id::new());
    registry
        .join(alice, created.code, "Alice", clients.finder())
        .unwrap();
    registry
        .join(bob, created.code, "Bob", clients.finder())
        .unwrap();
    presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::StartQuestion(question_id),
    )
    .unwrap();
    registry
        .submit_answer(bob, question_id, "3", clients.finder())
        .unwrap();

    registry.disconnect(bob, clients.finder());

    let Reply::Results(results) = presenter_command(
        &registry,
        presenter,
        &clients,
        IncomingPresenterMessage::GetResults(question_id),
    )
    .unwrap() else {
        panic!("expected results");
    };
    assert_eq!(results.total_responses, 0);
    assert_eq!(results.not_answered, ["Alice"]);

    let presenter_messages = clients.received(presenter);
    assert!(
        presenter_messages
            .iter()
            .any(|message| message.contains("ParticipantLeft"))
    );
}
