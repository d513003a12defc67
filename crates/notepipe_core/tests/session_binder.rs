use notepipe_core::db::open_db_in_memory;
use notepipe_core::{
    Dispatcher, Looper, Note, NoteRepository, NoteSession, RepositoryOptions, SessionScope,
    SqliteNoteStore, Task,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

type Seen = Arc<Mutex<Vec<usize>>>;

fn repository() -> Arc<NoteRepository<SqliteNoteStore>> {
    let store = SqliteNoteStore::from_opened(open_db_in_memory().unwrap());
    Arc::new(NoteRepository::new(store, RepositoryOptions::default()).unwrap())
}

/// Records the length of every delivered snapshot.
fn observer() -> (Seen, impl FnMut(Arc<Vec<Note>>) + Send + 'static) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |notes: Arc<Vec<Note>>| sink.lock().unwrap().push(notes.len()))
}

fn wait_for_len(looper: &Looper, session: &NoteSession<SqliteNoteStore>, len: usize) {
    assert!(looper.run_until(WAIT, || {
        session.all_notes().latest().is_some_and(|notes| notes.len() == len)
    }));
}

#[test]
fn attached_owner_receives_latest_snapshot_immediately() {
    let looper = Looper::new();
    let session = NoteSession::new(repository());
    session.insert(Note::new("A", "d1", 5));
    wait_for_len(&looper, &session, 1);

    let (seen, on_notes) = observer();
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());
    let binding = session.attach(handler, on_notes);
    looper.run_pending();

    assert!(binding.is_current());
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[test]
fn paused_owner_gets_latest_once_on_resume() {
    let looper = Looper::new();
    let session = NoteSession::new(repository());
    wait_for_len(&looper, &session, 0);

    let (seen, on_notes) = observer();
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());
    let binding = session.attach(handler, on_notes);
    looper.run_pending();
    assert_eq!(*seen.lock().unwrap(), vec![0]);

    binding.pause();
    session.insert(Note::new("A", "d1", 5));
    session.insert(Note::new("B", "d2", 3));
    wait_for_len(&looper, &session, 2);
    looper.run_until(Duration::from_millis(50), || false);
    assert_eq!(*seen.lock().unwrap(), vec![0]);

    binding.resume();
    looper.run_pending();
    assert_eq!(*seen.lock().unwrap(), vec![0, 2]);

    binding.resume();
    looper.run_pending();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn recreated_owner_replaces_previous_subscription() {
    let looper = Looper::new();
    let session = NoteSession::new(repository());
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());

    let (first_seen, first_observer) = observer();
    let first = session.attach(Arc::clone(&handler), first_observer);
    let (second_seen, second_observer) = observer();
    let second = session.attach(Arc::clone(&handler), second_observer);

    assert!(!first.is_current());
    assert!(second.is_current());
    assert_eq!(session.all_notes().subscriber_count(), 1);

    // The stale binding must not tear down its successor.
    drop(first);
    assert!(second.is_current());
    assert_eq!(session.all_notes().subscriber_count(), 1);

    session.insert(Note::new("A", "d1", 5));
    assert!(looper.run_until(WAIT, || second_seen.lock().unwrap().last() == Some(&1)));
    assert!(first_seen.lock().unwrap().iter().all(|len| *len == 0));

    drop(second);
    assert!(!session.has_owner());
    assert_eq!(session.all_notes().subscriber_count(), 0);

    let (_third_seen, third_observer) = observer();
    let _third = session.attach(handler, third_observer);
    assert_eq!(session.all_notes().subscriber_count(), 1);
}

#[test]
fn ending_session_releases_subscription_and_rejects_attach() {
    let looper = Looper::new();
    let session = NoteSession::new(repository());
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());

    let (_seen, on_notes) = observer();
    let binding = session.attach(Arc::clone(&handler), on_notes);
    assert_eq!(session.all_notes().subscriber_count(), 1);

    session.end();
    assert!(session.is_ended());
    assert!(!session.has_owner());
    assert!(!binding.is_current());
    assert_eq!(session.all_notes().subscriber_count(), 0);

    let (late_seen, late_observer) = observer();
    let late = session.attach(handler, late_observer);
    assert!(!late.is_current());
    late.resume();
    looper.run_until(Duration::from_millis(50), || false);
    assert!(late_seen.lock().unwrap().is_empty());
    assert_eq!(session.all_notes().subscriber_count(), 0);
}

#[test]
fn scope_reuses_session_until_ended() {
    let repository = repository();
    let scope = SessionScope::new(Arc::clone(&repository));
    let looper = Looper::new();
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());

    let first = scope.get_or_create();
    let (_seen, on_notes) = observer();
    let _binding = first.attach(handler, on_notes);
    assert!(scope.get_or_create().has_owner());

    scope.end_session();
    assert!(first.is_ended());
    assert_eq!(repository.all_notes().subscriber_count(), 0);

    let second = scope.get_or_create();
    assert!(!second.is_ended());
    assert!(!second.has_owner());
}

/// Ends its session from inside the first dispatch, then runs the task.
struct EndingDispatcher {
    session: Mutex<Option<NoteSession<SqliteNoteStore>>>,
}

impl Dispatcher for EndingDispatcher {
    fn dispatch(&self, task: Task) {
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            session.end();
        }
        task();
    }
}

#[test]
fn session_ended_during_attach_keeps_no_subscription() {
    let looper = Looper::new();
    let repository = repository();
    let session = NoteSession::new(Arc::clone(&repository));
    wait_for_len(&looper, &session, 0);

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(EndingDispatcher {
        session: Mutex::new(Some(session.clone())),
    });
    let (seen, on_notes) = observer();
    let binding = session.attach(dispatcher, on_notes);

    assert!(session.is_ended());
    assert!(!session.has_owner());
    assert!(!binding.is_current());
    assert_eq!(session.all_notes().subscriber_count(), 0);

    let delivered = seen.lock().unwrap().len();
    session.insert(Note::new("A", "d1", 5));
    assert!(repository.sync());
    assert_eq!(seen.lock().unwrap().len(), delivered);
}
