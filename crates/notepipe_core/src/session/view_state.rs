//! View-state binder for the note list.
//!
//! A `NoteSession` outlives individual UI owners. Each owner attaches with
//! its own dispatcher and observer, receives the latest snapshot right away
//! and can pause/resume delivery while it is backgrounded. Attaching a new
//! owner releases the previous owner's subscription.

use crate::live::live_query::{LiveQuery, Subscription};
use crate::model::note::Note;
use crate::repo::note_store::NoteStore;
use crate::runtime::dispatch::Dispatcher;
use crate::service::note_repository::NoteRepository;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type NotesSubscription = Arc<Subscription<Vec<Note>>>;

struct OwnerSlot {
    owner: u64,
    subscription: NotesSubscription,
}

struct OwnerSlots {
    current: Option<OwnerSlot>,
    next_owner: u64,
    ended: bool,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Logical session spanning any number of owner recreations.
pub struct NoteSession<S: NoteStore + Send + 'static> {
    repository: Arc<NoteRepository<S>>,
    owners: Arc<Mutex<OwnerSlots>>,
}

impl<S: NoteStore + Send + 'static> Clone for NoteSession<S> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            owners: Arc::clone(&self.owners),
        }
    }
}

impl<S: NoteStore + Send + 'static> NoteSession<S> {
    pub fn new(repository: Arc<NoteRepository<S>>) -> Self {
        Self {
            repository,
            owners: Arc::new(Mutex::new(OwnerSlots {
                current: None,
                next_owner: 1,
                ended: false,
            })),
        }
    }

    /// Binds a UI owner; it becomes the only one receiving snapshots.
    pub fn attach<F>(&self, dispatcher: Arc<dyn Dispatcher>, observer: F) -> OwnerBinding
    where
        F: FnMut(Arc<Vec<Note>>) + Send + 'static,
    {
        if lock(&self.owners).ended {
            return self.rejected_binding();
        }

        // Subscribing may deliver inline, so no lock is held here.
        let subscription = Arc::new(self.repository.all_notes().subscribe(dispatcher, observer));

        // `end()` may have run while subscribing; the fresh subscription is
        // then released outside the lock.
        let installed = {
            let mut owners = lock(&self.owners);
            if owners.ended {
                Err(subscription)
            } else {
                let owner = owners.next_owner;
                owners.next_owner += 1;
                let replaced = owners.current.replace(OwnerSlot {
                    owner,
                    subscription,
                });
                Ok((owner, replaced))
            }
        };

        let (owner, replaced) = match installed {
            Ok(installed) => installed,
            Err(subscription) => {
                drop(subscription);
                return self.rejected_binding();
            }
        };
        info!(
            "event=session_attach module=session status=ok owner={owner} replaced={}",
            replaced.is_some()
        );
        drop(replaced);

        OwnerBinding {
            owners: Arc::clone(&self.owners),
            owner,
        }
    }

    fn rejected_binding(&self) -> OwnerBinding {
        warn!("event=session_attach module=session status=rejected reason=session_ended");
        OwnerBinding {
            owners: Arc::clone(&self.owners),
            owner: 0,
        }
    }

    /// Same handle as `NoteRepository::all_notes`.
    pub fn all_notes(&self) -> &LiveQuery<Vec<Note>> {
        self.repository.all_notes()
    }

    pub fn insert(&self, note: Note) {
        self.repository.insert(note);
    }

    pub fn update(&self, note: Note) {
        self.repository.update(note);
    }

    pub fn delete(&self, note: Note) {
        self.repository.delete(note);
    }

    pub fn clear(&self) {
        self.repository.clear();
    }

    /// Whether an owner is currently bound.
    pub fn has_owner(&self) -> bool {
        lock(&self.owners).current.is_some()
    }

    /// Ends the session and releases the owner subscription.
    pub fn end(&self) {
        let released = {
            let mut owners = lock(&self.owners);
            owners.ended = true;
            owners.current.take()
        };
        info!(
            "event=session_end module=session status=ok released_owner={}",
            released.is_some()
        );
    }

    pub fn is_ended(&self) -> bool {
        lock(&self.owners).ended
    }
}

/// One UI owner's attachment. Dropping it detaches the owner only.
pub struct OwnerBinding {
    owners: Arc<Mutex<OwnerSlots>>,
    owner: u64,
}

impl OwnerBinding {
    /// Whether this owner still holds the session's subscription.
    pub fn is_current(&self) -> bool {
        self.subscription().is_some()
    }

    /// Stops deliveries while the owner is backgrounded.
    pub fn pause(&self) {
        if let Some(subscription) = self.subscription() {
            subscription.set_active(false);
        }
    }

    /// Resumes deliveries, replaying the latest snapshot if one was missed.
    pub fn resume(&self) {
        if let Some(subscription) = self.subscription() {
            subscription.set_active(true);
        }
    }

    fn subscription(&self) -> Option<NotesSubscription> {
        lock(&self.owners)
            .current
            .as_ref()
            .filter(|slot| slot.owner == self.owner)
            .map(|slot| Arc::clone(&slot.subscription))
    }
}

impl Drop for OwnerBinding {
    fn drop(&mut self) {
        let released = {
            let mut owners = lock(&self.owners);
            match owners.current.as_ref() {
                Some(slot) if slot.owner == self.owner => owners.current.take(),
                _ => None,
            }
        };
        drop(released);
    }
}

/// Lazily creates the session and keeps it across owner recreation.
pub struct SessionScope<S: NoteStore + Send + 'static> {
    repository: Arc<NoteRepository<S>>,
    session: Mutex<Option<NoteSession<S>>>,
}

impl<S: NoteStore + Send + 'static> SessionScope<S> {
    pub fn new(repository: Arc<NoteRepository<S>>) -> Self {
        Self {
            repository,
            session: Mutex::new(None),
        }
    }

    /// Returns the live session, creating it on first use.
    pub fn get_or_create(&self) -> NoteSession<S> {
        lock(&self.session)
            .get_or_insert_with(|| NoteSession::new(Arc::clone(&self.repository)))
            .clone()
    }

    /// Ends the current session, if any; the next request starts a new one.
    pub fn end_session(&self) {
        let ended = lock(&self.session).take();
        if let Some(session) = ended {
            session.end();
        }
    }
}
