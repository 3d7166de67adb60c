//! Completion handles for asynchronously submitted work
//!
//! An [`Event`] represents the future completion of one submitted task. It can
//! be waited on from the host, or handed to a later submission as a
//! predecessor so the runtime orders the two without blocking any thread.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

type Continuation = Box<dyn FnOnce(&Result<()>) + Send>;

/// Completion handle of a submitted task
///
/// Cloning is cheap and every clone observes the same completion. A failed
/// task completes its event with the task's error; waiting returns it.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    id: u64,
    label: &'static str,
    state: Mutex<EventState>,
    done: Condvar,
}

enum EventState {
    Pending(Vec<Continuation>),
    Complete(Result<()>),
}

impl Event {
    /// Create an event for a task that has not completed yet
    pub(crate) fn pending(label: &'static str) -> Self {
        Self::with_state(label, EventState::Pending(Vec::new()))
    }

    /// An event that is already complete
    ///
    /// Useful as a neutral predecessor.
    pub fn completed(label: &'static str) -> Self {
        Self::with_state(label, EventState::Complete(Ok(())))
    }

    fn with_state(label: &'static str, state: EventState) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
                label,
                state: Mutex::new(state),
                done: Condvar::new(),
            }),
        }
    }

    /// Unique id of this event
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Label of the task this event belongs to
    #[inline]
    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    /// Check whether the task has finished (successfully or not)
    pub fn is_complete(&self) -> bool {
        matches!(*self.inner.state.lock(), EventState::Complete(_))
    }

    /// The task's outcome if it has finished, without blocking
    pub fn try_status(&self) -> Option<Result<()>> {
        match &*self.inner.state.lock() {
            EventState::Complete(outcome) => Some(outcome.clone()),
            EventState::Pending(_) => None,
        }
    }

    /// Block until the task has finished and return its outcome
    pub fn wait(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                EventState::Complete(outcome) => return outcome.clone(),
                EventState::Pending(_) => self.inner.done.wait(&mut state),
            }
        }
    }

    /// Wait on every event, returning the first error encountered
    ///
    /// All events are waited on even after a failure.
    pub fn wait_all(events: &[Event]) -> Result<()> {
        let mut first_err = None;
        for event in events {
            if let Err(e) = event.wait() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Run `f` with the outcome once the task has finished
    ///
    /// Runs immediately on the calling thread if the event is already
    /// complete, otherwise on the thread that completes it.
    pub(crate) fn on_complete(&self, f: impl FnOnce(&Result<()>) + Send + 'static) {
        let outcome = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                EventState::Pending(continuations) => {
                    continuations.push(Box::new(f));
                    return;
                }
                EventState::Complete(outcome) => outcome.clone(),
            }
        };
        f(&outcome);
    }

    /// Mark the task finished and run its continuations
    pub(crate) fn complete(&self, outcome: Result<()>) {
        let continuations = {
            let mut state = self.inner.state.lock();
            let previous = std::mem::replace(&mut *state, EventState::Complete(outcome.clone()));
            self.inner.done.notify_all();
            match previous {
                EventState::Pending(continuations) => continuations,
                EventState::Complete(_) => {
                    debug_assert!(false, "event {} completed twice", self.inner.id);
                    Vec::new()
                }
            }
        };

        match &outcome {
            Ok(()) => log::trace!("event {} ({}) complete", self.inner.id, self.inner.label),
            Err(e) => log::debug!("event {} ({}) failed: {}", self.inner.id, self.inner.label, e),
        }

        for continuation in continuations {
            continuation(&outcome);
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Turn a predecessor's failure into the error reported by a skipped task
pub(crate) fn dependency_error(op: &'static str, cause: &Error) -> Error {
    Error::DependencyFailed {
        op,
        cause: cause.to_string(),
    }
}

/// Run `then` once every event in `events` has completed
///
/// `then` receives the first failure among them, or `Ok` if all succeeded.
/// Nothing blocks: the last event to complete runs `then` on its own thread.
pub(crate) fn when_all(events: Vec<Event>, then: impl FnOnce(Result<()>) + Send + 'static) {
    if events.is_empty() {
        then(Ok(()));
        return;
    }

    struct Join {
        remaining: usize,
        first_err: Option<Error>,
        then: Option<Box<dyn FnOnce(Result<()>) + Send>>,
    }

    let join = Arc::new(Mutex::new(Join {
        remaining: events.len(),
        first_err: None,
        then: Some(Box::new(then)),
    }));

    for event in events {
        let join = Arc::clone(&join);
        event.on_complete(move |outcome| {
            let ready = {
                let mut join = join.lock();
                if let Err(e) = outcome {
                    join.first_err.get_or_insert_with(|| e.clone());
                }
                join.remaining -= 1;
                if join.remaining == 0 {
                    let err = join.first_err.take();
                    join.then.take().map(|then| (then, err))
                } else {
                    None
                }
            };
            if let Some((then, err)) = ready {
                then(err.map_or(Ok(()), Err));
            }
        });
    }
}
