//! Synchronization strategies for submitted work
//!
//! Every orchestrated call (`qr`, `kde`) hands its native submission to an
//! [`OrderManager`]. The manager decides what the submission must wait for and
//! what happens to the events it returns:
//!
//! - [`Blocking`]: nothing to depend on; each submission is waited on
//!   immediately, so the call returns with its results complete.
//! - [`SequentialOrderManager`]: each submission depends on the compute events
//!   recorded so far, and returns without blocking. [`OrderManager::wait`]
//!   drains everything.

use super::event::Event;
use crate::error::Result;
use parking_lot::Mutex;

/// Strategy for ordering and synchronizing native submissions
pub trait OrderManager: Send + Sync {
    /// Events the next submission must wait for
    fn depends_on(&self) -> Vec<Event>;

    /// Take ownership of a submission's `(host, compute)` event pair
    fn submit(&self, host: Event, compute: Event) -> Result<()>;

    /// Block until every submission seen by this manager has completed
    fn wait(&self) -> Result<()>;
}

/// Wait on every submission as soon as it is made
#[derive(Clone, Copy, Debug, Default)]
pub struct Blocking;

impl OrderManager for Blocking {
    fn depends_on(&self) -> Vec<Event> {
        Vec::new()
    }

    fn submit(&self, host: Event, compute: Event) -> Result<()> {
        // Wait on both even if the compute side failed.
        let compute_result = compute.wait();
        let host_result = host.wait();
        compute_result.and(host_result)
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}

/// Chain submissions one after another without blocking the caller
///
/// Completed events are pruned whenever the manager is consulted, so a
/// long-lived manager does not accumulate handles.
#[derive(Debug, Default)]
pub struct SequentialOrderManager {
    state: Mutex<SequentialState>,
}

#[derive(Debug, Default)]
struct SequentialState {
    host: Vec<Event>,
    compute: Vec<Event>,
}

impl SequentialState {
    fn prune(&mut self) {
        // Failed events are kept so that `wait` still reports them.
        let keep = |e: &Event| !matches!(e.try_status(), Some(Ok(())));
        self.host.retain(keep);
        self.compute.retain(keep);
    }
}

impl SequentialOrderManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded submissions that may still be running
    pub fn outstanding(&self) -> usize {
        let mut state = self.state.lock();
        state.prune();
        state.host.len().max(state.compute.len())
    }
}

impl OrderManager for SequentialOrderManager {
    fn depends_on(&self) -> Vec<Event> {
        let mut state = self.state.lock();
        state.prune();
        state.compute.clone()
    }

    fn submit(&self, host: Event, compute: Event) -> Result<()> {
        log::trace!(
            "order manager recorded host event {} and compute event {}",
            host.id(),
            compute.id()
        );
        let mut state = self.state.lock();
        state.prune();
        state.host.push(host);
        state.compute.push(compute);
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        let (host, compute) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.host),
                std::mem::take(&mut state.compute),
            )
        };
        let compute_result = Event::wait_all(&compute);
        let host_result = Event::wait_all(&host);
        compute_result.and(host_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_blocking_has_no_predecessors() {
        let order = Blocking;
        assert!(order.depends_on().is_empty());
        let host = Event::completed("host");
        let compute = Event::completed("compute");
        assert!(order.submit(host, compute).is_ok());
        assert!(order.wait().is_ok());
    }

    #[test]
    fn test_blocking_reports_compute_failure() {
        let host = Event::completed("host");
        let compute = Event::pending("compute");
        compute.complete(Err(Error::kernel_failed("qr", "broken")));
        assert_eq!(
            Blocking.submit(host, compute),
            Err(Error::kernel_failed("qr", "broken"))
        );
    }

    #[test]
    fn test_sequential_chains_compute_events() {
        let order = SequentialOrderManager::new();
        assert!(order.depends_on().is_empty());

        let host = Event::pending("host");
        let compute = Event::pending("compute");
        order.submit(host.clone(), compute.clone()).unwrap();

        let deps = order.depends_on();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id(), compute.id());
        assert_eq!(order.outstanding(), 1);

        compute.complete(Ok(()));
        host.complete(Ok(()));
        assert!(order.depends_on().is_empty());
        assert_eq!(order.outstanding(), 0);
        assert!(order.wait().is_ok());
    }

    #[test]
    fn test_sequential_wait_reports_failure() {
        let order = SequentialOrderManager::new();
        let compute = Event::pending("compute");
        compute.complete(Err(Error::Internal("lost".into())));
        order.submit(Event::completed("host"), compute).unwrap();

        assert_eq!(order.wait(), Err(Error::Internal("lost".into())));
        // Everything was drained by the first wait.
        assert!(order.wait().is_ok());
    }
}
