//! CPU client: an asynchronous submission queue over a rayon pool

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::{Error, Result};
use crate::runtime::{Event, RuntimeClient, dependency_error, when_all};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Thread and chunking settings for CPU kernels
///
/// `num_threads: None` runs on rayon's global pool; `Some(n)` gives the client
/// a dedicated pool of `n` threads. `chunk_size` is the minimum number of
/// items a rayon task processes (`with_min_len`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParallelismConfig {
    /// Worker threads, or `None` for the global pool
    pub num_threads: Option<usize>,
    /// Minimum items per parallel task, or `None` for rayon's default
    pub chunk_size: Option<usize>,
}

impl ParallelismConfig {
    /// Create a configuration
    pub fn new(num_threads: Option<usize>, chunk_size: Option<usize>) -> Self {
        Self {
            num_threads,
            chunk_size,
        }
    }
}

/// CPU client for task submission
///
/// Clones share the same pool and the same set of in-flight events, so
/// [`RuntimeClient::synchronize`] on any clone waits for work submitted
/// through all of them.
///
/// Without the `rayon` feature, tasks run inline on the thread that
/// satisfies their last dependency (usually the submitting thread).
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    parallelism: ParallelismConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
    in_flight: Arc<Mutex<Vec<Event>>>,
}

impl CpuClient {
    /// Create a new CPU client on the global pool
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            parallelism: ParallelismConfig::default(),
            #[cfg(feature = "rayon")]
            pool: None,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return a client using `config` for its kernels
    ///
    /// The returned client has its own in-flight set. If a dedicated pool
    /// cannot be built, the global pool is used and a warning is logged.
    pub fn with_parallelism(&self, config: ParallelismConfig) -> Self {
        #[cfg(feature = "rayon")]
        let pool = match config.num_threads {
            Some(n) => match rayon::ThreadPoolBuilder::new()
                .num_threads(n.max(1))
                .thread_name(|i| format!("devkern-cpu-{i}"))
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    log::warn!("failed to build a {n}-thread pool, using the global pool: {e}");
                    None
                }
            },
            None => None,
        };

        Self {
            device: self.device.clone(),
            parallelism: config,
            #[cfg(feature = "rayon")]
            pool,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The parallelism settings of this client
    pub fn parallelism(&self) -> ParallelismConfig {
        self.parallelism
    }

    /// Minimum items per rayon task for kernels run by this client
    #[inline]
    pub(crate) fn rayon_min_len(&self) -> usize {
        self.parallelism.chunk_size.unwrap_or(1).max(1)
    }

    /// Run `f` inside this client's pool
    #[cfg(feature = "rayon")]
    pub(crate) fn install_parallelism<T: Send>(&self, f: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Number of submitted tasks not yet observed complete
    pub fn in_flight(&self) -> usize {
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|e| !e.is_complete());
        in_flight.len()
    }

    fn track(&self, event: &Event) {
        let mut in_flight = self.in_flight.lock();
        // Completed successes no longer matter; failures are kept for synchronize.
        in_flight.retain(|e| !matches!(e.try_status(), Some(Ok(()))));
        in_flight.push(event.clone());
    }

    fn launch(&self, job: impl FnOnce() + Send + 'static) {
        #[cfg(feature = "rayon")]
        {
            match &self.pool {
                Some(pool) => pool.spawn(job),
                None => rayon::spawn(job),
            }
        }

        #[cfg(not(feature = "rayon"))]
        {
            job();
        }
    }
}

/// Run a task, turning a panic into a kernel failure
fn run_task(label: &'static str, task: impl FnOnce() -> Result<()>) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            Err(Error::kernel_failed(label, reason))
        }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn submit<F>(&self, label: &'static str, depends: &[Event], task: F) -> Event
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let event = Event::pending(label);
        self.track(&event);

        let waiting: Vec<Event> = depends
            .iter()
            .filter(|e| !matches!(e.try_status(), Some(Ok(()))))
            .cloned()
            .collect();
        log::trace!(
            "submit {} as event {} after {} predecessor(s)",
            label,
            event.id(),
            waiting.len()
        );

        let done = event.clone();
        let client = self.clone();
        when_all(waiting, move |ready| match ready {
            Ok(()) => client.launch(move || {
                let outcome = run_task(label, task);
                done.complete(outcome);
            }),
            Err(cause) => done.complete(Err(dependency_error(label, &cause))),
        });

        event
    }

    fn synchronize(&self) -> Result<()> {
        let events = std::mem::take(&mut *self.in_flight.lock());
        Event::wait_all(&events)
    }
}
