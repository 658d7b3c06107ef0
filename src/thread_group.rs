//! In-process worker groups backed by OS threads.
//!
//! A [`ThreadGroup`] runs one closure per worker on its own scoped thread and
//! hands each worker a [`ThreadCommunicator`]. Collectives meet at a shared
//! rendezvous: every worker deposits its buffer, the last one to arrive
//! reduces all contributions in rank order and publishes the result, and the
//! rest wake up and copy it out. All workers therefore observe bit-identical
//! results.
//!
//! Unlike a real process group, a worker that panics or returns early cannot
//! leave its peers blocked: any collective that can no longer complete fails
//! with [`Error::PeerExited`] on every worker still waiting for it.

use crate::comm::Communicator;
use crate::datatype::{DatatypeTag, Element};
use crate::error::{Error, Result};
use crate::ReduceOp;
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, trace, warn};

/// Environment variable read by [`ThreadGroup::from_env`].
pub const WORKERS_ENV: &str = "PARALLEL_NDARRAY_WORKERS";

/// A fixed-size group of in-process workers.
///
/// # Example
///
/// ```
/// use parallel_ndarray::{Communicator, ThreadGroup};
///
/// let group = ThreadGroup::new(3).unwrap().with_name("solver");
/// let ranks = group.run(|comm| comm.rank()).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    size: usize,
    name: String,
}

impl ThreadGroup {
    /// Create a group of `size` workers.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidGroupSize`] if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidGroupSize(size));
        }
        Ok(ThreadGroup {
            size,
            name: "worker".to_string(),
        })
    }

    /// Create a group sized from the environment.
    ///
    /// Reads [`WORKERS_ENV`]; when unset, uses the available parallelism of
    /// the machine.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the variable is set but is not a positive integer.
    pub fn from_env() -> Result<Self> {
        match std::env::var(WORKERS_ENV) {
            Ok(value) => Self::new(parse_workers(&value)?),
            Err(std::env::VarError::NotPresent) => {
                let size = thread::available_parallelism().map_or(1, NonZeroUsize::get);
                Self::new(size)
            }
            Err(e) => Err(Error::Config(format!("{WORKERS_ENV}: {e}"))),
        }
    }

    /// Set the prefix of worker thread names (`"{prefix}-{rank}"`).
    #[must_use]
    pub fn with_name(mut self, prefix: impl Into<String>) -> Self {
        self.name = prefix.into();
        self
    }

    /// Number of workers in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Prefix of worker thread names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` once per worker and collect the results in rank order.
    ///
    /// Blocks until every worker has returned. If a worker panics, the panic
    /// is resumed on the caller once all workers have been joined.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if a worker thread could not be spawned.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(ThreadCommunicator) -> R + Sync,
        R: Send,
    {
        let rendezvous = Arc::new(Rendezvous::new(self.size));
        debug!(size = self.size, name = %self.name, "starting worker group");

        thread::scope(|scope| {
            let f = &f;
            let mut handles = Vec::with_capacity(self.size);
            let mut spawn_error = None;

            for rank in 0..self.size {
                let comm = ThreadCommunicator {
                    rank,
                    size: self.size,
                    shared: Arc::clone(&rendezvous),
                };
                let spawned = thread::Builder::new()
                    .name(format!("{}-{rank}", self.name))
                    .spawn_scoped(scope, move || {
                        let _departure = Departure(Arc::clone(&comm.shared));
                        f(comm)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // Ranks that never started can never arrive.
                        for _ in rank..self.size {
                            rendezvous.depart(false);
                        }
                        spawn_error = Some(Error::Internal(format!(
                            "failed to spawn worker {rank}: {e}"
                        )));
                        break;
                    }
                }
            }

            let mut results = Vec::with_capacity(handles.len());
            let mut panic = None;
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(payload) => {
                        panic.get_or_insert(payload);
                    }
                }
            }
            if let Some(payload) = panic {
                std::panic::resume_unwind(payload);
            }

            match spawn_error {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

fn parse_workers(value: &str) -> Result<usize> {
    let size = value
        .trim()
        .parse::<usize>()
        .map_err(|e| Error::Config(format!("{WORKERS_ENV}={value:?}: {e}")))?;
    if size == 0 {
        return Err(Error::Config(format!("{WORKERS_ENV} must be at least 1")));
    }
    Ok(size)
}

/// One worker's handle to its [`ThreadGroup`].
#[derive(Debug)]
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn allreduce<T: Element>(&self, send: &[T], recv: &mut [T], op: ReduceOp) -> Result<()> {
        if send.len() != recv.len() {
            return Err(Error::InvalidBuffer);
        }
        let contribution = send.iter().map(|x| x.widen()).collect();
        let reduced = self
            .shared
            .exchange(self.rank, Call::Reduce { op, tag: T::TAG }, contribution)?;
        if reduced.len() != recv.len() {
            return Err(Error::Internal(format!(
                "rendezvous returned {} elements for a buffer of {}",
                reduced.len(),
                recv.len()
            )));
        }
        for (slot, value) in recv.iter_mut().zip(reduced.iter()) {
            *slot = T::narrow(*value);
        }
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        self.shared
            .exchange(self.rank, Call::Barrier, Vec::new())
            .map(drop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Barrier,
    Reduce { op: ReduceOp, tag: DatatypeTag },
}

impl Call {
    /// The error reported when `self` and `other` meet in one collective.
    fn conflict(self, other: Call) -> Error {
        match (self, other) {
            (Call::Reduce { op: a, tag: t }, Call::Reduce { op: b, tag: u }) if a == b && t != u => {
                Error::DatatypeMismatch
            }
            _ => Error::OpMismatch,
        }
    }
}

#[derive(Debug)]
struct Rendezvous {
    size: usize,
    state: Mutex<State>,
    turnstile: Condvar,
}

#[derive(Debug)]
struct State {
    generation: u64,
    arrived: usize,
    exited: usize,
    call: Option<Call>,
    mismatch: Option<Error>,
    slots: Vec<Option<Vec<f64>>>,
    outcome: Result<Arc<Vec<f64>>>,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Rendezvous {
            size,
            state: Mutex::new(State {
                generation: 0,
                arrived: 0,
                exited: 0,
                call: None,
                mismatch: None,
                slots: vec![None; size],
                outcome: Ok(Arc::default()),
            }),
            turnstile: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exchange(&self, rank: usize, call: Call, contribution: Vec<f64>) -> Result<Arc<Vec<f64>>> {
        let mut state = self.lock();
        if state.exited > 0 {
            warn!(rank, "collective entered after a peer exited");
            return Err(Error::PeerExited);
        }

        let generation = state.generation;
        let pending = state.call;
        match pending {
            None => state.call = Some(call),
            Some(first) if first != call => {
                state.mismatch.get_or_insert(first.conflict(call));
            }
            Some(_) => {}
        }
        state.slots[rank] = Some(contribution);
        state.arrived += 1;
        trace!(rank, generation, arrived = state.arrived, size = self.size, "arrived");

        if state.arrived == self.size {
            let outcome = state.settle();
            self.turnstile.notify_all();
            return outcome;
        }

        // A completed generation wins over a later departure.
        while state.generation == generation {
            if state.exited > 0 {
                warn!(rank, generation, "peer exited while collective was outstanding");
                return Err(Error::PeerExited);
            }
            state = self
                .turnstile
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.outcome.clone()
    }

    fn depart(&self, panicked: bool) {
        let mut state = self.lock();
        state.exited += 1;
        if panicked {
            warn!(generation = state.generation, "worker panicked, releasing peers");
        }
        self.turnstile.notify_all();
    }
}

impl State {
    fn settle(&mut self) -> Result<Arc<Vec<f64>>> {
        let call = self.call.take();
        let mismatch = self.mismatch.take();
        let slots: Vec<Vec<f64>> = self
            .slots
            .iter_mut()
            .map(|slot| slot.take().unwrap_or_default())
            .collect();
        self.arrived = 0;
        self.generation = self.generation.wrapping_add(1);

        self.outcome = match mismatch {
            Some(e) => Err(e),
            None => reduce_in_rank_order(call, slots),
        };
        self.outcome.clone()
    }
}

fn reduce_in_rank_order(call: Option<Call>, slots: Vec<Vec<f64>>) -> Result<Arc<Vec<f64>>> {
    let Some(Call::Reduce { op, .. }) = call else {
        return Ok(Arc::default());
    };
    let mut slots = slots.into_iter();
    let mut acc = slots.next().unwrap_or_default();
    let expected = acc.len();
    for (index, contribution) in slots.enumerate() {
        if contribution.len() != expected {
            return Err(Error::CountMismatch {
                rank: index + 1,
                expected,
                got: contribution.len(),
            });
        }
        for (a, b) in acc.iter_mut().zip(contribution) {
            *a = op.apply(*a, b);
        }
    }
    Ok(Arc::new(acc))
}

/// Marks a worker as gone when its closure returns or unwinds.
struct Departure(Arc<Rendezvous>);

impl Drop for Departure {
    fn drop(&mut self) {
        self.0.depart(thread::panicking());
    }
}
