use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::record::Record;

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<Record>,
    open_producers: usize,
    sealed: bool,
    closed: bool,
}

impl State {
    fn try_close(&mut self) -> bool {
        if !self.closed && self.sealed && self.open_producers == 0 {
            self.closed = true;
        }
        self.closed
    }
}

/// FIFO hand-off between ingestion and aggregation threads.
///
/// The queue closes once it has been sealed and every registered producer has
/// finished. Closing happens exactly once and never reverts; after that no push
/// succeeds, but everything enqueued before remains available to consumers.
///
/// All state, including the closed flag, lives behind one mutex so consumers
/// evaluate `empty && closed` atomically.
#[derive(Debug)]
pub struct SharedQueue {
    state: Mutex<State>,
    available: Condvar,
    space: Condvar,
    capacity: Option<usize>,
}

impl SharedQueue {
    /// `None` makes the queue unbounded. A bound of zero is treated as one.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: Condvar::new(),
            space: Condvar::new(),
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    // A panicking thread never leaves the queue half-modified, so a poisoned
    // lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a producer. Registering after the queue has closed yields a
    /// handle whose pushes are all rejected.
    pub fn register_producer(self: &Arc<Self>) -> ProducerHandle {
        let mut state = self.lock();
        let active = !state.closed;
        if active {
            state.open_producers += 1;
        }

        ProducerHandle {
            queue: Arc::clone(self),
            active,
        }
    }

    /// Declares that no further producers will register. Until then the queue
    /// stays open even when no producer is currently registered.
    pub fn seal(&self) {
        let closed = {
            let mut state = self.lock();
            state.sealed = true;
            state.try_close()
        };

        if closed {
            self.wake_all();
        }
    }

    /// Blocks until records are available or the queue is closed, then takes
    /// every available record in FIFO order. `None` means closed and drained.
    pub fn next_batch(&self) -> Option<Vec<Record>> {
        let state = self.lock();
        let mut state = self
            .available
            .wait_while(state, |s| s.queue.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if state.queue.is_empty() {
            return None;
        }

        let batch = state.queue.drain(..).collect::<Vec<_>>();
        drop(state);

        if self.capacity.is_some() {
            self.space.notify_all();
        }

        Some(batch)
    }

    /// Closes the queue regardless of open producers, so that producers blocked on
    /// a full queue are released when nobody is left to drain it. Records already
    /// enqueued stay available.
    pub fn abandon(&self) {
        self.lock().closed = true;
        self.wake_all();
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn push(&self, record: Record) -> Result<(), Record> {
        let state = self.lock();
        let mut state = match self.capacity {
            Some(capacity) => self
                .space
                .wait_while(state, |s| s.queue.len() >= capacity && !s.closed)
                .unwrap_or_else(PoisonError::into_inner),
            None => state,
        };

        if state.closed {
            return Err(record);
        }

        state.queue.push_back(record);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    fn finish_producer(&self) {
        let closed = {
            let mut state = self.lock();
            state.open_producers = state.open_producers.saturating_sub(1);
            state.try_close()
        };

        if closed {
            self.wake_all();
        }
    }

    fn wake_all(&self) {
        self.available.notify_all();
        self.space.notify_all();
    }
}

impl Default for SharedQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A producer's right to enqueue. Dropping the handle, including during a panic
/// unwind, finishes the producer, and the last finishing producer closes the queue
/// and wakes every waiter.
#[derive(Debug)]
pub struct ProducerHandle {
    queue: Arc<SharedQueue>,
    active: bool,
}

impl ProducerHandle {
    /// Enqueues a record and wakes one waiting consumer. The record is handed back
    /// if the queue no longer accepts input.
    pub fn push(&self, record: Record) -> Result<(), Record> {
        if !self.active {
            return Err(record);
        }
        self.queue.push(record)
    }

    pub fn finish(self) {}
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            self.queue.finish_producer();
        }
    }
}
