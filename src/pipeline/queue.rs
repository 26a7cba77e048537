//! Bounded stage queue: a crossbeam MPMC channel plus EOS quorum counting.
//!
//! Fan-in: EOS tokens from upstream producers are absorbed until all
//! `producers` have signalled. Fan-out: the producer whose EOS completes the
//! quorum enqueues one EOS per downstream consumer, so every worker reading the
//! queue sees exactly one and ends its loop.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::task::Task;

/// Returned by [`QueueSender::put`] when every receiver is gone (the caller
/// dropped the pipeline output, or all downstream workers exited).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stage queue closed: no downstream consumer left")]
pub struct QueueClosed;

/// Shared EOS counter for one queue. Increment-and-compare is a single `fetch_add`.
#[derive(Debug)]
pub struct EosQuorum {
    producers: usize,
    consumers: usize,
    received: AtomicUsize,
}

impl EosQuorum {
    fn new(producers: usize, consumers: usize) -> Self {
        Self {
            producers: producers.max(1),
            consumers: consumers.max(1),
            received: AtomicUsize::new(0),
        }
    }

    /// Record one EOS. True only for the arrival that completes the quorum.
    fn arrive(&self) -> bool {
        let n = self.received.fetch_add(1, Ordering::AcqRel) + 1;
        if n > self.producers {
            warn!(
                "stage queue got EOS #{} but only expects {} producers; ignoring",
                n, self.producers
            );
            return false;
        }
        n == self.producers
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::Acquire).min(self.producers)
    }

    pub fn reached(&self) -> bool {
        self.received.load(Ordering::Acquire) >= self.producers
    }

    pub fn producers(&self) -> usize {
        self.producers
    }
}

/// Producer half. Cloned once per upstream worker.
pub struct QueueSender<T> {
    tx: Sender<Task<T>>,
    quorum: Arc<EosQuorum>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            quorum: Arc::clone(&self.quorum),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue a payload (blocking while the queue is full), or count an EOS.
    pub fn put(&self, task: Task<T>) -> Result<(), QueueClosed> {
        match task {
            Task::Payload(_) => self.tx.send(task).map_err(|_| QueueClosed),
            Task::Eos => {
                if self.quorum.arrive() {
                    debug!(
                        "EOS quorum reached ({} producers), broadcasting to {} consumers",
                        self.quorum.producers, self.quorum.consumers
                    );
                    for _ in 0..self.quorum.consumers {
                        self.tx.send(Task::Eos).map_err(|_| QueueClosed)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Non-blocking payload put. EOS always goes through [`Self::put`].
    pub fn try_put(&self, payload: T) -> Result<(), TrySendError<Task<T>>> {
        self.tx.try_send(Task::Payload(payload))
    }

    pub fn quorum(&self) -> &EosQuorum {
        &self.quorum
    }
}

/// Consumer half. Cloned once per downstream worker.
pub struct QueueReceiver<T> {
    rx: Receiver<Task<T>>,
    quorum: Arc<EosQuorum>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            quorum: Arc::clone(&self.quorum),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Block until a payload or an EOS is available.
    ///
    /// If every producer handle is dropped before the quorum is reached (an
    /// upstream thread died), the disconnect is reported as EOS so the
    /// consumer still terminates.
    pub fn get(&self) -> Task<T> {
        match self.rx.recv() {
            Ok(task) => task,
            Err(_) => {
                if !self.quorum.reached() {
                    warn!(
                        "stage queue closed after {}/{} EOS; treating as end of stream",
                        self.quorum.received(),
                        self.quorum.producers
                    );
                }
                Task::Eos
            }
        }
    }

    /// In-flight tasks (payloads plus any broadcast EOS not yet taken).
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn quorum(&self) -> &EosQuorum {
        &self.quorum
    }
}

/// Fixed-capacity queue between two stages. Use [`Self::split`] to hand the
/// halves to the producing and consuming worker pools.
pub struct StageQueue<T> {
    sender: QueueSender<T>,
    receiver: QueueReceiver<T>,
    capacity: usize,
}

impl<T> StageQueue<T> {
    /// `producers` EOS tokens close the queue; `consumers` EOS tokens are then broadcast.
    /// A zero capacity is raised to 1 so the queue never degrades into a rendezvous.
    pub fn new(producers: usize, consumers: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded::<Task<T>>(capacity);
        let quorum = Arc::new(EosQuorum::new(producers, consumers));
        Self {
            sender: QueueSender {
                tx,
                quorum: Arc::clone(&quorum),
            },
            receiver: QueueReceiver { rx, quorum },
            capacity,
        }
    }

    pub fn put(&self, task: Task<T>) -> Result<(), QueueClosed> {
        self.sender.put(task)
    }

    pub fn get(&self) -> Task<T> {
        self.receiver.get()
    }

    pub fn try_put(&self, payload: T) -> Result<(), TrySendError<Task<T>>> {
        self.sender.try_put(payload)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn eos_received(&self) -> usize {
        self.receiver.quorum.received()
    }

    pub fn split(self) -> (QueueSender<T>, QueueReceiver<T>) {
        (self.sender, self.receiver)
    }
}
