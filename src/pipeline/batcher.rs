//! Batching adapter: single items in, fixed-size batches out.

use super::queue::{QueueClosed, QueueSender};
use super::task::Task;

/// Accumulates items and releases them in batches of exactly `batch_size`;
/// the remainder is released by [`Self::flush`]. An empty batch is never released.
#[derive(Debug)]
pub struct Batcher<T> {
    buffer: Vec<T>,
    batch_size: usize,
}

impl<T> Batcher<T> {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Add one item; returns a full batch once the buffer reaches `batch_size`.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buffer.push(item);
        if self.buffer.len() >= self.batch_size {
            Some(self.take_full())
        } else {
            None
        }
    }

    /// Add many items; returns every full batch they completed, in order.
    pub fn add<I>(&mut self, items: I) -> Vec<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut ready = Vec::new();
        for item in items {
            if let Some(batch) = self.push(item) {
                ready.push(batch);
            }
        }
        ready
    }

    /// Release whatever remains (end of stream). `None` when nothing is buffered.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    fn take_full(&mut self) -> Vec<T> {
        let rest = self.buffer.split_off(self.batch_size);
        std::mem::replace(&mut self.buffer, rest)
    }
}

/// A producer's view of its output queue: items are batched to the downstream
/// stage's input batch size before being put.
pub struct BatchingSender<T> {
    queue: QueueSender<Vec<T>>,
    batcher: Batcher<T>,
}

impl<T> BatchingSender<T> {
    pub fn new(queue: QueueSender<Vec<T>>, batch_size: usize) -> Self {
        Self {
            queue,
            batcher: Batcher::new(batch_size),
        }
    }

    pub fn send(&mut self, item: T) -> Result<(), QueueClosed> {
        match self.batcher.push(item) {
            Some(batch) => self.queue.put(Task::Payload(batch)),
            None => Ok(()),
        }
    }

    /// Flush the partial batch, then signal EOS.
    pub fn finish(mut self) -> Result<(), QueueClosed> {
        if let Some(batch) = self.batcher.flush() {
            self.queue.put(Task::Payload(batch))?;
        }
        self.queue.put(Task::Eos)
    }
}
