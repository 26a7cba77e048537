//! Driving loop: feeds external input into queue 0, then one EOS.

use log::debug;
use std::thread::{self, JoinHandle};

use super::batcher::BatchingSender;
use super::queue::QueueSender;

/// Run the driving loop on the current thread. Items are batched to the first
/// stage's input batch size. Stops early if queue 0 has no consumer left.
/// Returns the number of items fed.
pub fn run_driver_loop<I, T>(input: I, queue: QueueSender<Vec<T>>, batch_size: usize) -> usize
where
    I: Iterator<Item = T>,
{
    let mut sender = BatchingSender::new(queue, batch_size);
    let mut count = 0_usize;
    for item in input {
        if sender.send(item).is_err() {
            debug!("driver: queue 0 closed after {} items", count);
            return count;
        }
        count += 1;
    }
    if sender.finish().is_err() {
        debug!("driver: queue 0 closed before EOS");
    }
    debug!("driver: fed {} items", count);
    count
}

/// Spawn the driving loop on its own thread so the caller can read the
/// terminal queue while input is still being fed.
pub fn spawn_driver_thread<I, T>(
    input: I,
    queue: QueueSender<Vec<T>>,
    batch_size: usize,
) -> JoinHandle<usize>
where
    I: Iterator<Item = T> + Send + 'static,
    T: Send + 'static,
{
    thread::spawn(move || run_driver_loop(input, queue, batch_size))
}
