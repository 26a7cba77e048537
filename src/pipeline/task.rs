//! Task envelope carried by every stage queue.

/// One hop of work between two stages: a payload batch, or end-of-stream.
///
/// A payload is consumed exactly once by the immediately downstream stage; an
/// EOS carries nothing and only counts towards the receiving queue's quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task<T> {
    Payload(T),
    Eos,
}

impl<T> Task<T> {
    pub fn is_eos(&self) -> bool {
        matches!(self, Task::Eos)
    }

    /// Payload, or `None` for EOS.
    pub fn into_payload(self) -> Option<T> {
        match self {
            Task::Payload(p) => Some(p),
            Task::Eos => None,
        }
    }
}
