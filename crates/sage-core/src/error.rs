#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The bounded queue has no free slot; the caller may retry later.
    #[error("task queue is full")]
    Full,

    #[error("task queue is closed")]
    Closed,
}
