//! Per-token feedback (haptics on device).

/// Side effect fired for every streamed token outside voice mode.
///
/// Calls are fire-and-forget: implementations must return immediately and
/// must never fail the stream. Anything slow belongs on a spawned task.
pub trait TokenFeedback: Send + Sync {
    fn token_emitted(&self);
}

/// Feedback sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl TokenFeedback for NoFeedback {
    fn token_emitted(&self) {}
}
