//! Callbacks delivered to the UI layer during a completion.

use pocketchat_core::conversation::ModelDescriptor;
use pocketchat_core::metrics::ModelMetrics;

/// Receives progress and completion notifications for one run.
///
/// `on_progress` always receives the full text so far, never a delta, so the
/// caller can re-run segmentation on a complete snapshot.
pub trait CompletionListener: Send {
    fn on_progress(&mut self, text_so_far: &str);

    fn on_complete(&mut self, metrics: &ModelMetrics, model: &ModelDescriptor, text: &str);
}

/// Adapts a pair of closures into a [`CompletionListener`].
pub struct CompletionCallbacks<P, C> {
    on_progress: P,
    on_complete: C,
}

impl<P, C> CompletionCallbacks<P, C>
where
    P: FnMut(&str) + Send,
    C: FnMut(&ModelMetrics, &ModelDescriptor, &str) + Send,
{
    pub fn new(on_progress: P, on_complete: C) -> Self {
        Self {
            on_progress,
            on_complete,
        }
    }
}

impl<P, C> CompletionListener for CompletionCallbacks<P, C>
where
    P: FnMut(&str) + Send,
    C: FnMut(&ModelMetrics, &ModelDescriptor, &str) + Send,
{
    fn on_progress(&mut self, text_so_far: &str) {
        (self.on_progress)(text_so_far)
    }

    fn on_complete(&mut self, metrics: &ModelMetrics, model: &ModelDescriptor, text: &str) {
        (self.on_complete)(metrics, model, text)
    }
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl CompletionListener for NullListener {
    fn on_progress(&mut self, _text_so_far: &str) {}

    fn on_complete(&mut self, _metrics: &ModelMetrics, _model: &ModelDescriptor, _text: &str) {}
}
