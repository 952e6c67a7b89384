use std::sync::Arc;

use tracing::warn;

use crate::common::errors::ReplyError;

/// Transport-side delivery of a text reply. Must not block.
pub trait ReplySink: Send + Sync {
    fn send(&self, text: String) -> Result<(), ReplyError>;
}

/// Fire-and-forget reply target. Delivery failures are logged and dropped.
#[derive(Clone)]
pub struct ReplyChannel {
    sink: Arc<dyn ReplySink>,
}

impl ReplyChannel {
    pub fn new(sink: Arc<dyn ReplySink>) -> Self {
        Self { sink }
    }

    pub fn notify(&self, text: impl Into<String>) {
        if let Err(e) = self.sink.send(text.into()) {
            warn!("Reply dropped: {e}");
        }
    }
}

impl std::fmt::Debug for ReplyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyChannel").finish_non_exhaustive()
    }
}

impl<F> ReplySink for F
where
    F: Fn(String) -> Result<(), ReplyError> + Send + Sync,
{
    fn send(&self, text: String) -> Result<(), ReplyError> {
        self(text)
    }
}
