use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use termsai_core::types::Operation;

pub type SessionId = u64;

/// One in-flight network operation.
///
/// A session stops mutating the view as soon as it is terminated, whether by
/// the user, by a newer session or by its own terminal event.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    operation: Operation,
    token: CancellationToken,
    terminated: AtomicBool,
}

impl Session {
    pub fn new(id: SessionId, operation: Operation) -> Self {
        Self {
            id,
            operation,
            token: CancellationToken::new(),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Mark the session finished. Returns `false` if it already was.
    pub fn terminate(&self) -> bool {
        !self.terminated.swap(true, Ordering::SeqCst)
    }

    /// Terminate and cancel any outstanding reads.
    pub fn cancel(&self) -> bool {
        let first = self.terminate();
        self.token.cancel();
        first
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// May this session still write to the view?
    pub fn is_live(&self) -> bool {
        !self.is_terminated() && !self.token.is_cancelled()
    }
}
