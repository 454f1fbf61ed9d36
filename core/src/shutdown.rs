//! Graceful shutdown traits shared by every long-lived task (provider, strategies,
//! converter, execution engine, limit matcher).

use std::future::Future;

/// Components that can shut down immediately, without async operations.
pub trait SyncShutdown {
    type Result;
    fn shutdown(&mut self) -> Self::Result;
}

/// Components that need to await something during shutdown (flushing, unsubscribing).
pub trait AsyncShutdown {
    type Result;
    fn shutdown(&mut self) -> impl Future<Output = Self::Result> + Send;
}
