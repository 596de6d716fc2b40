//! Handles on exchanges running on the Tokio runtime.
//!
//! [`Pending`] is the bare handle returned by
//! [`Client::send_async`](crate::Client::send_async); it wraps every failure in
//! [`Error::AsyncCompletion`]. [`Deferred`] adapts a `Pending` into a
//! composable value whose combinators run when the exchange completes.

use crate::codec::JsonCodec;
use crate::{Error, Response, Result};
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{AbortHandle, JoinError, JoinHandle};

/// The pending handle of an asynchronous exchange.
pub type PendingResponse<C = JsonCodec> = Pending<Response<C>>;

/// A cancellable handle on a spawned exchange.
///
/// Await it to get the result. Dropping the handle does not cancel the
/// exchange; call [`Pending::cancel`] for that.
#[must_use = "a pending exchange does nothing useful unless awaited or cancelled"]
pub struct Pending<T> {
    task: JoinHandle<Result<T>>,
}

impl<T> Pending<T>
where
    T: Send + 'static,
{
    pub(crate) fn spawn<F>(exchange: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            task: tokio::spawn(exchange),
        }
    }
}

impl<T> Pending<T> {
    /// Cancels the exchange.
    ///
    /// The transport future is dropped at its next suspension point and the
    /// handle resolves to [`Error::Cancelled`] (wrapped). Cancelling an
    /// exchange that already completed has no effect.
    pub fn cancel(&self) {
        if !self.task.is_finished() {
            tracing::warn!("Cancelling pending exchange");
        }
        self.task.abort();
    }

    /// Returns `true` once the exchange has completed, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A handle that can cancel the exchange without owning this value.
    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match self.task.poll_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(result)) => result,
            Poll::Ready(Err(join_error)) => Err(from_join_error(join_error)),
        };

        Poll::Ready(outcome.map_err(|source| Error::AsyncCompletion {
            source: Box::new(source),
        }))
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

fn from_join_error(error: JoinError) -> Error {
    if error.is_cancelled() {
        Error::Cancelled
    } else {
        Error::Interrupted(format!("exchange task failed: {}", error))
    }
}

/// A composable asynchronous result.
///
/// Built from a [`Pending`] handle; failures surface unwrapped. Combinators
/// are applied when the value is awaited, in the order they were chained.
/// Cancellation always targets the underlying exchange.
///
/// # Examples
///
/// ```no_run
/// use encore::{Client, Handler, Request};
///
/// # async fn example() -> Result<(), encore::Error> {
/// let client = Client::new()?;
/// let request = Request::get("https://api.example.com/health")?;
///
/// let healthy = client
///     .send_deferred(request, Handler::text())
///     .inspect_err(|e| eprintln!("health check failed: {e}"))
///     .map(|response| response.is_2xx())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "a deferred value does nothing useful unless awaited or cancelled"]
pub struct Deferred<T> {
    future: BoxFuture<'static, Result<T>>,
    abort: AbortHandle,
}

impl<T> Deferred<T>
where
    T: Send + 'static,
{
    /// Transforms the success value.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Deferred {
            future: self.future.map(|result| result.map(f)).boxed(),
            abort: self.abort,
        }
    }

    /// Chains a fallible transformation of the success value.
    pub fn and_then<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        Deferred {
            future: self.future.map(|result| result.and_then(f)).boxed(),
            abort: self.abort,
        }
    }

    /// Turns a failure into a value, or into another failure.
    pub fn recover<F>(self, f: F) -> Deferred<T>
    where
        F: FnOnce(Error) -> Result<T> + Send + 'static,
    {
        Deferred {
            future: self.future.map(|result| result.or_else(f)).boxed(),
            abort: self.abort,
        }
    }

    /// Runs `f` on the success value.
    pub fn inspect_ok<F>(self, f: F) -> Deferred<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        Deferred {
            future: self.future.map(|result| result.inspect(f)).boxed(),
            abort: self.abort,
        }
    }

    /// Runs `f` on the failure.
    pub fn inspect_err<F>(self, f: F) -> Deferred<T>
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        Deferred {
            future: self.future.map(|result| result.inspect_err(f)).boxed(),
            abort: self.abort,
        }
    }
}

impl<T> Deferred<T> {
    /// Cancels the underlying exchange; a no-op once it has completed.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Returns `true` once the underlying exchange has completed.
    ///
    /// Combinators still run when the value is awaited.
    pub fn is_completed(&self) -> bool {
        self.abort.is_finished()
    }
}

impl<T> From<Pending<T>> for Deferred<T>
where
    T: Send + 'static,
{
    fn from(pending: Pending<T>) -> Self {
        let abort = pending.abort_handle();
        Deferred {
            future: pending.map(|result| result.map_err(Error::into_root_cause)).boxed(),
            abort,
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("completed", &self.abort.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pending_wraps_failures() {
        let pending: Pending<u32> = Pending::spawn(async { Err(Error::EmptyBody) });
        let err = pending.await.unwrap_err();
        assert!(matches!(err, Error::AsyncCompletion { .. }));
        assert!(matches!(err.root_cause(), Error::EmptyBody));
    }

    #[tokio::test]
    async fn test_cancel_before_completion() {
        let pending: Pending<u32> = Pending::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        });
        pending.cancel();

        let err = pending.await.unwrap_err();
        assert!(matches!(err.root_cause(), Error::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_a_no_op() {
        let pending: Pending<u32> = Pending::spawn(async { Ok(7) });
        while !pending.is_finished() {
            tokio::task::yield_now().await;
        }
        pending.cancel();
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_deferred_combinators_run_in_order() {
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);

        let value = Deferred::from(Pending::spawn(async { Ok(20u32) }))
            .map(|n| n + 1)
            .inspect_ok(move |n| seen_clone.store(*n == 21, Ordering::SeqCst))
            .and_then(|n| Ok(n * 2))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deferred_unwraps_and_recovers_failures() {
        let err = Deferred::from(Pending::<u32>::spawn(async { Err(Error::Cancelled) }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let recovered = Deferred::from(Pending::<u32>::spawn(async { Err(Error::EmptyBody) }))
            .inspect_err(|e| assert!(matches!(e, Error::EmptyBody)))
            .recover(|_| Ok(0))
            .await
            .unwrap();
        assert_eq!(recovered, 0);
    }

    #[tokio::test]
    async fn test_deferred_cancel_reaches_the_exchange() {
        let deferred: Deferred<u32> = Deferred::from(Pending::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        }))
        .map(|n| n + 1);

        assert!(!deferred.is_completed());
        deferred.cancel();
        assert!(matches!(deferred.await, Err(Error::Cancelled)));
    }
}
