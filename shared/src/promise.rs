use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use smol::{Task, Timer};

use crate::{error::CommError, scheduler::Scheduler};

enum PromiseState<T> {
    Pending(Task<Result<T, CommError>>),
    Settled(Option<Result<T, CommError>>),
    Cancelled,
}

/// A value that will be available later.
///
/// Awaiting a `Promise` yields `Result<T, CommError>`; a cancelled promise
/// yields [`CommError::Cancelled`].
pub struct Promise<T> {
    state: PromiseState<T>,
}

// the settled value is only ever moved out, never pinned
impl<T> Unpin for Promise<T> {}

impl<T: 'static> Promise<T> {
    /// Starts `future` on `scheduler` and returns a handle to its result
    pub fn spawn(
        scheduler: &Scheduler,
        future: impl Future<Output = Result<T, CommError>> + 'static,
    ) -> Self {
        Self {
            state: PromiseState::Pending(scheduler.spawn(future)),
        }
    }

    pub fn resolved(value: T) -> Self {
        Self {
            state: PromiseState::Settled(Some(Ok(value))),
        }
    }

    pub fn rejected(error: CommError) -> Self {
        Self {
            state: PromiseState::Settled(Some(Err(error))),
        }
    }

    /// Stops the underlying work. Only this promise is affected.
    pub fn cancel(&mut self) {
        if let PromiseState::Pending(_) = self.state {
            // dropping the task cancels it
            self.state = PromiseState::Cancelled;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, PromiseState::Cancelled)
    }

    pub fn is_settled(&self) -> bool {
        match &self.state {
            PromiseState::Pending(task) => task.is_finished(),
            PromiseState::Settled(_) => true,
            PromiseState::Cancelled => false,
        }
    }

    /// Awaits the promise, giving up with [`CommError::Timeout`] once `after`
    /// has elapsed
    pub async fn timeout(self, after: Duration) -> Result<T, CommError> {
        smol::future::or(self, async move {
            Timer::after(after).await;
            Err(CommError::Timeout { after })
        })
        .await
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, CommError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PromiseState::Pending(task) => Pin::new(task).poll(cx),
            PromiseState::Settled(result) => match result.take() {
                Some(result) => Poll::Ready(result),
                None => Poll::Ready(Err(CommError::Destroyed {
                    what: "Promise (already awaited)".to_string(),
                })),
            },
            PromiseState::Cancelled => Poll::Ready(Err(CommError::Cancelled)),
        }
    }
}
