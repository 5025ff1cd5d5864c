//! Handle to the decoded result of an asynchronous call.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::CancelHandle;

enum State<T> {
    Pending,
    Ready(Result<T>),
    Cancelled,
    Taken,
}

struct Slot<T> {
    state: State<T>,
    waker: Option<Waker>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type CancelHook = Box<dyn FnOnce() + Send>;

/// Result of a call dispatched on the transport's workers.
///
/// Resolves to the decoded value, never to the raw response. Retrieve it by
/// blocking with [`CallFuture::get`] / [`CallFuture::get_timeout`] or by
/// `.await`ing the handle.
pub struct CallFuture<T> {
    shared: Arc<Shared<T>>,
    cancel: Option<Box<dyn CancelHandle>>,
    on_cancel: Mutex<Option<CancelHook>>,
}

/// Error stored when a completion is dropped without ever running.
pub(crate) const DROPPED: &str = "call dropped before completion";

/// Write side of a [`CallFuture`], held by the transport completion.
///
/// Dropping it while the call is still pending fails the call, so a waiter
/// never outlives the workers that were supposed to finish it.
pub(crate) struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Completer<T> {
    /// Stores the result unless the call was cancelled first.
    pub(crate) fn complete(self, result: Result<T>) -> bool {
        self.settle(result)
    }

    fn settle(&self, result: Result<T>) -> bool {
        let waker = {
            let mut slot = self.shared.lock();
            if !matches!(slot.state, State::Pending) {
                return false;
            }
            slot.state = State::Ready(result);
            slot.waker.take()
        };
        self.shared.changed.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.settle(Err(Error::transport(DROPPED)));
    }
}

impl<T> CallFuture<T> {
    pub(crate) fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                state: State::Pending,
                waker: None,
            }),
            changed: Condvar::new(),
        });
        let future = Self {
            shared: shared.clone(),
            cancel: None,
            on_cancel: Mutex::new(None),
        };
        (future, Completer { shared })
    }

    pub(crate) fn attach<F>(mut self, cancel: Box<dyn CancelHandle>, on_cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel = Some(cancel);
        self.on_cancel = Mutex::new(Some(Box::new(on_cancel)));
        self
    }

    /// An already completed call, e.g. for test doubles of generated traits.
    pub fn ready(result: Result<T>) -> Self {
        let (future, completer) = Self::pending();
        completer.complete(result);
        future
    }

    /// Cancels a pending call. Returns false if the result already arrived,
    /// in which case it stays retrievable.
    pub fn cancel(&self) -> bool {
        let waker = {
            let mut slot = self.shared.lock();
            if !matches!(slot.state, State::Pending) {
                return false;
            }
            slot.state = State::Cancelled;
            slot.waker.take()
        };
        self.shared.changed.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }

        if let Some(handle) = &self.cancel {
            handle.cancel();
        }
        let hook = self
            .on_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.lock().state, State::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.shared.lock().state, State::Pending)
    }

    /// Blocks until the call completes or is cancelled.
    pub fn get(self) -> Result<T> {
        let slot = self.shared.lock();
        let mut slot = self
            .shared
            .changed
            .wait_while(slot, |s| matches!(s.state, State::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        take(&mut slot.state)
    }

    /// Like [`CallFuture::get`] but gives up with [`Error::Timeout`] after
    /// `timeout`, leaving the call running and the handle usable.
    pub fn get_timeout(&mut self, timeout: Duration) -> Result<T> {
        let slot = self.shared.lock();
        let (mut slot, _) = self
            .shared
            .changed
            .wait_timeout_while(slot, timeout, |s| matches!(s.state, State::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        take(&mut slot.state)
    }
}

fn take<T>(state: &mut State<T>) -> Result<T> {
    match mem::replace(state, State::Taken) {
        State::Ready(result) => result,
        State::Pending => {
            *state = State::Pending;
            Err(Error::Timeout)
        }
        State::Cancelled => {
            *state = State::Cancelled;
            Err(Error::Cancelled)
        }
        State::Taken => Err(Error::Configuration(
            "call result was already retrieved".to_string(),
        )),
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.lock();
        if matches!(slot.state, State::Pending) {
            slot.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        Poll::Ready(take(&mut slot.state))
    }
}

impl<T> fmt::Debug for CallFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.lock().state {
            State::Pending => "pending",
            State::Ready(Ok(_)) => "ready",
            State::Ready(Err(_)) => "failed",
            State::Cancelled => "cancelled",
            State::Taken => "taken",
        };
        f.debug_struct("CallFuture").field("state", &state).finish()
    }
}
