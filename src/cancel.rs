//! Cooperative cancellation with optional deadlines.
//!
//! A [`CancellationToken`] is handed to every provider call. Cancelling a
//! token cancels all tokens derived from it with [`CancellationToken::child`],
//! wakes any thread blocked in [`CancellationToken::sleep`], and makes the next
//! transport exchange fail fast. Deadlines shrink per-request HTTP timeouts so
//! an in-flight call never outlives its caller by more than the remaining
//! budget.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::error::{Result, RouteError};

#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    wake: Condvar,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct State {
    cancelled: bool,
    children: Vec<Weak<Inner>>,
}

impl Inner {
    fn new(deadline: Option<Instant>, cancelled: bool) -> Self {
        Self {
            state: Mutex::new(State {
                cancelled,
                children: Vec::new(),
            }),
            wake: Condvar::new(),
            deadline,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        let children = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.children)
        };
        self.wake.notify_all();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// A token with no deadline.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(None, false)),
        }
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::new(Instant::now().checked_add(timeout), false)),
        }
    }

    /// Derives a token cancelled together with `self` (but not vice versa).
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Like [`child`](Self::child) with a deadline no later than `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let local = Instant::now().checked_add(timeout);
        let deadline = match (self.inner.deadline, local) {
            (Some(parent), Some(local)) => Some(parent.min(local)),
            (parent, local) => parent.or(local),
        };
        self.derive(deadline)
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let mut state = self.inner.lock();
        let child = Arc::new(Inner::new(deadline, state.cancelled));
        if !state.cancelled {
            state.children.retain(|weak| weak.strong_count() > 0);
            state.children.push(Arc::downgrade(&child));
        }
        Self { inner: child }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// True when both handles refer to the same token.
    pub fn same_token(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled || self.deadline_passed()
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`RouteError::Cancelled`] when the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RouteError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks for `duration`, returning early with `Cancelled` if the token
    /// fires or the deadline arrives first.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let start = Instant::now();
        let wake_at = start.checked_add(duration).unwrap_or(start);
        let limit = match self.inner.deadline {
            Some(deadline) if deadline < wake_at => deadline,
            _ => wake_at,
        };

        let mut state = self.inner.lock();
        loop {
            if state.cancelled {
                return Err(RouteError::Cancelled);
            }
            let now = Instant::now();
            if now >= limit {
                break;
            }
            state = self
                .inner
                .wake
                .wait_timeout(state, limit - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);

        if limit < wake_at { Err(RouteError::Cancelled) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_propagates_to_children() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let grandchild = child.child();
        assert!(!grandchild.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.check(), Err(RouteError::Cancelled));
    }

    #[test]
    fn test_child_cancel_leaves_parent_alone() {
        let parent = CancellationToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_token_starts_cancelled() {
        let parent = CancellationToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancellationToken::with_timeout(Duration::from_millis(10));
        assert!(token.remaining().is_some());
        thread::sleep(Duration::from_millis(30));
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_child_deadline_never_exceeds_parent() {
        let parent = CancellationToken::with_timeout(Duration::from_millis(50));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert!(child.remaining().unwrap() <= Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_completes_without_cancellation() {
        let token = CancellationToken::new();
        assert!(token.sleep(Duration::from_millis(5)).is_ok());
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(10));
        handle.join().unwrap();

        assert_eq!(result, Err(RouteError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_stops_at_deadline() {
        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_secs(10)), Err(RouteError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
