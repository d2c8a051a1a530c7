//! Debounced current-location lookup.
//!
//! Rapid repeated requests (a user tapping "use my location") collapse into a
//! single provider call: each new request cancels the one before it and waits
//! a quiet period before reaching the provider.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::traits::GeolocationProvider;
use crate::types::Coordinate;

const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

pub struct LocationLookup<P> {
    provider: P,
    quiet_period: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl<P: GeolocationProvider> LocationLookup<P> {
    pub fn new(provider: P) -> Self {
        Self::with_quiet_period(provider, DEFAULT_QUIET_PERIOD)
    }

    pub fn with_quiet_period(provider: P, quiet_period: Duration) -> Self {
        Self {
            provider,
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves the current location. A later call supersedes this one,
    /// which then fails with `Cancelled`.
    pub fn request(&self, cancel: &CancellationToken) -> Result<Coordinate> {
        let token = cancel.child();
        if let Some(previous) = self.pending().replace(token.clone()) {
            debug!("superseding pending location request");
            previous.cancel();
        }

        let result = token
            .sleep(self.quiet_period)
            .and_then(|()| self.provider.current_location(&token));

        let mut pending = self.pending();
        if pending.as_ref().is_some_and(|current| current.same_token(&token)) {
            *pending = None;
        }
        result
    }

    /// Cancels the pending request, if any.
    pub fn cancel_pending(&self) {
        if let Some(token) = self.pending().take() {
            token.cancel();
        }
    }
}
