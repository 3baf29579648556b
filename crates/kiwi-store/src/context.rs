//! Per-call cancellation and deadlines.
//!
//! Every store operation takes an [`OpContext`]. The store checks it before
//! checking out a connection, while statements run (via a `SQLite` progress
//! handler), while waiting on another writer's lock, and immediately before
//! committing a write.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::errors::{Result, StoreError};

/// Cancellation signal plus optional deadline for a single store call.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context tied to an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Tighten the deadline to at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Tighten the deadline to at most `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the caller has given up on this call.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`StoreError::Cancelled`] once the caller has given up.
    pub fn check(&self) -> Result<()> {
        if self.is_done() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}
