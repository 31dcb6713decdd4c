// ── Bounded error tolerance ──
//
// One primitive for the "swallow until the threshold, then escalate"
// policy. Callers supply the classifier that tells timeouts, cancellation,
// and other failures apart; the budget owns the counter.

/// What kind of failure an error represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Other,
    /// Not a failure: the caller gave up. Never counted.
    Cancelled,
}

/// Outcome of feeding a result through an [`ErrorBudget`].
#[derive(Debug)]
pub enum Settled<T, E> {
    /// The operation succeeded; the counter is back to zero.
    Fresh(T),
    /// A counted failure still within budget. Serve stale data.
    Tolerated {
        kind: FailureKind,
        errors: u32,
        error: E,
    },
    /// A counted failure that reached the threshold.
    Exhausted {
        kind: FailureKind,
        errors: u32,
        error: E,
    },
    /// Cancellation; the counter was left untouched.
    Cancelled(E),
}

/// Counts consecutive failures against a fixed threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBudget {
    max_errors: u32,
    consecutive: u32,
}

impl ErrorBudget {
    pub fn new(max_errors: u32) -> Self {
        Self {
            max_errors,
            consecutive: 0,
        }
    }

    /// Current run of consecutive failures.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn max_errors(&self) -> u32 {
        self.max_errors
    }

    /// Whether the last counted failure reached the threshold.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive >= self.max_errors
    }

    /// Reset after a success.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Settle one attempt: success resets, a failure is classified and
    /// counted, cancellation passes through uncounted.
    pub fn settle<T, E>(
        &mut self,
        result: Result<T, E>,
        classify: impl FnOnce(&E) -> FailureKind,
    ) -> Settled<T, E> {
        let error = match result {
            Ok(value) => {
                self.reset();
                return Settled::Fresh(value);
            }
            Err(error) => error,
        };

        let kind = classify(&error);
        if kind == FailureKind::Cancelled {
            return Settled::Cancelled(error);
        }

        self.consecutive = self.consecutive.saturating_add(1);
        let errors = self.consecutive;
        if self.is_exhausted() {
            Settled::Exhausted {
                kind,
                errors,
                error,
            }
        } else {
            Settled::Tolerated {
                kind,
                errors,
                error,
            }
        }
    }
}
