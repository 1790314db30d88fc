//! Application error type and transient/fatal classification.
//!
//! Every fallible collaborator call in this crate returns a [`MenderError`]:
//! a wrapped cause plus a single boolean that the state machine uses to pick
//! its next state. No other part of the error is inspected for control flow.

use std::fmt;

/// Result alias used throughout the crate's controller-facing APIs.
pub type Result<T> = std::result::Result<T, MenderError>;

/// A classified failure: a cause plus whether the agent should give up.
///
/// `fatal == true` means the state machine must terminate at `done`.
/// `fatal == false` (transient) means it should retry, either immediately
/// (looping back through `init`) or after a wait.
#[derive(Debug)]
pub struct MenderError {
    cause: anyhow::Error,
    fatal: bool,
}

impl MenderError {
    /// Wrap `cause` as a transient (retryable) error.
    pub fn transient<E>(cause: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        MenderError {
            cause: cause.into(),
            fatal: false,
        }
    }

    /// Wrap `cause` as a fatal (terminal) error.
    pub fn fatal<E>(cause: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        MenderError {
            cause: cause.into(),
            fatal: true,
        }
    }

    /// Whether this error should terminate the agent.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// The underlying cause, as a shared reference for logging.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Re-tag an existing error as fatal, preserving the cause chain.
    pub fn into_fatal(self) -> Self {
        MenderError {
            cause: self.cause,
            fatal: true,
        }
    }
}

impl fmt::Display for MenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fatal {
            write!(f, "fatal error: {}", self.cause)
        } else {
            write!(f, "transient error: {}", self.cause)
        }
    }
}

impl std::error::Error for MenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

/// Sentinel cause used when `CheckUpdate` offers a deployment that matches
/// the currently-installed artifact; states must match on this cause rather
/// than on the returned `UpdateResponse` pointer (see the data-model
/// invariant on `CheckUpdate`).
#[derive(Debug, thiserror::Error)]
#[error("offered update is already installed")]
pub struct AlreadyInstalled;

/// True if `err`'s cause chain contains [`AlreadyInstalled`].
pub fn is_already_installed(err: &MenderError) -> bool {
    err.cause().downcast_ref::<AlreadyInstalled>().is_some()
}
