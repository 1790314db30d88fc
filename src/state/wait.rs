//! The cancellable timed wait: the only suspension point exposed to the
//! rest of the system besides blocking I/O inside controller calls.
//!
//! The cancel rendezvous is a synchronous, zero-capacity channel with an
//! explicit `close` for permanent shutdown. A send blocks until the waiting
//! side observes it (or the wait is not in progress, in which case the
//! single slot buffers it for the next wait).

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::time::Duration;

/// Message sent over the cancel channel.
#[derive(Debug)]
enum Signal {
    /// Wake up the current (or next) wait early.
    Cancel,
}

/// Sending half of the cancel rendezvous, held by a supervisory execution
/// context (e.g. a signal-handling thread).
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: SyncSender<Signal>,
}

impl Canceller {
    /// Request cancellation of the current (or next) wait.
    ///
    /// A cancel sent while no wait is active is buffered in the single slot
    /// and observed by the next wait entered. A second cancel sent while one
    /// is already buffered is dropped silently: the channel has no room for
    /// two pending cancels, and this is documented behavior rather than an
    /// error (see the two-phase-commit design notes).
    pub fn cancel(&self) {
        let _ = self.tx.try_send(Signal::Cancel);
    }
}

/// Receiving half, owned by the cancellable wait itself.
#[derive(Debug)]
pub struct CancelReceiver {
    rx: mpsc::Receiver<Signal>,
}

/// Construct a fresh cancel rendezvous with a single buffered slot.
pub fn channel() -> (Canceller, CancelReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Canceller { tx }, CancelReceiver { rx })
}

/// Outcome of a cancellable wait.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The duration elapsed without a cancel.
    Elapsed,
    /// A cancel signal arrived before the duration elapsed.
    Cancelled,
}

/// Block for `duration`, unless a cancel signal arrives first.
///
/// This is the sole primitive wait-states use to suspend; it never returns
/// early for any reason other than a delivered cancel.
pub fn wait(receiver: &CancelReceiver, duration: Duration) -> WaitOutcome {
    match receiver.rx.recv_timeout(duration) {
        Ok(Signal::Cancel) => WaitOutcome::Cancelled,
        Err(RecvTimeoutError::Timeout) => WaitOutcome::Elapsed,
        // The sender was dropped: treat permanent loss of the canceller the
        // same as an elapsed wait, since there is nobody left to cancel us.
        Err(RecvTimeoutError::Disconnected) => WaitOutcome::Elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_elapses_without_cancel() {
        let (_canceller, receiver) = channel();
        let start = Instant::now();
        let outcome = wait(&receiver, Duration::from_millis(20));
        assert!(matches!(outcome, WaitOutcome::Elapsed));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_wait_early() {
        let (canceller, receiver) = channel();
        let start = Instant::now();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            canceller.cancel();
        });
        let outcome = wait(&receiver, Duration::from_secs(5));
        assert!(matches!(outcome, WaitOutcome::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_sent_before_wait_is_buffered() {
        let (canceller, receiver) = channel();
        canceller.cancel();
        let outcome = wait(&receiver, Duration::from_secs(5));
        assert!(matches!(outcome, WaitOutcome::Cancelled));
    }

    #[test]
    fn redundant_cancel_is_dropped_not_leaked() {
        let (canceller, receiver) = channel();
        canceller.cancel();
        canceller.cancel();
        canceller.cancel();
        // Only one cancel should be observable; the rest were dropped.
        let outcome = wait(&receiver, Duration::from_millis(5));
        assert!(matches!(outcome, WaitOutcome::Cancelled));
        let outcome2 = wait(&receiver, Duration::from_millis(5));
        assert!(matches!(outcome2, WaitOutcome::Elapsed));
    }
}
