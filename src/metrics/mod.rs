//! Prometheus metrics and their Unix-domain-socket text-exposition endpoint.
//!
//! Counters are incremented from the state machine and the controller as
//! transitions and attempts occur. The exposition listener itself is a
//! plain blocking thread over `std::os::unix::net::UnixListener` — the
//! teacher's stale-socket-removal idiom, minus the actor runtime, since
//! nothing here needs more than one connection handled at a time.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};
use std::io::Write;
use std::os::unix::net::UnixListener;
use std::path::Path;

/// Unix socket path the metrics endpoint listens on.
static SOCKET_PATH: &str = "/run/mendercore/public/metrics.promsock";

static STATE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "mendercore_state_transitions_total",
        "Number of times each state machine state has been entered.",
    );
    let counter = IntCounterVec::new(opts, &["state"]).expect("metric registration");
    prometheus::register(Box::new(counter.clone())).expect("metric registration");
    counter
});

static BOOTSTRAP_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    register_counter(
        "mendercore_bootstrap_attempts_total",
        "Number of device bootstrap attempts.",
    )
});

static UPDATE_CHECKS: Lazy<IntCounter> = Lazy::new(|| {
    register_counter(
        "mendercore_update_checks_total",
        "Number of update-check polls performed.",
    )
});

static INSTALL_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    register_counter(
        "mendercore_install_attempts_total",
        "Number of update install attempts.",
    )
});

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric registration");
    prometheus::register(Box::new(counter.clone())).expect("metric registration");
    counter
}

/// Record entry into a state-machine state, keyed by its stable tag.
pub fn record_state_transition(state: &str) {
    STATE_TRANSITIONS.with_label_values(&[state]).inc();
}

/// Record a bootstrap attempt.
pub fn record_bootstrap_attempt() {
    BOOTSTRAP_ATTEMPTS.inc();
}

/// Record an update-check poll.
pub fn record_update_check() {
    UPDATE_CHECKS.inc();
}

/// Record an update install attempt.
pub fn record_install_attempt() {
    INSTALL_ATTEMPTS.inc();
}

/// Metrics exposition service.
#[derive(Debug)]
pub struct MetricsService {
    listener: UnixListener,
}

impl MetricsService {
    /// Create the metrics service and bind to the well-known Unix-domain
    /// socket.
    pub fn bind_socket() -> Result<Self> {
        Self::bind_socket_at(SOCKET_PATH)
            .with_context(|| format!("failed to setup metrics service on '{}'", SOCKET_PATH))
    }

    pub(crate) fn bind_socket_at(path: impl AsRef<Path>) -> Result<Self> {
        if let Err(e) = std::fs::remove_file(path.as_ref()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                bail!("failed to remove socket file: {}", e);
            }
        };
        let listener = UnixListener::bind(path.as_ref())
            .context("failed to bind metrics service to Unix socket")?;
        Ok(Self { listener })
    }

    /// Serve text-exposition responses forever on a dedicated thread; each
    /// accepted connection gets one response and is then closed.
    pub fn spawn(self) {
        std::thread::spawn(move || {
            log::debug!(
                "started metrics service on Unix-domain socket '{}'",
                SOCKET_PATH
            );
            for stream in self.listener.incoming() {
                match stream {
                    Ok(mut stream) => match prometheus_text_encode() {
                        Ok(buf) => {
                            if let Err(e) = stream.write_all(&buf) {
                                log::warn!("metrics write failed: {}", e);
                            }
                        }
                        Err(e) => log::warn!("metrics encoding failed: {}", e),
                    },
                    Err(e) => log::warn!("metrics connection failed: {}", e),
                }
            }
        });
    }
}

/// Gather metrics from the default registry and encode them in textual
/// format.
fn prometheus_text_encode() -> Result<Vec<u8>> {
    let metric_families = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_socket_at_rejects_non_socket_directory() {
        MetricsService::bind_socket_at("/proc").unwrap_err();
    }

    #[test]
    fn bind_socket_at_replaces_a_stale_socket() {
        let tmpdir = tempfile::tempdir().unwrap();
        let tmp_socket_path = tmpdir.path().join("test-socket");
        let service = MetricsService::bind_socket_at(&tmp_socket_path).unwrap();
        drop(service);
        let service = MetricsService::bind_socket_at(&tmp_socket_path).unwrap();
        drop(service);
    }

    #[test]
    fn counters_are_stable_across_calls() {
        let before = STATE_TRANSITIONS.with_label_values(&["init"]).get();
        record_state_transition("init");
        let after = STATE_TRANSITIONS.with_label_values(&["init"]).get();
        assert_eq!(after, before + 1);
    }
}
