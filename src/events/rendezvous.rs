// Suspend-Flush rendezvous
//
// One-shot, two-party: the presentation waits, the Game Actor arrives after
// its flush. A single-slot channel carries the outcome. The waiter gives up
// after a timeout; a dropped arrival disconnects the channel. Either way the
// waiter is released and the outcome is unknown.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use ulid::Ulid;

/// What the Game Actor reports after executing a Flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Committed,
    Failed,
}

/// What the waiting party learns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousOutcome {
    Committed,
    Failed,
    /// Timed out or the other party went away
    Unknown,
}

/// Create the two halves of one rendezvous
pub fn flush_rendezvous(flush_id: Ulid) -> (FlushArrival, FlushWaiter) {
    let (tx, rx) = bounded(1);
    (
        FlushArrival { flush_id, tx },
        FlushWaiter { flush_id, rx },
    )
}

/// Game Actor half. Consumed on arrival.
#[derive(Debug)]
pub struct FlushArrival {
    flush_id: Ulid,
    tx: Sender<FlushOutcome>,
}

impl FlushArrival {
    pub fn flush_id(&self) -> Ulid {
        self.flush_id
    }

    /// Never blocks: the slot is free until this single send.
    pub fn arrive(self, outcome: FlushOutcome) {
        if self.tx.try_send(outcome).is_err() {
            tracing::warn!(flush_id = %self.flush_id, ?outcome, "flush waiter already gone");
        } else {
            tracing::debug!(flush_id = %self.flush_id, ?outcome, "flush arrival signalled");
        }
    }
}

/// Presentation half
#[derive(Debug)]
pub struct FlushWaiter {
    flush_id: Ulid,
    rx: Receiver<FlushOutcome>,
}

impl FlushWaiter {
    pub fn flush_id(&self) -> Ulid {
        self.flush_id
    }

    /// Block until the Game Actor arrives or `timeout` passes
    pub fn wait(self, timeout: Duration) -> RendezvousOutcome {
        let started = Instant::now();
        match self.rx.recv_timeout(timeout) {
            Ok(FlushOutcome::Committed) => {
                tracing::debug!(
                    flush_id = %self.flush_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "flush committed"
                );
                RendezvousOutcome::Committed
            }
            Ok(FlushOutcome::Failed) => {
                tracing::warn!(flush_id = %self.flush_id, "flush failed, suspending anyway");
                RendezvousOutcome::Failed
            }
            Err(e) => {
                let reason = match e {
                    RecvTimeoutError::Timeout => "timeout",
                    RecvTimeoutError::Disconnected => "disconnected",
                };
                tracing::warn!(flush_id = %self.flush_id, reason, "flush state unknown");
                RendezvousOutcome::Unknown
            }
        }
    }
}
