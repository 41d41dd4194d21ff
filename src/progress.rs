//! Progress events surfaced to an external reporting layer.
//!
//! Events are delivered over an unbounded `tokio::sync::mpsc` channel so a
//! renderer can consume them without coupling to the probe or dispatch
//! loops. A closed receiver is tolerated everywhere; reporting is strictly
//! best-effort.

use serde::Serialize;

/// Events emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Progress {
    /// Validation advanced to `processed` of `total` candidates.
    Validating { processed: usize, total: usize },
    /// Dispatch snapshot, emitted every `progress_every` attempts.
    Dispatching { attempts: u64, hits: u64, delta: u64 },
    /// A fresh counter sample was taken this round.
    Sampled { value: u64, delta: u64 },
    /// Relays keep connecting but the counter stayed flat over a round.
    LowYield { round_successes: u64, delta: u64 },
    /// The pool thinned out and a replenishment cycle started.
    Replenishing { pool_size: usize },
    /// A replenishment cycle finished.
    Replenished { added: usize, pool_size: usize },
}
