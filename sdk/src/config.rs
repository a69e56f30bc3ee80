//! # SDK Defaults & Constants
//!
//! Every tunable default in the Meridian client lives here. The per-component
//! config structs ([`crate::submit::SubmitConfig`], [`crate::receipt::PollConfig`])
//! pull their `Default` values from these constants, so changing a number in
//! this file changes it everywhere at once.
//!
//! The retry numbers are deliberately conservative: a client that hammers a
//! struggling node helps nobody, least of all itself.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Submission / Retry
// ---------------------------------------------------------------------------

/// Maximum submission attempts for a single logical transaction before the
/// coordinator gives up with `Exhausted`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// First retry delay for transient failures. Doubles per attempt.
pub const MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Ceiling on the transient-retry delay. The doubling schedule saturates
/// here; jitter is applied on top (upward only, bounded).
pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Per-attempt network timeout. Exceeding it is a transient failure, not a
/// terminal one — the overall transaction deadline is separate and longer.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a node that just failed is deprioritized for selection. The node
/// is never permanently excluded; networks recover.
pub const NODE_COOLDOWN: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Transaction Validity
// ---------------------------------------------------------------------------

/// Default width of a transaction's validity window. The network rejects the
/// transaction once `valid_start + valid_duration` has passed, so this is
/// also the coordinator's overall retry deadline.
pub const DEFAULT_VALID_DURATION: Duration = Duration::from_secs(120);

/// The widest validity window the network accepts.
pub const MAX_VALID_DURATION: Duration = Duration::from_secs(180);

// ---------------------------------------------------------------------------
// Receipt Polling
// ---------------------------------------------------------------------------

/// Initial delay between receipt polls. Polling targets an already-accepted
/// transaction, so this is a gentle cadence, not the submit backoff.
pub const POLL_INTERVAL_FLOOR: Duration = Duration::from_millis(500);

/// Ceiling on the poll interval after light multiplicative growth.
pub const POLL_INTERVAL_CAP: Duration = Duration::from_secs(5);

/// Per-poll growth factor. Light on purpose — receipts usually land within
/// a few consensus rounds.
pub const POLL_GROWTH_FACTOR: f64 = 1.25;

/// How long the poller waits for a terminal receipt before reporting
/// exhaustion.
pub const RECEIPT_DEADLINE: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Topology Refresh
// ---------------------------------------------------------------------------

/// Default cadence for the optional periodic topology refresh task.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
