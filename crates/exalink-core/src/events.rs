//! Status event type for the fan-out bus.
//!
//! Events are published by the status producers (OSC ingress or poller)
//! through the bus in `exalink-session` and delivered to streaming
//! subscribers on a best-effort basis: a slow consumer misses events
//! rather than stalling the producers, so sequence numbers may show gaps.

use crate::types::Status;

/// A sequenced status update for one composition.
///
/// The `seq` field is assigned by the bus in publish order and is strictly
/// increasing across all compositions. Subscribers that observe a jump in
/// `seq` have missed events under load; the payload itself is always the
/// latest full snapshot for its composition, so a gap is recoverable.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    /// Bus-wide publish sequence number, starting at 1.
    pub seq: u64,
    /// The composition this status describes.
    pub composition: String,
    /// The canonical status snapshot.
    pub status: Status,
}
