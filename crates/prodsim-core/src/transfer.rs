//! In-flight transfers between stations.

use crate::content::Content;
use crate::id::{EdgeId, StationId, TransferId};
use std::time::Duration;

/// A timed move of one content unit from a source station's output storage
/// to a destination station's input storage.
///
/// The content is withdrawn from the source at initiation, so while the
/// transfer is in flight this record is the only account of the material.
/// Losing it loses the material; the production line keeps every transfer
/// until its deposit succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub id: TransferId,
    pub from: StationId,
    pub to: StationId,
    /// The graph edge this transfer travels, keying the allowed-SKU table.
    pub edge: EdgeId,
    pub content: Content,
    pub started: Duration,
    pub deadline: Duration,
}

impl Transfer {
    pub fn new(
        from: StationId,
        to: StationId,
        edge: EdgeId,
        content: Content,
        started: Duration,
        travel_time: Duration,
    ) -> Self {
        Self {
            id: TransferId::next(),
            from,
            to,
            edge,
            content,
            started,
            deadline: started + travel_time,
        }
    }

    /// Whether the transfer has arrived as of `now`.
    pub fn arrived(&self, now: Duration) -> bool {
        now >= self.deadline
    }

    /// Compact one-line description for logs.
    pub fn short_label(&self) -> String {
        format!(
            "{}->{}: {:?} x{}",
            self.from,
            self.to,
            self.content.resource_uom(),
            self.content.qty()
        )
    }
}
