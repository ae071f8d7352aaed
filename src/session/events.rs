//! Session status events

use crate::error::{DriverError, DriverOp};
use crate::page::PageIndex;

/// Broadcast channel depth; slow subscribers see `Lagged` rather than
/// holding the worker up
pub const EVENT_CAPACITY: usize = 64;

/// Something observable happened on the session worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The device reported a page as the new foreground page
    PageActivated { page: PageIndex },

    /// A driver call failed; the in-memory state was kept as is
    DriverCallFailed {
        op: DriverOp,
        page: Option<PageIndex>,
        error: DriverError,
    },

    /// Pages were released and the driver deinitialized
    Closed,
}
