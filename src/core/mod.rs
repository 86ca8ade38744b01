pub mod clock;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SyncError};

/// Identifier of an authenticated user (and of their profile).
pub type UserId = String;

/// Identifier of a connection record.
pub type ConnectionId = String;
