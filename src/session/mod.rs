//! Worker-side session liveness tracking.
//!
//! A session represents an in-flight data operation against a worker's local
//! cache. Sessions come into existence on their first heartbeat, are kept
//! alive by further heartbeats, and are reclaimed by the [`SessionCleaner`]
//! once they stop.

mod cleaner;
mod info;
mod registry;

pub use cleaner::SessionCleaner;
pub use info::{ReservedSession, SessionId, SessionInfo};
pub use registry::SessionRegistry;
