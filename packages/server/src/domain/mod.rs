//! Domain layer of the server: the roster and the seam it writes through.

pub mod error;
pub mod roster;
pub mod sink;

pub use error::RosterError;
pub use roster::{BroadcastReport, Roster};
pub use sink::EnvelopeSink;
