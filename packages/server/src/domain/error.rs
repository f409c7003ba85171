//! Domain errors.

use lanchat_shared::Username;
use thiserror::Error;

/// Roster errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Another session is already registered under this username
    #[error("username '{0}' is already logged in")]
    DuplicateUser(Username),
}
