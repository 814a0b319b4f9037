//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;

use crate::hub::HubHandle;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Handle onto the connection hub.
    pub(crate) hub: HubHandle,
    /// Document root served at `/`.
    pub(crate) root: PathBuf,
}
