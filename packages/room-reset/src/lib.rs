//! Authorization policy and per-room session reset.
//!
//! The session store belongs to the agent runtime. A reset reads the whole
//! store, rewrites one entry and replaces the file in a single rename. There
//! is no lock shared with the runtime, so the runtime must not be writing the
//! same store while a reset runs.

pub mod access;
pub mod reset;
pub mod store;

pub use access::{AccessPolicy, Caller, CallerTier, Operation};
pub use reset::{handle_reset_request, render_room_list, reset_room, ResetOutcome};
pub use store::{session_store_path, SessionEntry, SessionStore};
