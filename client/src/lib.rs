// client/src/lib.rs
// Client side of the dispatch protocol: the store API, the polling session
// each role runs, the actions a role may take and the position source.

pub mod actions;
pub mod api;
pub mod location;
pub mod sync;

pub use actions::ActionOutcome;
pub use api::{DispatchApi, HttpDispatchClient, LocalDispatchApi};
pub use location::{LocationFix, LocationResolver, LocationSource};
pub use sync::{ClientView, SessionIdentity, SyncSession, SyncSettings};
