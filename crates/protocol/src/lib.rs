//! Wire and data types for walink session management.
//!
//! This crate contains the serde-serializable shapes shared by the session
//! manager, the transport runtime, and the HTTP host: per-tenant session state,
//! persisted snapshot entries, transport events, driver JSON-lines frames, and
//! the order/platform records the inbound router works with.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * camelCase on the wire, matching the hosting application's JSON
//! * Stable: Changes only when a persisted or wire format changes
//!
//! State transitions and orchestration live in `walink`.

pub mod commerce;
pub mod driver;
pub mod event;
pub mod session;

pub use commerce::*;
pub use driver::*;
pub use event::*;
pub use session::*;
