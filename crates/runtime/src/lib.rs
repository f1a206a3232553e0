//! Transport runtime for walink sessions.
//!
//! Owns the capability boundary to the messaging web client: the [`Transport`]
//! trait the session manager drives, a [`DriverTransport`] that talks to an
//! external driver process over line-delimited JSON, an in-memory
//! [`fake`] transport for tests, and process liveness helpers.

pub mod driver;
pub mod error;
pub mod fake;
pub mod process;
pub mod transport;

pub use driver::{DriverConfig, DriverTransport, DriverTransportFactory};
pub use error::{Error, Result};
pub use transport::{Transport, TransportFactory, TransportParts};
