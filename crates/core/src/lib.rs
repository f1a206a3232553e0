//! Multi-tenant messaging session lifecycle manager.
//!
//! One logical messaging connection per tenant, paired with a QR code,
//! persisted to a crash-recovery snapshot, restored on startup from stored
//! credentials, with an inbound router that confirms pending orders when a
//! customer replies with a confirmation keyword.
//!
//! # Example
//!
//! ```ignore
//! use walink::{ManagerConfig, SessionManager, CreateOutcome};
//!
//! let manager = SessionManager::builder(ManagerConfig::new("/var/lib/walink")).open()?;
//! let restore = manager.restore_active_sessions();
//!
//! match manager.create_session(&"shop-1".into(), "9647700000000", "Shop One").await? {
//!     CreateOutcome::PairingCode(image) => println!("scan: {image}"),
//!     CreateOutcome::AlreadyConnected => {}
//! }
//!
//! let report = restore.wait().await;
//! ```

mod chats;
pub mod config;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod pairing;
pub mod registry;
pub mod restore;
pub mod router;
pub mod snapshot;
pub mod store;

pub use config::ManagerConfig;
pub use credentials::CredentialStore;
pub use error::{Result, SessionError};
pub use lifecycle::{CreateOutcome, SessionManager, SessionManagerBuilder};
pub use restore::{RestoreHandle, RestoreReport};
pub use router::{MessageRouter, RouteOutcome, RouterConfig};
pub use snapshot::SnapshotStore;
pub use store::{MemoryStore, OrderStore, PlatformDirectory, StoreError, StoreResult};
pub use walink_protocol as protocol;
pub use walink_runtime as runtime;
