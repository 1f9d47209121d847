//! Threat Ingest - windowed IMU/PPG upload service for wearable devices.
//!
//! This library receives periodic sample batches from wearable devices
//! and persists each batch as one time-windowed record. An upload covers
//! one fixed observation window (nominally 6 seconds at 25 Hz = 150
//! samples) tagged with a device id and an optional SOS session id.
//!
//! # Guarantees
//!
//! - **All-or-nothing validation**: one bad sample rejects the batch
//! - **Atomic persistence**: a window is never visible without all of
//!   its samples
//! - **Server-side ordering**: sequence numbers come from receive order;
//!   client ordering hints are not accepted
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Threat Ingest                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Server    │──▶│  Validator  │──▶│    Store    │        │
//! │  │   (axum)    │   │ (per field) │   │  (SQLite)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                                   │               │
//! │   400 field errors                   windows + samples      │
//! │                                       (one transaction)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use threat_ingest::server::{run, ServerConfig};
//!
//! # async fn start() -> anyhow::Result<()> {
//! let config = ServerConfig::new(8080, "threat.db".into());
//! let (addr, shutdown_tx) = run(config).await?;
//! println!("listening on {addr}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ingest;
pub mod server;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use ingest::{validate, IngestRequest, SampleReading, ValidationErrors};
pub use server::{IngestResponse, ServerConfig, ServerState};
pub use store::{SampleRecord, Store, WindowRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
