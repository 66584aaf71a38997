//! Batch reel export.
//!
//! This crate provides:
//! - The job orchestrator running one encode per background clip
//! - Music resolution (catalog fetch or uploaded file)
//! - Run-wide progress aggregation and status events
//! - Delivery of finished videos
//! - Structured run logging and configuration

pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod resolver;

pub use config::ExportConfig;
pub use delivery::{Deliverable, DeliverySink, DirectoryDelivery};
pub use error::{ExportError, ExportResult};
pub use logging::RunLogger;
pub use orchestrator::{ExportReport, ExportRun, Exporter};
pub use progress::ProgressTracker;
pub use resolver::{MediaResolver, ResolvedAudio};
