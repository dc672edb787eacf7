//! Budget Tracker database bootstrap
//!
//! Creates the application user, the `notifications` and `backups` collections
//! with their indexes, and the welcome notification in one target database.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;

pub use bootstrap::{BootstrapPlan, BootstrapReport, Bootstrapper, Step, VerifyReport};
pub use config::Config;
pub use db::{AdminBackend, MemoryBackend, MongoBackend};
pub use error::{BootstrapError, Result, StepFailure};
