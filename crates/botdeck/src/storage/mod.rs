//! Persistence: the SQLite store and the on-disk upload store

pub mod database;
pub mod uploads;

pub use database::{Database, PlatformStats, ProjectChanges};
pub use uploads::UploadStore;
