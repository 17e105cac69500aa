pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod store;

pub use crate::config::PromptVaultConfig;
pub use error::{ErrorKind, Result, VaultError};
pub use migrate::{MigrationReport, MigrationRunner};
pub use store::Store;
