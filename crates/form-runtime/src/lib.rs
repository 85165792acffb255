#![allow(missing_docs)]

pub mod backend;
pub mod config;
pub mod file;
pub mod memory;
pub mod retry;
pub mod runner;

pub use backend::{
    ApplicationHandle, BackendError, FormBackend, LinkedFile, Platform, StoredApplication,
};
pub use config::{ComputedRule, ConfigError, PLATFORM_ENV, RuntimeConfig};
pub use file::FileBackend;
pub use memory::{BackendCall, InMemoryBackend};
pub use retry::RetryPolicy;
pub use runner::{FormRunner, RuntimeError};
