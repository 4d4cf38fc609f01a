//! Kiln Worker
//!
//! Build and unit-test execution engine. A worker takes one job at a time
//! from the coordinator, runs the external toolchain scripts for it, and
//! keeps the shared assembly and image records in step with what happened.
//!
//! Architecture:
//! - Configuration: settings from the environment or defaults
//! - Repositories: narrow interfaces to the remote services (records,
//!   coordinator, identity catalog, secret vault, object storage)
//! - Preparation: environment builder, credential resolver, command resolver
//! - Execution: process executor
//! - Services: status coordinator, log uploader, commit-status reporter
//! - Handler and scheduler: job routing and the polling loop

pub mod command;
pub mod config;
pub mod context;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod handler;
pub mod process;
pub mod repository;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Result, WorkerError};
pub use handler::JobHandler;
