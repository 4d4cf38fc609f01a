//! Data Transfer Objects (DTOs)
//!
//! Payloads exchanged between the worker and the services around it.

pub mod build;
pub mod commit_status;
