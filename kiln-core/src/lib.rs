//! Kiln Core
//!
//! Core types and abstractions for the Kiln build worker.
//!
//! This crate contains:
//! - Domain types: Assemblies, images, build jobs and deploy keys
//! - DTOs: Data transfer objects exchanged with the coordinator and the
//!   commit-status endpoint

pub mod domain;
pub mod dto;
