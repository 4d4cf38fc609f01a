//! Core domain types
//!
//! This module contains the core domain structures used across Kiln services.
//! Assemblies and images are shared records owned by the control plane; the
//! worker only reads them and writes the fields it owns.

pub mod assembly;
pub mod credential;
pub mod image;
pub mod job;
