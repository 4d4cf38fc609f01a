//! Scheduler layer for the worker
//!
//! Asks the coordinator for work and hands each job to the job handler,
//! strictly one at a time.

pub mod poller;

pub use poller::JobPoller;
