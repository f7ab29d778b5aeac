//! EPOCHBOT — Epoch-Boundary Staking Scheduler
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod epoch;
pub mod executor;
pub mod scheduler;
pub mod types;
