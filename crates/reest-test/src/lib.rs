//! Reestablishment Test Harness - Simulated testbed and schedule checks
//!
//! This crate provides:
//! - Fault profiles and scripted one-shot faults
//! - A simulated RAN implementing every collaborator contract
//! - An event recorder that checks the schedule invariants
//! - Suite entry points over the simulated RAN

#![allow(async_fn_in_trait)]

pub mod fault;
pub mod recorder;
pub mod sim;
pub mod reestablishment;

pub use fault::*;
pub use recorder::*;
pub use sim::*;
pub use reestablishment::*;
