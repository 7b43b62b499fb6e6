//! Reestablishment Runtime - Scenario orchestration
//!
//! One scenario run goes through these stages:
//! 1. Bind the radio configuration to the testbed
//! 2. Bring up base station, core network and clients
//! 3. Attach every client and freeze the attach mapping
//! 4. Per client: keep traffic running for all clients, inject the
//!    scheduled reestablishments, then wait for that client's traffic
//! 5. Drain remaining traffic and run one final traffic round
//! 6. Ask the validator about unwanted reattaches
//! 7. Tear down, collecting artifacts when required

#![allow(async_fn_in_trait)]

pub mod collab;
pub mod timer;
pub mod orchestrator;
pub mod suite;
pub mod config;
pub mod logging;

pub use collab::*;
pub use timer::*;
pub use orchestrator::*;
pub use suite::*;
pub use config::*;
pub use logging::*;
