//! Reestablishment Core - Fundamental types for the reestablishment driver
//!
//! This crate defines the types shared by every part of the driver:
//! - Client identities (ClientHandle)
//! - Attach records and the immutable attach mapping
//! - Radio configuration and the fault-injection schedule
//! - Scenario expansion over radio axes
//! - Error taxonomy

pub mod id;
pub mod attach;
pub mod radio;
pub mod scenario;
pub mod matrix;
pub mod error;

pub use id::*;
pub use attach::*;
pub use radio::*;
pub use scenario::*;
pub use matrix::*;
pub use error::*;
