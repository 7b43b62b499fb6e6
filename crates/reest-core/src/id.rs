//! Client identity
//!
//! A handle names one simulated mobile client for the lifetime of a
//! testbed. The driver never owns the client behind it.

use std::fmt;

/// Opaque identifier of a simulated client (UE)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientHandle(pub u64);

impl ClientHandle {
    #[inline]
    pub fn new(id: u64) -> Self {
        ClientHandle(id)
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ue{}", self.0)
    }
}
