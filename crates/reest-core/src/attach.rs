//! Attach records
//!
//! The attach mapping is produced once, at attach time, and is read-only
//! afterwards. Every phase of a scenario borrows it.

use std::net::Ipv4Addr;

use indexmap::IndexMap;

use crate::{ClientHandle, ScenarioError, ScenarioResult};

/// Per-client record produced when the client attaches
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachInfo {
    /// Address assigned by the core network
    pub ipv4: Ipv4Addr,
}

impl AttachInfo {
    pub fn new(ipv4: Ipv4Addr) -> Self {
        AttachInfo { ipv4 }
    }
}

/// Insertion-ordered, immutable `ClientHandle -> AttachInfo` mapping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachMap {
    entries: IndexMap<ClientHandle, AttachInfo>,
}

impl AttachMap {
    /// Build a mapping; a client may appear only once
    pub fn from_entries<I>(entries: I) -> ScenarioResult<Self>
    where
        I: IntoIterator<Item = (ClientHandle, AttachInfo)>,
    {
        let mut map = IndexMap::new();
        for (client, info) in entries {
            if map.insert(client, info).is_some() {
                return Err(ScenarioError::InvalidScenario(format!(
                    "duplicate attach record for {}",
                    client
                )));
            }
        }
        Ok(AttachMap { entries: map })
    }

    pub fn get(&self, client: ClientHandle) -> Option<&AttachInfo> {
        self.entries.get(&client)
    }

    pub fn contains(&self, client: ClientHandle) -> bool {
        self.entries.contains_key(&client)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in attach order
    pub fn iter(&self) -> impl Iterator<Item = (ClientHandle, &AttachInfo)> {
        self.entries.iter().map(|(c, info)| (*c, info))
    }

    pub fn clients(&self) -> impl Iterator<Item = ClientHandle> + '_ {
        self.entries.keys().copied()
    }

    /// First client of `clients` that has no attach record
    pub fn first_missing(&self, clients: &[ClientHandle]) -> Option<ClientHandle> {
        clients.iter().copied().find(|c| !self.contains(*c))
    }

    /// New mapping restricted to `clients`, in the order given.
    /// Clients without a record are skipped.
    pub fn subset(&self, clients: &[ClientHandle]) -> AttachMap {
        let entries = clients
            .iter()
            .filter_map(|&client| self.get(client).map(|info| (client, info.clone())))
            .collect();
        AttachMap { entries }
    }
}
