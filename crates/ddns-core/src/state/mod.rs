// # Persisted State
//
// The document read at the start of every cycle and replaced at its end,
// plus the StateStore implementations that hold it.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::config::DdnsConfig;
use crate::traits::AddressFamily;

/// Last-known address per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastKnownAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v6: Option<IpAddr>,
}

impl LastKnownAddresses {
    /// The last-known address of `family`
    pub fn get(&self, family: AddressFamily) -> Option<IpAddr> {
        match family {
            AddressFamily::V4 => self.v4,
            AddressFamily::V6 => self.v6,
        }
    }

    /// Overwrite the last-known address of `family`
    pub fn set(&mut self, family: AddressFamily, address: IpAddr) {
        match family {
            AddressFamily::V4 => self.v4 = Some(address),
            AddressFamily::V6 => self.v6 = Some(address),
        }
    }
}

/// Engine-written half of the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationState {
    /// Address persisted by the last cycle that resolved each family
    #[serde(default)]
    pub last_known_ip: LastKnownAddresses,

    /// End of the last successful cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,

    /// Status of the most recent cycle, successful or not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

/// Everything that survives a restart: settings and reconciliation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdnsDocument {
    #[serde(flatten)]
    pub config: DdnsConfig,

    #[serde(flatten)]
    pub state: ReconciliationState,
}

impl DdnsDocument {
    /// A document with settings and no history
    pub fn new(config: DdnsConfig) -> Self {
        Self {
            config,
            state: ReconciliationState::default(),
        }
    }

    /// Builder-style replacement of the state half
    pub fn with_state(mut self, state: ReconciliationState) -> Self {
        self.state = state;
        self
    }
}
