//! [`AgentPorts`] – the set of capability handles wired into the runtime.
//!
//! Each runtime component clones only the ports it needs out of the bundle,
//! so a component that merely reads blocks never sees the navigator.  A
//! single object implementing every trait (a game client adapter, or
//! [`SimWorld`][crate::sim::SimWorld]) can be shared across all ports with
//! [`AgentPorts::from_shared`].

use std::sync::Arc;

use crate::container::ContainerPort;
use crate::inventory::{Interaction, InventoryPort};
use crate::navigator::Navigator;
use crate::probe::{Presence, WorldProbe};

/// Shared capability handles.  Cloning is cheap.
#[derive(Clone)]
pub struct AgentPorts {
    pub world: Arc<dyn WorldProbe>,
    pub presence: Arc<dyn Presence>,
    pub navigator: Arc<dyn Navigator>,
    pub inventory: Arc<dyn InventoryPort>,
    pub interaction: Arc<dyn Interaction>,
    pub containers: Arc<dyn ContainerPort>,
}

impl AgentPorts {
    /// Build every port from one object that implements all capabilities.
    pub fn from_shared<T>(agent: Arc<T>) -> Self
    where
        T: WorldProbe + Presence + Navigator + InventoryPort + Interaction + ContainerPort + 'static,
    {
        Self {
            world: agent.clone(),
            presence: agent.clone(),
            navigator: agent.clone(),
            inventory: agent.clone(),
            interaction: agent.clone(),
            containers: agent,
        }
    }
}
