//! Storage container access.
//!
//! Opening a container yields a [`ContainerHandle`] that must be passed back
//! to [`ContainerPort::close_container`] on every exit path.  Closing is
//! synchronous so it can run from a `Drop` guard.

use async_trait::async_trait;
use quarry_types::{BlockInfo, BlockPos, QuarryError};

/// Identifies one open container window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: u64,
    pub position: BlockPos,
}

#[async_trait]
pub trait ContainerPort: Send + Sync {
    /// Open the container at `block`.
    async fn open_container(&self, block: &BlockInfo) -> Result<ContainerHandle, QuarryError>;

    /// Move `count` items named `item_name` from the inventory into the
    /// open container.
    async fn deposit(
        &self,
        handle: &ContainerHandle,
        item_name: &str,
        count: u32,
    ) -> Result<(), QuarryError>;

    /// Close the container window.  Closing an already-closed handle is a
    /// no-op.
    fn close_container(&self, handle: &ContainerHandle);
}
