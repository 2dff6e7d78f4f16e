//! Router with exactly one target.

use super::PartitionRouter;
use crate::connection::ConnectionDescriptor;
use crate::key::PartitionKey;
use crate::Result;

/// Resolves every key to the same descriptor.
#[derive(Debug, Clone)]
pub struct SinglePartitionRouter {
    descriptor: ConnectionDescriptor,
}

impl SinglePartitionRouter {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }
}

impl PartitionRouter for SinglePartitionRouter {
    fn resolve(&self, _key: &PartitionKey) -> Result<ConnectionDescriptor> {
        Ok(self.descriptor.clone())
    }
}
