//! Connection descriptors and the physical connection boundary.
//!
//! Routers resolve a partition key to a [`ConnectionDescriptor`]. Opening a
//! physical connection is delegated to a [`ConnectionFactory`] looked up by the
//! descriptor's provider name in a [`ProviderRegistry`].

pub mod memory;
pub mod provider;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use memory::{MemoryConnection, MemoryProvider};
pub use provider::{ConnectionFactory, ProviderRegistry};

/// Immutable (provider, connection string) pair naming one storage target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    provider: String,
    connection_string: String,
}

impl ConnectionDescriptor {
    /// Creates a descriptor, rejecting empty provider names and connection strings.
    pub fn new(
        provider: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> crate::Result<Self> {
        let provider = provider.into();
        let connection_string = connection_string.into();

        if provider.trim().is_empty() {
            return Err(crate::Error::validation("provider", "must not be empty"));
        }
        if connection_string.trim().is_empty() {
            return Err(crate::Error::validation(
                "connection_string",
                "must not be empty",
            ));
        }

        Ok(Self {
            provider,
            connection_string,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.connection_string)
    }
}

/// Errors raised by physical connections.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is not open")]
    NotOpen,

    #[error("connection is already open")]
    AlreadyOpen,

    #[error("connection was detached from its wrapper")]
    Detached,

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Handle to an open-state subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Callback run every time a connection transitions to [`ConnectionState::Open`],
/// before the connection is handed back to the caller.
pub trait OpenHook: Send + Sync {
    fn on_open(&self, connection: &mut dyn Connection) -> Result<(), ConnectionError>;
}

/// A physical connection handle consumed by repository adapters.
pub trait Connection: Send {
    fn descriptor(&self) -> &ConnectionDescriptor;

    fn state(&self) -> ConnectionState;

    /// Opens the connection and runs every subscribed [`OpenHook`]. A failing
    /// hook closes the connection again and surfaces the hook's error.
    fn open(&mut self) -> Result<(), ConnectionError>;

    fn close(&mut self);

    /// Executes a statement, returning the number of affected rows.
    fn execute(&mut self, statement: &str) -> Result<u64, ConnectionError>;

    fn subscribe_open(&mut self, hook: Arc<dyn OpenHook>) -> HookId;

    /// Removes a subscription. Returns false if `id` was not subscribed.
    fn unsubscribe_open(&mut self, id: HookId) -> bool;
}

/// Subscription list for [`Connection`] implementors.
#[derive(Default)]
pub struct OpenHooks {
    next_id: u64,
    hooks: Vec<(HookId, Arc<dyn OpenHook>)>,
}

impl OpenHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, hook: Arc<dyn OpenHook>) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push((id, hook));
        id
    }

    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(hook_id, _)| *hook_id != id);
        self.hooks.len() != before
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Clones the current hooks so they can run against the owning connection.
    pub fn snapshot(&self) -> Vec<Arc<dyn OpenHook>> {
        self.hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect()
    }
}

impl fmt::Debug for OpenHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}
