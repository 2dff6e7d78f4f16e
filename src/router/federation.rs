//! Federation routing.
//!
//! The router always hands out a connection to the federation root. Shard
//! selection happens on the live connection: every time it opens, a
//! `USE FEDERATION` statement for the caller's key runs before the caller can
//! issue anything else.

use super::PartitionRouter;
use crate::connection::{
    Connection, ConnectionDescriptor, ConnectionError, ConnectionState, HookId, OpenHook,
    OpenHooks, ProviderRegistry,
};
use crate::key::PartitionKey;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Routes by binding federation-root connections to a member on open.
#[derive(Debug, Clone)]
pub struct FederationPartitionRouter {
    root: ConnectionDescriptor,
    federation_name: String,
    distribution_name: String,
}

impl FederationPartitionRouter {
    pub fn new(
        root: ConnectionDescriptor,
        federation_name: impl Into<String>,
        distribution_name: impl Into<String>,
    ) -> Result<Self> {
        let federation_name = federation_name.into();
        let distribution_name = distribution_name.into();

        if federation_name.trim().is_empty() {
            return Err(Error::validation("federation_name", "must not be empty"));
        }
        if distribution_name.trim().is_empty() {
            return Err(Error::validation("distribution_name", "must not be empty"));
        }

        Ok(Self {
            root,
            federation_name,
            distribution_name,
        })
    }

    pub fn root(&self) -> &ConnectionDescriptor {
        &self.root
    }

    pub fn federation_name(&self) -> &str {
        &self.federation_name
    }

    pub fn distribution_name(&self) -> &str {
        &self.distribution_name
    }

    /// The statement that binds a root connection to the member holding `key`.
    pub fn routing_statement(&self, key: &PartitionKey) -> String {
        format!(
            "USE FEDERATION {} ({} = {}) WITH RESET, FILTERING = OFF",
            quote_identifier(&self.federation_name),
            quote_identifier(&self.distribution_name),
            key.to_sql_literal()
        )
    }
}

fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

impl PartitionRouter for FederationPartitionRouter {
    fn resolve(&self, _key: &PartitionKey) -> Result<ConnectionDescriptor> {
        Ok(self.root.clone())
    }

    fn connect(
        &self,
        key: &PartitionKey,
        providers: &ProviderRegistry,
    ) -> Result<Box<dyn Connection>> {
        let inner = providers.create(&self.root)?;
        let statement = self.routing_statement(key);
        Ok(Box::new(FederatedConnection::new(inner, statement)))
    }
}

struct FederationRoutingHook {
    statement: String,
}

impl OpenHook for FederationRoutingHook {
    fn on_open(&self, connection: &mut dyn Connection) -> std::result::Result<(), ConnectionError> {
        debug!(statement = %self.statement, "routing federation connection");
        connection.execute(&self.statement)?;
        Ok(())
    }
}

/// Federation-root connection that runs its routing statement on every open.
///
/// Dropping the wrapper, or taking the raw connection back with
/// [`into_inner`](Self::into_inner), removes the routing subscription so a
/// reused connection does not keep routing for a stale key.
pub struct FederatedConnection {
    inner: Box<dyn Connection>,
    hook: HookId,
}

impl FederatedConnection {
    pub fn new(mut inner: Box<dyn Connection>, statement: String) -> Self {
        let hook = inner.subscribe_open(Arc::new(FederationRoutingHook { statement }));
        Self { inner, hook }
    }

    /// Unsubscribes the routing statement and returns the raw connection.
    pub fn into_inner(mut self) -> Box<dyn Connection> {
        self.inner.unsubscribe_open(self.hook);
        let detached = DetachedConnection {
            descriptor: self.inner.descriptor().clone(),
            hooks: OpenHooks::new(),
        };
        std::mem::replace(&mut self.inner, Box::new(detached))
    }
}

impl Connection for FederatedConnection {
    fn descriptor(&self) -> &ConnectionDescriptor {
        self.inner.descriptor()
    }

    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn open(&mut self) -> std::result::Result<(), ConnectionError> {
        self.inner.open()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn execute(&mut self, statement: &str) -> std::result::Result<u64, ConnectionError> {
        self.inner.execute(statement)
    }

    fn subscribe_open(&mut self, hook: Arc<dyn OpenHook>) -> HookId {
        self.inner.subscribe_open(hook)
    }

    fn unsubscribe_open(&mut self, id: HookId) -> bool {
        self.inner.unsubscribe_open(id)
    }
}

impl Drop for FederatedConnection {
    fn drop(&mut self) {
        self.inner.unsubscribe_open(self.hook);
    }
}

/// Stands in for the raw connection once [`FederatedConnection::into_inner`]
/// has handed it back. Never opens.
struct DetachedConnection {
    descriptor: ConnectionDescriptor,
    hooks: OpenHooks,
}

impl Connection for DetachedConnection {
    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Closed
    }

    fn open(&mut self) -> std::result::Result<(), ConnectionError> {
        Err(ConnectionError::Detached)
    }

    fn close(&mut self) {}

    fn execute(&mut self, _statement: &str) -> std::result::Result<u64, ConnectionError> {
        Err(ConnectionError::Detached)
    }

    fn subscribe_open(&mut self, hook: Arc<dyn OpenHook>) -> HookId {
        self.hooks.subscribe(hook)
    }

    fn unsubscribe_open(&mut self, id: HookId) -> bool {
        self.hooks.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{MemoryConnection, MemoryProvider};
    use uuid::Uuid;

    fn setup() -> (MemoryProvider, ProviderRegistry, FederationPartitionRouter) {
        let provider = MemoryProvider::new();
        let providers = ProviderRegistry::new();
        providers.register("memory", Arc::new(provider.clone()));
        let root = ConnectionDescriptor::new("memory", "db=federation_root").unwrap();
        let router = FederationPartitionRouter::new(root, "Orders_Federation", "cid").unwrap();
        (provider, providers, router)
    }

    #[test]
    fn test_resolve_returns_root() {
        let (_provider, _providers, router) = setup();
        assert_eq!(
            router.resolve(&PartitionKey::Int(1)).unwrap(),
            router.root().clone()
        );
    }

    #[test]
    fn test_routing_statement() {
        let (_provider, _providers, router) = setup();
        let id = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();

        assert_eq!(
            router.routing_statement(&PartitionKey::Uuid(id)),
            "USE FEDERATION [Orders_Federation] ([cid] = '6f9619ff-8b86-d011-b42d-00c04fc964ff') WITH RESET, FILTERING = OFF"
        );
        assert_eq!(
            router.routing_statement(&PartitionKey::Int(7)),
            "USE FEDERATION [Orders_Federation] ([cid] = 7) WITH RESET, FILTERING = OFF"
        );
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let root = ConnectionDescriptor::new("memory", "db=root").unwrap();
        let router = FederationPartitionRouter::new(root, "odd]name", "k").unwrap();
        assert!(router
            .routing_statement(&PartitionKey::Int(1))
            .starts_with("USE FEDERATION [odd]]name] ([k] = 1)"));
    }

    #[test]
    fn test_names_validated() {
        let root = ConnectionDescriptor::new("memory", "db=root").unwrap();
        let err = FederationPartitionRouter::new(root.clone(), "", "cid").unwrap_err();
        assert_eq!(err.parameter(), Some("federation_name"));
        let err = FederationPartitionRouter::new(root, "fed", " ").unwrap_err();
        assert_eq!(err.parameter(), Some("distribution_name"));
    }

    #[test]
    fn test_routing_runs_on_open_before_caller_statements() {
        let (provider, providers, router) = setup();
        let mut connection = router.connect(&PartitionKey::Int(42), &providers).unwrap();

        assert!(provider.statements().is_empty());
        connection.open().unwrap();
        connection.execute("SELECT * FROM orders").unwrap();

        let statements: Vec<String> = provider
            .statements()
            .into_iter()
            .map(|executed| executed.statement)
            .collect();
        assert_eq!(
            statements,
            vec![
                router.routing_statement(&PartitionKey::Int(42)),
                "SELECT * FROM orders".to_string(),
            ]
        );
    }

    #[test]
    fn test_routing_reruns_on_reopen() {
        let (provider, providers, router) = setup();
        let mut connection = router.connect(&PartitionKey::Int(1), &providers).unwrap();

        connection.open().unwrap();
        connection.close();
        connection.open().unwrap();
        assert_eq!(provider.statements().len(), 2);
    }

    #[test]
    fn test_into_inner_unsubscribes_routing() {
        let provider = MemoryProvider::new();
        let root = ConnectionDescriptor::new("memory", "db=root").unwrap();
        let raw: MemoryConnection = provider.connection(root.clone());
        assert_eq!(raw.open_hook_count(), 0);

        let federated = FederatedConnection::new(Box::new(raw), "SELECT 'routed'".to_string());
        let mut inner = federated.into_inner();

        assert_eq!(inner.descriptor(), &root);
        inner.open().unwrap();
        assert!(provider.statements().is_empty());
    }

    #[test]
    fn test_subscriptions_pass_through_to_inner_connection() {
        let (provider, providers, router) = setup();
        let mut connection = router.connect(&PartitionKey::Int(3), &providers).unwrap();

        let extra = connection.subscribe_open(Arc::new(FederationRoutingHook {
            statement: "SET CONTEXT_INFO 0x01".to_string(),
        }));
        connection.open().unwrap();
        assert_eq!(provider.statements().len(), 2);

        connection.close();
        assert!(connection.unsubscribe_open(extra));
        assert!(!connection.unsubscribe_open(extra));
        connection.open().unwrap();
        assert_eq!(provider.statements().len(), 3);
    }

    #[test]
    fn test_into_inner_keeps_other_subscriptions() {
        let provider = MemoryProvider::new();
        let root = ConnectionDescriptor::new("memory", "db=root").unwrap();
        let mut raw = provider.connection(root);
        raw.subscribe_open(Arc::new(FederationRoutingHook {
            statement: "SET CONTEXT_INFO 0x01".to_string(),
        }));

        let federated = FederatedConnection::new(Box::new(raw), "SELECT 'routed'".to_string());
        let mut inner = federated.into_inner();
        inner.open().unwrap();

        let statements: Vec<String> = provider
            .statements()
            .into_iter()
            .map(|executed| executed.statement)
            .collect();
        assert_eq!(statements, vec!["SET CONTEXT_INFO 0x01".to_string()]);
    }
}
