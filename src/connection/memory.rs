//! In-process connection provider.
//!
//! Connections do no I/O; they track their open state and record every
//! executed statement in a log shared by all connections of the provider.
//! Useful for wiring tests and demos without a database server.

use super::{
    Connection, ConnectionDescriptor, ConnectionError, ConnectionFactory, ConnectionState,
    HookId, OpenHook, OpenHooks,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// A statement executed through a [`MemoryConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub descriptor: ConnectionDescriptor,
    pub statement: String,
}

/// Connection factory producing [`MemoryConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    log: Arc<Mutex<Vec<ExecutedStatement>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement executed so far, in execution order.
    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.log.lock().clone()
    }

    pub fn connection(&self, descriptor: ConnectionDescriptor) -> MemoryConnection {
        MemoryConnection {
            descriptor,
            state: ConnectionState::Closed,
            hooks: OpenHooks::new(),
            log: Arc::clone(&self.log),
        }
    }
}

impl ConnectionFactory for MemoryProvider {
    fn create(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        Ok(Box::new(self.connection(descriptor.clone())))
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    descriptor: ConnectionDescriptor,
    state: ConnectionState,
    hooks: OpenHooks,
    log: Arc<Mutex<Vec<ExecutedStatement>>>,
}

impl MemoryConnection {
    pub fn open_hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl Connection for MemoryConnection {
    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Open {
            return Err(ConnectionError::AlreadyOpen);
        }
        self.state = ConnectionState::Open;

        for hook in self.hooks.snapshot() {
            if let Err(err) = hook.on_open(self) {
                self.close();
                return Err(err);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    fn execute(&mut self, statement: &str) -> Result<u64, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::NotOpen);
        }
        self.log.lock().push(ExecutedStatement {
            descriptor: self.descriptor.clone(),
            statement: statement.to_string(),
        });
        Ok(0)
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

    struct Greeter;

    impl OpenHook for Greeter {
        fn on_open(&self, connection: &mut dyn Connection) -> Result<(), ConnectionError> {
            connection.execute("SELECT 'hello'").map(|_| ())
        }
    }

    struct Refuse;

    impl OpenHook for Refuse {
        fn on_open(&self, _connection: &mut dyn Connection) -> Result<(), ConnectionError> {
            Err(ConnectionError::Statement("refused".to_string()))
        }
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::new("memory", "db=test").unwrap()
    }

    #[test]
    fn test_execute_requires_open() {
        let provider = MemoryProvider::new();
        let mut connection = provider.connection(descriptor());

        assert!(matches!(
            connection.execute("SELECT 1"),
            Err(ConnectionError::NotOpen)
        ));

        connection.open().unwrap();
        connection.execute("SELECT 1").unwrap();
        assert!(matches!(connection.open(), Err(ConnectionError::AlreadyOpen)));

        let statements = provider.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].statement, "SELECT 1");
        assert_eq!(statements[0].descriptor, descriptor());
    }

    #[test]
    fn test_hooks_run_on_every_open() {
        let provider = MemoryProvider::new();
        let mut connection = provider.connection(descriptor());
        let id = connection.subscribe_open(Arc::new(Greeter));

        connection.open().unwrap();
        connection.close();
        connection.open().unwrap();
        assert_eq!(provider.statements().len(), 2);

        connection.close();
        assert!(connection.unsubscribe_open(id));
        connection.open().unwrap();
        assert_eq!(provider.statements().len(), 2);
    }

    #[test]
    fn test_failing_hook_leaves_connection_closed() {
        let provider = MemoryProvider::new();
        let mut connection = provider.connection(descriptor());
        connection.subscribe_open(Arc::new(Refuse));

        assert!(matches!(
            connection.open(),
            Err(ConnectionError::Statement(_))
        ));
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
