//! The name → operation map consumed by the dispatcher.
//!
//! A registry is built once, at server construction, and shared immutably
//! with every connection thread. The "reflection" of the original design is
//! gone: the host hands the registry each operation's argument descriptors,
//! return descriptor and callable up front, typically from a generated stub.

use std::collections::HashMap;

use wirecall_common::protocol::{Value, ValueDescriptor};

/// What a handler may fail with; rendered into
/// [`WirecallError::InvocationFailure`](wirecall_common::WirecallError::InvocationFailure)
/// by the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync>;

/// One named operation: its signature and its callable.
pub struct Operation {
    args: Vec<ValueDescriptor>,
    returns: Option<ValueDescriptor>,
    handler: Handler,
}

impl Operation {
    /// Declares an operation.
    ///
    /// `returns = None` marks a void operation: the server sends no reply
    /// for it and the handler's returned value is discarded.
    pub fn new(
        args: Vec<ValueDescriptor>,
        returns: Option<ValueDescriptor>,
        handler: impl Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            returns,
            handler: Box::new(handler),
        }
    }

    /// The argument descriptors, in call order.
    pub fn args(&self) -> &[ValueDescriptor] {
        &self.args
    }

    /// The return descriptor, `None` for void.
    pub fn returns(&self) -> Option<&ValueDescriptor> {
        self.returns.as_ref()
    }

    pub fn invoke(&self, args: Vec<Value>) -> Result<Value, HandlerError> {
        (self.handler)(args)
    }
}

/// The set of operations a server exposes.
#[derive(Default)]
pub struct Registry {
    operations: HashMap<String, Operation>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation under `name`.
    ///
    /// Overloads are not supported: registering a name twice keeps the first
    /// operation and logs the duplicate.
    pub fn register(&mut self, name: impl Into<String>, operation: Operation) -> &mut Self {
        let name = name.into();
        match self.operations.entry(name) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                tracing::warn!(operation = %entry.key(), "duplicate registration ignored");
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(operation);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
