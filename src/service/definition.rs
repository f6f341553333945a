//! Service definitions: a named capability set of methods.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::{ProtocolKind, Struct};
use crate::service::context::CallContext;
use crate::service::responder::Responder;

/// Asynchronous method entry point. Must not block; complete the responder
/// now or from a spawned task.
pub type MethodFn = Arc<dyn Fn(CallContext, Struct, Responder) + Send + Sync>;

#[derive(Clone)]
pub struct MethodEntry {
    name: String,
    oneway: bool,
    handler: MethodFn,
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    pub(crate) fn invoke(&self, ctx: CallContext, args: Struct, responder: Responder) {
        (self.handler)(ctx, args, responder)
    }
}

impl std::fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("oneway", &self.oneway)
            .finish()
    }
}

/// Read-only method table for one service.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    name: String,
    protocol: ProtocolKind,
    methods: HashMap<String, MethodEntry>,
}

impl ServiceDefinition {
    pub fn builder(name: impl Into<String>) -> ServiceDefinitionBuilder {
        ServiceDefinitionBuilder {
            name: name.into(),
            protocol: ProtocolKind::default(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Protocol used when the request does not name one.
    pub fn protocol(&self) -> ProtocolKind {
        self.protocol
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Same methods, different default protocol.
    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }
}

pub struct ServiceDefinitionBuilder {
    name: String,
    protocol: ProtocolKind,
    methods: HashMap<String, MethodEntry>,
}

impl ServiceDefinitionBuilder {
    pub fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    /// Register a request/response method. A later registration with the same
    /// name replaces the earlier one.
    pub fn method<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Struct, Responder) + Send + Sync + 'static,
    {
        self.insert(name.into(), false, Arc::new(handler))
    }

    /// Register a oneway method. It runs like any other, but no reply is sent.
    pub fn oneway_method<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Struct, Responder) + Send + Sync + 'static,
    {
        self.insert(name.into(), true, Arc::new(handler))
    }

    fn insert(mut self, name: String, oneway: bool, handler: MethodFn) -> Self {
        self.methods.insert(
            name.clone(),
            MethodEntry {
                name,
                oneway,
                handler,
            },
        );
        self
    }

    pub fn build(self) -> ServiceDefinition {
        ServiceDefinition {
            name: self.name,
            protocol: self.protocol,
            methods: self.methods,
        }
    }
}
