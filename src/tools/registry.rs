use super::{ToolArgs, ToolDescriptor, ToolResult};
use crate::context::ToolContext;
use crate::error::{ErrorKind, ToolError};
use futures::FutureExt;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Function-calling definition handed to the voice runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Collects descriptors at startup. Consumed by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: IndexMap<&'static str, ToolDescriptor>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if a tool with the same name is already registered.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> &mut Self {
        let name = descriptor.name;
        assert!(
            !self.tools.contains_key(name),
            "Tool '{}' is already registered",
            name
        );
        self.tools.insert(name, descriptor);
        self
    }

    pub fn build(self) -> ToolRegistry {
        info!("🔧 Registered {} tools", self.tools.len());
        ToolRegistry { tools: self.tools }
    }
}

/// Immutable name → descriptor table.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: IndexMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|desc| ToolDefinition {
                name: desc.name.to_string(),
                description: desc.description.to_string(),
                parameters: desc.parameters_schema(),
            })
            .collect()
    }

    /// Validates `args`, runs the handler and normalizes whatever happens
    /// into a [`ToolResult`]. Never panics and never returns an error.
    pub async fn dispatch(&self, ctx: &Arc<ToolContext>, name: &str, args: Value) -> ToolResult {
        let Some(descriptor) = self.tools.get(name) else {
            warn!("Unknown tool requested: {}", name);
            return ToolResult::failure(
                format!("Unknown tool: {}", name),
                Some(ErrorKind::NotFound),
            );
        };

        let span = info_span!("tool", name = descriptor.name);
        async move {
            info!("🔧 Executing tool: {}", descriptor.name);
            debug!("Tool arguments: {}", args);

            let args: ToolArgs = match descriptor.validate(args) {
                Ok(args) => args,
                Err(err) => {
                    warn!("Rejected arguments: {}", err);
                    return ToolResult::from(Err(err));
                }
            };

            let call = (descriptor.handler)(Arc::clone(ctx), args);
            let result = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(ToolError::execution(format!(
                    "{} failed unexpectedly",
                    descriptor.name
                ))),
            };

            match &result {
                Ok(_) => info!("✅ {} succeeded", descriptor.name),
                Err(err) => warn!("❌ {} failed: {}", descriptor.name, err),
            }
            ToolResult::from(result)
        }
        .instrument(span)
        .await
    }
}
