//! MCPBridge (C16): exposes agent tools/resources/prompts under
//! `{agent_id}.{tool_name}` namespacing, grounded on `sven-mcp`'s
//! registry/bridge split. Bridge calls never throw — failures populate the
//! `error` field of the result instead.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::A2AError;

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    /// `{{arg}}`-templated prompt body; filled in by [`MCPBridge::get_prompt`].
    pub template: String,
}

#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    fn ok(output: Value) -> Self {
        Self {
            output: Some(output),
            error: None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Implemented by each agent that wants to expose tools/resources/prompts
/// over MCP.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn tools(&self) -> Vec<ToolDescriptor>;
    fn resources(&self) -> Vec<ResourceDescriptor>;
    fn prompts(&self) -> Vec<PromptDescriptor>;
    async fn invoke(&self, tool_name: &str, args: Value) -> Result<Value, String>;
    /// Reads the content behind one of this provider's `resources()` URIs.
    async fn read_resource(&self, uri: &str) -> Result<Value, String>;
}

pub fn namespaced_tool_name(agent_id: &str, tool_name: &str) -> String {
    format!("{agent_id}.{tool_name}")
}

/// Replaces every `{{key}}` in `template` with `args[key]` rendered as a
/// plain string (quotes stripped off JSON string values). A placeholder with
/// no matching argument is left untouched.
fn render_template(template: &str, args: &Value) -> String {
    let mut out = template.to_string();
    if let Some(map) = args.as_object() {
        for (key, value) in map {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&format!("{{{{{key}}}}}"), &rendered);
        }
    }
    out
}

#[derive(Default)]
pub struct MCPBridge {
    providers: Mutex<HashMap<String, std::sync::Arc<dyn ToolProvider>>>,
}

impl MCPBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&self, agent_id: &str, provider: std::sync::Arc<dyn ToolProvider>) {
        self.providers
            .lock()
            .unwrap()
            .insert(agent_id.to_string(), provider);
    }

    pub fn unregister_agent(&self, agent_id: &str) {
        self.providers.lock().unwrap().remove(agent_id);
    }

    /// Namespaced tool catalogue across every registered agent.
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(agent_id, provider)| {
                provider
                    .tools()
                    .into_iter()
                    .map(move |t| namespaced_tool_name(agent_id, &t.name))
            })
            .collect();
        names.sort();
        names
    }

    pub fn list_resources(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .providers
            .lock()
            .unwrap()
            .values()
            .flat_map(|p| p.resources().into_iter().map(|r| r.uri))
            .collect();
        uris.sort();
        uris
    }

    pub fn list_prompts(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(agent_id, provider)| {
                provider
                    .prompts()
                    .into_iter()
                    .map(move |p| namespaced_tool_name(agent_id, &p.name))
            })
            .collect();
        names.sort();
        names
    }

    /// Invokes `{agent_id}.{tool_name}`. Never returns `Err` — an unknown
    /// agent, unknown tool, or provider failure all populate
    /// `ToolResult::error` instead.
    pub async fn invoke_tool(&self, namespaced_name: &str, args: Value) -> ToolResult {
        let Some((agent_id, tool_name)) = namespaced_name.split_once('.') else {
            return ToolResult::err(format!("malformed tool name: {namespaced_name}"));
        };
        let provider = {
            let providers = self.providers.lock().unwrap();
            providers.get(agent_id).cloned()
        };
        let Some(provider) = provider else {
            return ToolResult::err(format!("unknown agent: {agent_id}"));
        };
        match provider.invoke(tool_name, args).await {
            Ok(value) => ToolResult::ok(value),
            Err(e) => ToolResult::err(e),
        }
    }

    /// Reads a resource by its exact URI across every registered provider.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, A2AError> {
        let providers: Vec<_> = self.providers.lock().unwrap().values().cloned().collect();
        for provider in providers {
            if provider.resources().iter().any(|r| r.uri == uri) {
                return provider
                    .read_resource(uri)
                    .await
                    .map_err(A2AError::Serialization);
            }
        }
        Err(A2AError::ResourceNotFound(uri.to_string()))
    }

    /// Looks up `{agent_id}.{prompt_name}` and renders its template against
    /// `args` via `{{key}}` substitution.
    pub fn get_prompt(&self, namespaced_name: &str, args: &Value) -> Result<String, A2AError> {
        let (agent_id, prompt_name) = namespaced_name
            .split_once('.')
            .ok_or_else(|| A2AError::PromptNotFound(namespaced_name.to_string()))?;
        let providers = self.providers.lock().unwrap();
        let provider = providers
            .get(agent_id)
            .ok_or_else(|| A2AError::PromptNotFound(namespaced_name.to_string()))?;
        let descriptor = provider
            .prompts()
            .into_iter()
            .find(|p| p.name == prompt_name)
            .ok_or_else(|| A2AError::PromptNotFound(namespaced_name.to_string()))?;
        Ok(render_template(&descriptor.template, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoProvider;

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                name: "echo".into(),
                description: "echoes input".into(),
                input_schema: json!({"type": "object"}),
            }]
        }
        fn resources(&self) -> Vec<ResourceDescriptor> {
            vec![ResourceDescriptor {
                uri: "memo://greeting".into(),
                description: "a stored greeting".into(),
            }]
        }
        fn prompts(&self) -> Vec<PromptDescriptor> {
            vec![PromptDescriptor {
                name: "greet".into(),
                description: "greets someone by name".into(),
                template: "Hello, {{name}}!".into(),
            }]
        }
        async fn invoke(&self, tool_name: &str, args: Value) -> Result<Value, String> {
            if tool_name != "echo" {
                return Err(format!("no such tool: {tool_name}"));
            }
            Ok(args)
        }
        async fn read_resource(&self, uri: &str) -> Result<Value, String> {
            if uri != "memo://greeting" {
                return Err(format!("no such resource: {uri}"));
            }
            Ok(json!({"text": "hi there"}))
        }
    }

    #[test]
    fn list_tools_is_namespaced_and_sorted() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        assert_eq!(bridge.list_tools(), vec!["agent-a.echo".to_string()]);
    }

    #[tokio::test]
    async fn invoke_tool_succeeds_for_known_tool() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let result = bridge.invoke_tool("agent-a.echo", json!({"x": 1})).await;
        assert_eq!(result.output, Some(json!({"x": 1})));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn invoke_tool_never_throws_on_unknown_agent() {
        let bridge = MCPBridge::new();
        let result = bridge.invoke_tool("ghost.echo", json!({})).await;
        assert!(result.output.is_none());
        assert!(result.error.unwrap().contains("unknown agent"));
    }

    #[tokio::test]
    async fn invoke_tool_never_throws_on_malformed_name() {
        let bridge = MCPBridge::new();
        let result = bridge.invoke_tool("no-dot-here", json!({})).await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn invoke_tool_surfaces_provider_error_without_panicking() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let result = bridge.invoke_tool("agent-a.missing", json!({})).await;
        assert!(result.error.unwrap().contains("no such tool"));
    }

    #[tokio::test]
    async fn read_resource_finds_owning_provider() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let value = bridge.read_resource("memo://greeting").await.unwrap();
        assert_eq!(value, json!({"text": "hi there"}));
    }

    #[tokio::test]
    async fn read_resource_unknown_uri_fails() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let err = bridge.read_resource("memo://missing").await;
        assert!(matches!(err, Err(A2AError::ResourceNotFound(_))));
    }

    #[test]
    fn get_prompt_substitutes_template_args() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let rendered = bridge
            .get_prompt("agent-a.greet", &json!({"name": "Ada"}))
            .unwrap();
        assert_eq!(rendered, "Hello, Ada!");
    }

    #[test]
    fn get_prompt_unknown_name_fails() {
        let bridge = MCPBridge::new();
        bridge.register_agent("agent-a", std::sync::Arc::new(EchoProvider));
        let err = bridge.get_prompt("agent-a.missing", &json!({}));
        assert!(matches!(err, Err(A2AError::PromptNotFound(_))));
    }
}
