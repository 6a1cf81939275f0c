use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{NodeError, Result};
use crate::prompts::PromptTemplate;

/// What an agent needs to produce a response: a rendered prompt plus which
/// role it's playing, used for logging/telemetry.
pub struct AgentContext {
    pub agent_name: String,
    pub prompt: String,
}

/// Design Note §9: "a single `Agent` capability with one method `run(ctx,
/// input) -> output`, implemented by every concrete agent. The engine calls
/// it uniformly; no runtime probing." Grounded in `adk-core/src/agent.rs`'s
/// trait shape, stripped of sub-agent delegation and event-stream output
/// since every taskflow agent returns one parsed JSON value.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: AgentContext, input: Value) -> Result<Value>;
}

/// Pre/post hook around an `Agent::run` call, composed at registration time
/// rather than via decorator-style attribute copying (spec.md §9).
#[async_trait]
pub trait AgentMiddleware: Send + Sync {
    async fn before(&self, ctx: &AgentContext) {
        let _ = ctx;
    }
    async fn after(&self, ctx: &AgentContext, result: &Result<Value>) {
        let _ = (ctx, result);
    }
}

/// Logs call latency and outcome around every agent invocation.
pub struct LoggingMiddleware;

#[async_trait]
impl AgentMiddleware for LoggingMiddleware {
    async fn before(&self, ctx: &AgentContext) {
        debug!(agent = %ctx.agent_name, "agent call starting");
    }

    async fn after(&self, ctx: &AgentContext, result: &Result<Value>) {
        match result {
            Ok(_) => debug!(agent = %ctx.agent_name, "agent call succeeded"),
            Err(err) => warn!(agent = %ctx.agent_name, %err, "agent call failed"),
        }
    }
}

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    middlewares: Vec<Arc<dyn AgentMiddleware>>,
}

/// Holds every agent the graph can call, keyed by name, with its
/// middleware chain (spec.md §9's `RegisterAgent(name, agent,
/// middlewares...)`).
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, RegisteredAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
        middlewares: Vec<Arc<dyn AgentMiddleware>>,
    ) {
        self.agents.insert(name.into(), RegisteredAgent { agent, middlewares });
    }

    pub async fn invoke(&self, agent_name: &str, template: &PromptTemplate, input: Value) -> Result<Value> {
        let registered = self
            .agents
            .get(agent_name)
            .ok_or_else(|| NodeError::Agent(format!("no agent registered for '{agent_name}'")))?;

        let ctx = AgentContext { agent_name: agent_name.to_string(), prompt: template.render(&input) };
        for mw in &registered.middlewares {
            mw.before(&ctx).await;
        }
        let result = registered.agent.run(
            AgentContext { agent_name: ctx.agent_name.clone(), prompt: ctx.prompt.clone() },
            input,
        ).await;
        for mw in &registered.middlewares {
            mw.after(&ctx, &result).await;
        }
        result
    }
}

/// Calls an HTTP LLM endpoint expecting a JSON completion, the only
/// concrete `Agent` this crate ships; test code uses a scripted mock
/// instead.
pub struct HttpAgent {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpAgent {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Agent for HttpAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: AgentContext, _input: Value) -> Result<Value> {
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({"prompt": ctx.prompt}))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NodeError::Agent(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NodeError::Agent(format!("llm endpoint returned {}", response.status())));
        }

        let body: Value = response.json().await.map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;
        debug!(agent = %self.name, elapsed_ms = started.elapsed().as_millis(), "llm call completed");
        Ok(body)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Scripted agent returning one queued response per call, for node
    /// unit tests that don't reach a real LLM.
    pub struct ScriptedAgent {
        name: String,
        responses: Mutex<Vec<Result<Value>>>,
    }

    impl ScriptedAgent {
        pub fn new(name: impl Into<String>, mut responses: Vec<Value>) -> Self {
            responses.reverse();
            Self {
                name: name.into(),
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            }
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _ctx: AgentContext, _input: Value) -> Result<Value> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(NodeError::Agent("scripted agent exhausted".to_string())))
        }
    }
}
