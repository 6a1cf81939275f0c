use std::sync::Arc;

use taskflow_graph::InMemoryCheckpointer;
use taskflow_nodes::{Agent, AgentRegistry, HttpAgent, LoggingMiddleware, NodeDeps, NodePolicy};
use taskflow_resources::ResourceManager;
use taskflow_store::{SqliteStore, Store};

use crate::cancellation::CancellationRegistry;
use crate::settings::Settings;

/// Construction-time dependency bundle handed to every handler via axum's
/// `with_state` (spec.md §9: "a `Core` value constructed at startup holds
/// pool handles, DB connection, agent registry; every component receives
/// it"), mirroring `adk-server/src/config.rs`'s `ServerConfig`.
#[derive(Clone)]
pub struct Core {
    pub store: Arc<dyn Store>,
    pub resources: Arc<ResourceManager>,
    pub agents: Arc<AgentRegistry>,
    pub checkpointer: Arc<InMemoryCheckpointer>,
    pub policy: NodePolicy,
    pub max_steps: usize,
    pub cancellations: Arc<CancellationRegistry>,
}

impl Core {
    pub async fn build(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&settings.database_url).await?);
        let resources = Arc::new(ResourceManager::new(settings.resource_config()));

        let mut registry = AgentRegistry::new();
        for name in [
            "context_analyzer",
            "objective_decomposer",
            "task_analyzer",
            "research",
            "processing",
            "quality_evaluator",
            "synthesis",
            "error_diagnosis",
        ] {
            let agent: Arc<dyn Agent> = Arc::new(HttpAgent::new(name, settings.llm_endpoint.clone(), settings.llm_api_key.clone()));
            registry.register(name, agent, vec![Arc::new(LoggingMiddleware)]);
        }

        Ok(Self {
            store,
            resources,
            agents: Arc::new(registry),
            checkpointer: Arc::new(InMemoryCheckpointer::new()),
            policy: NodePolicy::default(),
            max_steps: settings.max_steps,
            cancellations: Arc::new(CancellationRegistry::new()),
        })
    }

    pub fn node_deps(&self) -> NodeDeps {
        NodeDeps {
            agents: self.agents.clone(),
            resources: self.resources.clone(),
            store: self.store.clone(),
            policy: self.policy,
        }
    }
}
