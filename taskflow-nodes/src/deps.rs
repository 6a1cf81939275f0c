use std::sync::Arc;
use std::time::Duration;

use taskflow_resources::ResourceManager;
use taskflow_store::Store;

use crate::agent::AgentRegistry;

/// Priority and timeout policy applied when a node acquires a resource.
/// Concrete values come from `taskflow_server::config::Settings`; nodes
/// only see the resolved numbers.
#[derive(Debug, Clone, Copy)]
pub struct NodePolicy {
    pub llm_priority: u8,
    pub llm_timeout: Duration,
    pub worker_priority: u8,
    pub worker_timeout: Duration,
}

impl Default for NodePolicy {
    fn default() -> Self {
        Self {
            llm_priority: 50,
            llm_timeout: Duration::from_secs(30),
            worker_priority: 50,
            worker_timeout: Duration::from_secs(60),
        }
    }
}

/// Everything a node handler needs beyond the `State` it's given: the
/// agent registry, the resource manager, the durable store, and policy
/// numbers. A `Core`-style dependency-injection bundle (spec.md §9:
/// "a `Core` value constructed at startup holds pool handles, DB
/// connection, agent registry; every component receives it").
#[derive(Clone)]
pub struct NodeDeps {
    pub agents: Arc<AgentRegistry>,
    pub resources: Arc<ResourceManager>,
    pub store: Arc<dyn Store>,
    pub policy: NodePolicy,
}
