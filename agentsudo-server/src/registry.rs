//! Agent lookup for incoming requests.

use std::collections::HashMap;
use std::sync::Arc;

use agentsudo_core::Agent;
use parking_lot::RwLock;

/// Resolves the agent id carried by a request to an agent.
pub trait AgentLookup: Send + Sync {
    fn lookup(&self, agent_id: &str) -> Option<Arc<Agent>>;
}

impl<F> AgentLookup for F
where
    F: Fn(&str) -> Option<Arc<Agent>> + Send + Sync,
{
    fn lookup(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self(agent_id)
    }
}

/// In-memory map from request ids to agents.
///
/// Cloning is cheap and clones share the same entries, so agents can be
/// registered or removed while the server is running.
///
/// ```rust
/// use agentsudo_core::Agent;
/// use agentsudo_server::AgentRegistry;
///
/// let registry = AgentRegistry::new();
/// let id = registry.register(Agent::new("ReaderBot", ["read:weather"]));
/// registry.register_as("reader-001", Agent::new("ReaderBot", ["read:weather"]));
///
/// assert!(registry.get(&id).is_some());
/// assert!(registry.get("reader-001").is_some());
/// ```
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, Arc<Agent>>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` under its own id, which is returned.
    pub fn register(&self, agent: Arc<Agent>) -> String {
        let id = agent.id().to_string();
        self.register_as(id.clone(), agent);
        id
    }

    /// Register `agent` under a caller-chosen id, replacing any previous
    /// agent with that id.
    pub fn register_as(&self, id: impl Into<String>, agent: Arc<Agent>) -> Option<Arc<Agent>> {
        self.agents.write().insert(id.into(), agent)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}

impl AgentLookup for AgentRegistry {
    fn lookup(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.get(agent_id)
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.agents.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("AgentRegistry").field("ids", &ids).finish()
    }
}
