use crate::application::adapter::ToolAdapter;
use crate::application::client::ChatClient;
use crate::application::tooling::ConnectionManager;
use crate::application::tracker::ChangeTracker;
use crate::infrastructure::model::ModelProvider;
use std::sync::Arc;

pub struct ServerState<P: ModelProvider> {
    client: Arc<ChatClient<P>>,
    adapter: Arc<ToolAdapter>,
    connections: Arc<ConnectionManager>,
    tracker: Arc<ChangeTracker>,
    agent_environment: String,
    sync_target: String,
}

impl<P: ModelProvider> ServerState<P> {
    pub fn new(
        client: Arc<ChatClient<P>>,
        adapter: Arc<ToolAdapter>,
        connections: Arc<ConnectionManager>,
        tracker: Arc<ChangeTracker>,
        agent_environment: impl Into<String>,
        sync_target: impl Into<String>,
    ) -> Self {
        Self {
            client,
            adapter,
            connections,
            tracker,
            agent_environment: agent_environment.into(),
            sync_target: sync_target.into(),
        }
    }

    pub fn client(&self) -> Arc<ChatClient<P>> {
        Arc::clone(&self.client)
    }

    pub fn adapter(&self) -> Arc<ToolAdapter> {
        Arc::clone(&self.adapter)
    }

    pub fn connections(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.connections)
    }

    pub fn tracker(&self) -> Arc<ChangeTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn agent_environment(&self) -> &str {
        &self.agent_environment
    }

    pub fn sync_target(&self) -> &str {
        &self.sync_target
    }
}
