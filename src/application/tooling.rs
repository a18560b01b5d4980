//! MCP plumbing: one authenticated JSON-RPC-over-HTTP connection per
//! environment, cached lazily by the [`ConnectionManager`].

use crate::config::{ConfigError, EnvironmentConfig, ResolvedCredentials};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("environment '{environment}' is not connected; call connect first")]
    NotConnected { environment: String },
    #[error("environment '{environment}' rejected the credentials")]
    Unauthorized { environment: String },
    #[error("environment '{environment}' transport error: {message}")]
    Transport {
        environment: String,
        message: String,
    },
    #[error("environment '{environment}' returned invalid JSON: {message}")]
    InvalidJson {
        environment: String,
        message: String,
    },
    #[error("environment '{environment}' returned error {code}: {message}")]
    Remote {
        environment: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct RemoteToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

/// Seam between the adapter and the wire. The production implementation is
/// [`ConnectionManager`]; tests substitute scripted backends.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn invoke_operation(
        &self,
        environment: &str,
        operation: &str,
        arguments: Value,
    ) -> Result<Value, RpcError>;

    async fn discover(&self, environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError>;
}

/// A live authenticated session against one environment's MCP endpoint.
#[derive(Debug)]
pub struct McpConnection {
    environment: String,
    endpoint: String,
    username: String,
    password: String,
    http: Client,
    connected: AtomicBool,
    id_counter: AtomicU64,
    // The endpoint answers one request at a time; concurrent callers sharing
    // this handle are serialized here.
    in_flight: AsyncMutex<()>,
}

impl McpConnection {
    pub fn new(environment: impl Into<String>, credentials: ResolvedCredentials) -> Self {
        Self {
            environment: environment.into(),
            endpoint: credentials.endpoint,
            username: credentials.username,
            password: credentials.password,
            http: Client::new(),
            connected: AtomicBool::new(false),
            id_counter: AtomicU64::new(1),
            in_flight: AsyncMutex::new(()),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Performs the initialize handshake. Must complete before `invoke` or
    /// `discover`; the connection manager calls this on first use.
    pub async fn connect(&self) -> Result<(), RpcError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {},
        });
        let result = self.request("initialize", params).await?;
        if let Some(info) = result.get("serverInfo") {
            debug!(environment = %self.environment, server = %info, "MCP handshake complete");
        }
        self.notify("notifications/initialized", json!({})).await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Calls a named remote operation. A JSON-RPC `error` member is surfaced
    /// verbatim as [`RpcError::Remote`], never swallowed.
    pub async fn invoke(&self, operation: &str, arguments: Value) -> Result<Value, RpcError> {
        self.ensure_connected()?;
        let params = json!({
            "name": operation,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            },
        });
        self.request("tools/call", params).await
    }

    /// Lists the operations the remote registry advertises. Introspection
    /// only; normal execution does not depend on it.
    pub async fn discover(&self) -> Result<Vec<RemoteToolInfo>, RpcError> {
        self.ensure_connected()?;
        let result = self.request("tools/list", json!({})).await?;
        let mut tools = Vec::new();
        if let Some(array) = result.get("tools").and_then(Value::as_array) {
            for tool in array {
                if let Some(name) = tool.get("name").and_then(Value::as_str) {
                    tools.push(RemoteToolInfo {
                        name: name.to_string(),
                        description: tool
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        input_schema: tool.get("inputSchema").cloned(),
                    });
                }
            }
        }
        Ok(tools)
    }

    fn ensure_connected(&self) -> Result<(), RpcError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RpcError::NotConnected {
                environment: self.environment.clone(),
            })
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let _guard = self.in_flight.lock().await;
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(environment = %self.environment, method, id, "Sending MCP request");

        let response = self.post(&payload).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|source| RpcError::InvalidJson {
                environment: self.environment.clone(),
                message: source.to_string(),
            })?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            warn!(environment = %self.environment, method, code, %message, "MCP request failed");
            return Err(RpcError::Remote {
                environment: self.environment.clone(),
                code,
                message,
                data: error.get("data").cloned(),
            });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        let _guard = self.in_flight.lock().await;
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.post(&payload).await.map(|_| ())
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, RpcError> {
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(payload)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                environment: self.environment.clone(),
                message: source.to_string(),
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RpcError::Unauthorized {
                environment: self.environment.clone(),
            }),
            status if !status.is_success() => Err(RpcError::Transport {
                environment: self.environment.clone(),
                message: format!("unexpected HTTP status {status}"),
            }),
            _ => Ok(response),
        }
    }
}

/// Keyed registry of live connections, one per environment. Owned by the
/// composition root and shared by reference; crossing environments never
/// shares a handle.
pub struct ConnectionManager {
    environments: HashMap<String, EnvironmentConfig>,
    connections: AsyncMutex<HashMap<String, Arc<McpConnection>>>,
}

impl ConnectionManager {
    pub fn new(environments: HashMap<String, EnvironmentConfig>) -> Self {
        Self {
            environments,
            connections: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Cache hit returns the existing handle without any I/O. On a miss the
    /// credentials are validated, the handshake performed, and the handle
    /// cached only on success; handshake failures leave nothing behind.
    pub async fn get(&self, environment: &str) -> Result<Arc<McpConnection>, RpcError> {
        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(environment) {
            return Ok(existing.clone());
        }

        let config =
            self.environments
                .get(environment)
                .ok_or_else(|| ConfigError::UnknownEnvironment {
                    environment: environment.to_string(),
                })?;
        let credentials = config.resolve(environment)?;
        let connection = Arc::new(McpConnection::new(environment, credentials));
        connection.connect().await?;
        connections.insert(environment.to_string(), connection.clone());
        info!(environment, "Connected to MCP endpoint");
        Ok(connection)
    }

    /// Evicts one cached handle. Re-invalidating an absent environment is a
    /// no-op.
    pub async fn invalidate(&self, environment: &str) {
        let mut connections = self.connections.lock().await;
        if connections.remove(environment).is_some() {
            info!(environment, "Invalidated cached connection");
        } else {
            debug!(environment, "No cached connection to invalidate");
        }
    }

    pub async fn invalidate_all(&self) {
        let mut connections = self.connections.lock().await;
        let evicted = connections.len();
        connections.clear();
        info!(evicted, "Invalidated all cached connections");
    }

    pub async fn cached(&self, environment: &str) -> bool {
        self.connections.lock().await.contains_key(environment)
    }
}

#[async_trait]
impl ToolBackend for ConnectionManager {
    async fn invoke_operation(
        &self,
        environment: &str,
        operation: &str,
        arguments: Value,
    ) -> Result<Value, RpcError> {
        let connection = self.get(environment).await?;
        connection.invoke(operation, arguments).await
    }

    async fn discover(&self, environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError> {
        let connection = self.get(environment).await?;
        connection.discover().await
    }
}
