use clap::{Parser, ValueEnum};
use draftbridge::adapter::ToolAdapter;
use draftbridge::agent::{Agent, AgentOptions};
use draftbridge::client::{ChatClient, ClientConfig};
use draftbridge::config::AppConfig;
use draftbridge::model::{self, provider_from_config};
use draftbridge::server::{self, RemoteToolDto, ServerState};
use draftbridge::sync::SyncService;
use draftbridge::tooling::{ConnectionManager, ToolBackend};
use draftbridge::tracker::ChangeTracker;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "draftbridge",
    version,
    about = "Sandbox-to-production post replication agent over MCP"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    /// Environment the agent drafts against; overrides the config file.
    #[arg(long)]
    environment: Option<String>,
    /// Environment a sync replays into; overrides the config file.
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    system: Option<String>,
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    prompt_file: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Agent)]
    mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
    /// After an agent run, immediately replay the tracked changes into the
    /// target environment.
    #[arg(long)]
    then_sync: bool,
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Agent,
    Rest,
    Sync,
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting draftbridge");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, session = ?cli.session, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let file_config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration using default path or defaults");
    }

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(|| file_config.agent_environment.clone());
    let target = cli
        .target
        .clone()
        .unwrap_or_else(|| file_config.sync_target.clone());

    let connections = Arc::new(ConnectionManager::new(file_config.environments.clone()));
    let adapter = Arc::new(ToolAdapter::new(connections.clone()));
    let tracker = Arc::new(ChangeTracker::new());

    info!(mode = ?cli.mode, environment = environment.as_str(), "Running in selected mode");
    match cli.mode {
        RunMode::Agent => {
            let client = build_client(&cli, &file_config)?;
            let prompt = load_prompt(&cli)?;
            let options = AgentOptions {
                session_id: cli.session.clone(),
                system_prompt: cli.system.clone().or(file_config.system_prompt.clone()),
                progress: None,
            };
            info!("Executing agent workflow from CLI mode");
            let agent = Agent::new(
                client,
                adapter.clone(),
                environment.clone(),
                tracker.clone(),
            );
            let outcome = agent.run(prompt, options).await?;
            let output = json!({
                "session_id": outcome.session_id,
                "content": outcome.response,
                "tool_steps": outcome.steps,
                "tracked": outcome.tracked,
                "skipped": outcome.skipped,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);

            if cli.then_sync {
                run_sync(&adapter, &tracker, &target).await?;
            }
        }
        RunMode::Rest => {
            let client = build_client(&cli, &file_config)?;
            let state = Arc::new(ServerState::new(
                client,
                adapter.clone(),
                connections.clone(),
                tracker.clone(),
                environment,
                target,
            ));
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(state, cli.rest_addr).await?;
        }
        RunMode::Sync => {
            run_sync(&adapter, &tracker, &target).await?;
        }
        RunMode::Tools => {
            let tools: Vec<RemoteToolDto> = connections
                .discover(&environment)
                .await?
                .into_iter()
                .map(Into::into)
                .collect();
            let output = json!({
                "environment": environment,
                "tools": tools,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    info!("Execution finished");
    Ok(())
}

async fn run_sync(
    adapter: &Arc<ToolAdapter>,
    tracker: &Arc<ChangeTracker>,
    target: &str,
) -> Result<(), Box<dyn Error>> {
    let changes = tracker.snapshot();
    if changes.is_empty() {
        warn!("No tracked changes to replay");
    }
    let service = SyncService::new(adapter.clone(), target);
    let outcome = service.apply(&changes).await;
    if outcome.success {
        tracker.clear();
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn build_client(
    cli: &Cli,
    config: &AppConfig,
) -> Result<Arc<ChatClient<Box<dyn model::ModelProvider>>>, Box<dyn Error>> {
    let provider = provider_from_config(config)?;
    let mut client_config = ClientConfig::new(config.model.clone());
    if let Some(system_prompt) = cli.system.clone().or(config.system_prompt.clone()) {
        client_config = client_config.with_system_prompt(system_prompt);
    }
    Ok(Arc::new(ChatClient::new(provider, client_config)))
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path, "Loading prompt from file");
        let content = fs::read_to_string(path)?;
        return Ok(normalize_prompt(content));
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        let joined = cli.prompt.join(" ");
        return Ok(normalize_prompt(joined));
    }

    info!("Reading prompt from standard input");
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let prompt = normalize_prompt(buffer);
    if prompt.is_empty() {
        warn!("Prompt not provided via arguments, file, or stdin");
        return Err("prompt required via arguments, file, or stdin".into());
    }
    Ok(prompt)
}

fn normalize_prompt(prompt: String) -> String {
    prompt.trim().to_string()
}
