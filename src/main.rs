// Command-line entry point: drive one page towards an objective, or replay a
// recorded trajectory.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aria_pilot::{
    Agent, BrowseOptions, BrowserManager, HttpMemoryService, Inventory, MemoryService,
    NoopMemoryService, ObjectiveOutcome, OpenAiCompatibleProvider, RouteOptions, load_yaml_config,
};

#[derive(Parser, Debug)]
#[command(name = "aria-pilot", version, about = "Accessibility-tree browser agent")]
struct Cli {
    /// Page to open before the first turn
    #[arg(long)]
    url: String,

    /// What the agent should achieve
    #[arg(long, required_unless_present = "route")]
    objective: Option<String>,

    /// Turn cap, overriding the config file
    #[arg(long)]
    max_turns: Option<usize>,

    /// JSON file with `[{name, value, type}]` secrets
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Replay this recorded trajectory instead of browsing
    #[arg(long)]
    route: Option<String>,

    /// JSON schema file for the completion payload
    #[arg(long)]
    result_schema: Option<PathBuf>,

    /// YAML config file (defaults to ./config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_inventory(path: &PathBuf) -> Result<Arc<Inventory>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory {}", path.display()))?;
    Ok(Arc::new(Inventory::from_json(&json)?))
}

fn load_result_schema(path: &PathBuf) -> Result<serde_json::Value> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read result schema {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_yaml_config(cli.config.as_deref())?;

    let inventory = cli.inventory.as_ref().map(load_inventory).transpose()?;
    let result_schema = cli.result_schema.as_ref().map(load_result_schema).transpose()?;

    let provider = Arc::new(OpenAiCompatibleProvider::from_config(&config.model)?);
    let memory: Arc<dyn MemoryService> = match &config.memory.endpoint {
        Some(endpoint) => {
            let key = std::env::var(&config.memory.api_key_env).ok();
            Arc::new(HttpMemoryService::new(endpoint.as_str(), key)?)
        }
        None => {
            if cli.route.is_some() {
                bail!("--route needs memory.endpoint in the config");
            }
            Arc::new(NoopMemoryService)
        }
    };

    let manager = BrowserManager::new(config.browser.clone());
    let page = Arc::new(manager.new_page(&cli.url).await?);
    let agent = Agent::new(page, provider, memory, config.agent.clone(), config.backoff.clone());

    let result = match (&cli.route, &cli.objective) {
        (Some(route), _) => {
            info!("Following route {}", route);
            agent
                .follow_route(
                    route,
                    RouteOptions {
                        result_schema,
                        inventory,
                    },
                )
                .await
        }
        (None, Some(objective)) => {
            agent
                .browse(
                    objective,
                    BrowseOptions {
                        max_turns: cli.max_turns,
                        inventory,
                        result_schema,
                    },
                )
                .await
        }
        (None, None) => bail!("Either --objective or --route is required"),
    };

    if let Err(e) = agent.stop().await {
        warn!("Agent did not stop cleanly: {}", e);
    }
    manager.shutdown().await?;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    match output.outcome {
        ObjectiveOutcome::Complete { .. } => Ok(()),
        ObjectiveOutcome::Failed { reason } => bail!("Objective failed: {reason}"),
        ObjectiveOutcome::MaxTurnsExceeded { turns } => {
            bail!("Objective not reached within {turns} turns")
        }
    }
}
