use anyhow::Context;
use dockhand::cli::{ActionConfig, Args, ExecutionMode};
use dockhand::docker::{Action, DockerOrchestrator, ServiceResponse};
use dockhand::gateway::{CommandGateway, LocalGateway, ReplayGateway};
use dockhand::DockhandConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    // Logs go to stderr so stdout carries only the envelope
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(mode.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match mode {
        ExecutionMode::Action(config) => {
            let response = run_action(config).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_ok() {
                std::process::exit(1);
            }
            Ok(())
        }
        ExecutionMode::ShowConfig => {
            show_config();
            Ok(())
        }
        ExecutionMode::ListActions => {
            for action in Action::ALL {
                println!("{}", action);
            }
            Ok(())
        }
    }
}

async fn run_action(config: ActionConfig) -> anyhow::Result<ServiceResponse> {
    let settings = DockhandConfig::load(config.config_override.as_deref())
        .context("failed to load configuration")?;
    let body = config.request.load().context("failed to load request")?;

    info!("Running action {}", config.action);
    match &config.replay {
        Some(path) => {
            let gateway = ReplayGateway::from_json_file(path)
                .with_context(|| format!("failed to load recordings from {:?}", path))?;
            Ok(dispatch(gateway, &settings, &config, body).await)
        }
        None => {
            let gateway = LocalGateway::with_shell(&settings.shell);
            if let Err(e) = gateway.health_check() {
                warn!("{}", e);
            }
            Ok(dispatch(gateway, &settings, &config, body).await)
        }
    }
}

async fn dispatch<G: CommandGateway>(
    gateway: G,
    settings: &DockhandConfig,
    config: &ActionConfig,
    body: Option<serde_json::Value>,
) -> ServiceResponse {
    let orchestrator = DockerOrchestrator::with_config(gateway, settings.orchestrator_config());
    orchestrator
        .dispatch_keyword(&config.vars, config.action.keyword(), body)
        .await
}

fn show_config() {
    println!("Configuration Discovery Hierarchy:");
    println!();

    let current_dir = std::env::current_dir().ok();
    let home_dir = std::env::var("HOME").ok().map(std::path::PathBuf::from);
    let candidates = DockhandConfig::config_candidates(current_dir.as_deref(), home_dir.as_deref());
    for (i, candidate) in candidates.iter().enumerate() {
        let status = if candidate.is_file() {
            "EXISTS"
        } else if candidate.exists() {
            "NOT A FILE"
        } else {
            "NOT FOUND"
        };
        println!("  {}. {:?} - {}", i + 1, candidate, status);
    }

    println!();
    match DockhandConfig::find_config_file() {
        Some(found) => println!("Active configuration: {:?}", found),
        None => println!("Active configuration: Built-in defaults"),
    }
}
