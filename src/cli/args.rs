//! Command line argument parsing
//!
//! `dockhand <action> [--request FILE] [--config FILE]` runs one action and
//! prints its response envelope. `--show-config` and `--list-actions` are
//! informational modes.

use super::input::RequestSource;
use crate::docker::{Action, ExpansionContext};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Action(ActionConfig),
    ShowConfig,
    ListActions,
}

impl ExecutionMode {
    /// Default log filter; `--verbose` on an action enables debug output.
    pub fn log_filter(&self) -> &'static str {
        match self {
            ExecutionMode::Action(config) if config.verbose => "dockhand=debug",
            _ => "dockhand=info",
        }
    }
}

#[derive(Debug)]
pub struct ActionConfig {
    pub action: Action,
    pub request: RequestSource,
    pub config_override: Option<PathBuf>,
    /// Recorded outputs served instead of running docker
    pub replay: Option<PathBuf>,
    pub vars: ExpansionContext,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "dockhand")]
#[command(author = "Dockhand Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive docker images and containers through typed, idempotent actions")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Action keyword (run, syspath, images, pull, container-status, ...)
    pub action: Option<String>,
    /// JSON request body, `-` reads stdin
    #[arg(short = 'r', long = "request", value_name = "FILE")]
    pub request: Option<PathBuf>,
    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Serve recorded command output from a JSON file
    #[arg(long = "replay", value_name = "FILE")]
    pub replay: Option<PathBuf>,
    /// Expansion variable (can be used multiple times)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Show configuration discovery information
    #[arg(long = "show-config")]
    pub show_config: bool,
    /// List supported action keywords
    #[arg(long = "list-actions")]
    pub list_actions: bool,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        if self.show_config {
            return Ok(ExecutionMode::ShowConfig);
        }
        if self.list_actions {
            return Ok(ExecutionMode::ListActions);
        }

        let keyword = self.action.as_deref().ok_or_else(|| {
            "No action specified. Use 'dockhand --list-actions' to see available actions.".to_string()
        })?;
        let action = keyword.parse::<Action>().map_err(|e| e.to_string())?;

        let vars = self
            .vars
            .iter()
            .fold(ExpansionContext::new(), |vars, (key, value)| vars.with_var(key, value));

        Ok(ExecutionMode::Action(ActionConfig {
            action,
            request: RequestSource::from_arg(self.request.as_deref()),
            config_override: self.config.clone(),
            replay: self.replay.clone(),
            vars,
            verbose: self.verbose,
        }))
    }
}
