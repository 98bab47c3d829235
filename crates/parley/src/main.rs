// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - a webhook-driven customer-support dispatch agent.
//!
//! This is the binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use parley::serve::{load, run_serve};
use parley_agent::{ReloadPlan, Subsystem};
use parley_config::ParleyConfig;

/// Parley - a webhook-driven customer-support dispatch agent.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server and dispatch pool.
    Serve,
    /// Validate configuration and exit.
    Check,
    /// Show what reloading from OLD to NEW would rebuild.
    ReloadPlan {
        /// Configuration currently running.
        old: PathBuf,
        /// Configuration about to be applied.
        new: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_or_exit(cli.config.as_deref());
            init_tracing(&config.logging.level, config.logging.ansi);
            if let Err(e) = run_serve(config, cli.config).await {
                eprintln!("parley: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check) => {
            let config = load_or_exit(cli.config.as_deref());
            println!(
                "parley: config OK (agent.name={}, completion.model={}, {} canned responses, {} tools)",
                config.agent.name,
                config.completion.model,
                config.canned_responses.len(),
                config.tools.len()
            );
        }
        Some(Commands::ReloadPlan { old, new }) => {
            let old = load_or_exit(Some(old.as_path()));
            let new = load_or_exit(Some(new.as_path()));
            print!("{}", render_plan(&ReloadPlan::diff(&old, &new)));
        }
        None => {
            println!("parley: use --help for available commands");
        }
    }
}

fn load_or_exit(path: Option<&std::path::Path>) -> ParleyConfig {
    match load(path) {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn render_plan(plan: &ReloadPlan) -> String {
    if plan.is_empty() {
        return "no changes\n".to_string();
    }
    let names = |subsystems: &[Subsystem]| {
        subsystems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    if !plan.reload.is_empty() {
        out.push_str(&format!("reload: {}\n", names(&plan.reload)));
    }
    if !plan.restart_required.is_empty() {
        out.push_str(&format!("restart required: {}\n", names(&plan.restart_required)));
    }
    out
}

fn init_tracing(log_level: &str, ansi: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(ansi)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_reload_plan() {
        let cli = Cli::parse_from(["parley", "reload-plan", "a.toml", "b.toml"]);
        assert!(matches!(
            cli.command,
            Some(Commands::ReloadPlan { ref old, ref new })
                if old == &PathBuf::from("a.toml") && new == &PathBuf::from("b.toml")
        ));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["parley", "check", "--config", "/tmp/p.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
    }

    #[test]
    fn render_plan_lists_both_groups() {
        let old = ParleyConfig::default();
        let mut new = old.clone();
        new.completion.model = "gpt-4.1".to_string();
        new.server.port = 9090;

        let rendered = render_plan(&ReloadPlan::diff(&old, &new));
        assert_eq!(rendered, "reload: completion\nrestart required: server\n");
    }

    #[test]
    fn render_plan_for_identical_configs() {
        let config = ParleyConfig::default();
        assert_eq!(render_plan(&ReloadPlan::diff(&config, &config)), "no changes\n");
    }
}
