mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use byme_config::{Config, ConfigError};
use byme_core::ControllerConfig;

use crate::cli::{Cli, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (profile_name, config) = build_controller_config(&cli.global)?;
    tracing::debug!(command = ?cli.command, profile = %profile_name, "dispatching command");
    commands::dispatch(cli.command, config, &cli.global)
        .await
        .map_err(|e| e.with_profile(&profile_name))
}

/// Build a `ControllerConfig` from the config file and the selected profile.
fn build_controller_config(global: &GlobalOpts) -> Result<(String, ControllerConfig), CliError> {
    let path = global.config.clone().unwrap_or_else(byme_config::config_path);
    let cfg = byme_config::load_config_from(&path)?;

    if cfg.profiles.is_empty() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    let (name, profile) = match byme_config::select_profile(&cfg, global.profile.as_deref()) {
        Ok(found) => found,
        Err(ConfigError::UnknownProfile { name }) => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(&cfg),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let config = byme_config::profile_to_controller_config(profile, name, &cfg.defaults)?;
    Ok((name.to_owned(), config))
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    names.join(", ")
}
