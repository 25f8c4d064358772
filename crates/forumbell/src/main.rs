mod cli;
mod commands;
mod error;
mod output;
mod platform;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forumbell_config::Config;
use forumbell_core::{CoreError, FileStore, LogPlatform, Platform, SiteClient, SiteRegistry};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::platform::TerminalPlatform;

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

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without a site store
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "forumbell", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = effective_config(&cli.global)?;
            let registry = open_registry(&cfg, &cli.global).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &registry, &cfg, &cli.global).await
        }
    }
}

/// Config file + environment, then command-line overrides.
fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = forumbell_config::load_config()?;
    if let Some(ref dir) = global.data_dir {
        cfg.data_dir = Some(dir.clone());
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Build the registry over the on-disk store and load it.
async fn open_registry(cfg: &Config, global: &GlobalOpts) -> Result<SiteRegistry, CliError> {
    let data_dir = cfg.resolve_data_dir();
    tracing::debug!(path = %data_dir.display(), "opening site store");

    let client = SiteClient::new(&cfg.transport_config()).map_err(CoreError::from)?;
    // Quiet runs leave alerts to the log.
    let platform: Arc<dyn Platform> = if global.quiet {
        Arc::new(LogPlatform::new(cfg.resolve_device_name()))
    } else {
        Arc::new(TerminalPlatform::new(
            cfg.resolve_device_name(),
            output::stderr_color(global.color),
        ))
    };

    SiteRegistry::open(
        cfg.to_registry_config(),
        client,
        Arc::new(FileStore::new(&data_dir)),
        platform,
    )
    .await
    .map_err(|e| CliError::from(e).with_data_dir(&data_dir))
}
