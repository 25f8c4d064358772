//! Config subcommand handlers.

use forumbell_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = resolved(config::load_config()?, global);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::from(config::ConfigError::from(e)))?,
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!(
                        "{} already exists; pass --force to overwrite",
                        path.display()
                    ),
                });
            }

            let cfg = Config {
                device_name: Some(Config::default().resolve_device_name()),
                ..Config::default()
            };
            config::save_config(&cfg)?;
            output::print_status(&format!("Wrote {}", path.display()), global.quiet);
            Ok(())
        }
    }
}

/// Fill in derived values so `show` prints what commands will actually use.
fn resolved(mut cfg: Config, global: &GlobalOpts) -> Config {
    if let Some(ref dir) = global.data_dir {
        cfg.data_dir = Some(dir.clone());
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
    cfg.device_name = Some(cfg.resolve_device_name());
    cfg.data_dir = Some(cfg.resolve_data_dir());
    cfg
}
