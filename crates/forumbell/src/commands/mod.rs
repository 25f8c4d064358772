//! Command dispatch: bridges CLI args -> registry operations -> output formatting.

pub mod config_cmd;
pub mod pair;
pub mod refresh;
pub mod sites;
pub mod util;

use forumbell_config::Config;
use forumbell_core::SiteRegistry;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a registry-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    registry: &SiteRegistry,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Add { term } => sites::add(registry, &term, global).await,
        Command::List => sites::list(registry, global),
        Command::Remove { site } => sites::remove(registry, &site, global).await,
        Command::Unread { refresh } => sites::unread(registry, refresh, global).await,
        Command::Visit { site } => sites::visit(registry, &site, global).await,
        Command::Refresh(args) => refresh::handle(registry, &args, cfg, global).await,
        Command::Pair { site } => pair::handle(registry, &site, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use the site registry".into(),
        )),
    }
}
