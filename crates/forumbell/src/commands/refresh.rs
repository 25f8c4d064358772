//! `refresh` handler: one cascade, or a watch loop until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use forumbell_config::Config;
use forumbell_core::SiteRegistry;

use crate::cli::{GlobalOpts, RefreshArgs};
use crate::error::CliError;
use crate::output;

use super::sites;

pub async fn handle(
    registry: &SiteRegistry,
    args: &RefreshArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.watch {
        let changed = registry.refresh_all().await?;
        if !changed {
            output::print_status("No changes", global.quiet);
        }
        return sites::print_unread(registry, global);
    }

    let interval = args
        .interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .or_else(|| cfg.refresh_interval())
        .ok_or_else(|| CliError::Validation {
            field: "refresh_interval".into(),
            reason: "watch mode needs a non-zero interval; pass --interval".into(),
        })?;

    watch(registry, interval, global).await
}

/// Refresh every `interval`, printing the unread summary on each change.
async fn watch(
    registry: &SiteRegistry,
    interval: Duration,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    info!(interval_secs = interval.as_secs(), "watching for unread changes");
    output::print_status(
        &format!("Refreshing every {}s, Ctrl-C to stop", interval.as_secs()),
        global.quiet,
    );

    // Observers fire once per committed cascade, not once per site.
    let committed = Arc::new(Notify::new());
    let subscription = registry.subscribe({
        let committed = Arc::clone(&committed);
        move || committed.notify_one()
    });
    let cancel = CancellationToken::new();
    let task = registry.spawn_refresh_task(interval, cancel.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            biased;
            signal = &mut ctrl_c => break signal.map_err(CliError::from),
            () = committed.notified() => {
                let stamp = chrono::Local::now().format("%H:%M:%S");
                output::print_status(&format!("[{stamp}] unread counts changed"), global.quiet);
                if let Err(e) = sites::print_unread(registry, global) {
                    break Err(e);
                }
            }
        }
    };

    registry.unsubscribe(subscription);
    cancel.cancel();
    task.await
        .map_err(|e| CliError::Internal(format!("refresh task failed: {e}")))?;
    result
}
