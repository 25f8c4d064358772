//! `pair` handler.
//!
//! The pending request lives in this process, so the whole handshake runs
//! here: print the authorization URL, then read the redirect back from
//! stdin.

use tokio::io::{AsyncBufReadExt, BufReader};

use forumbell_core::SiteRegistry;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{sites, util};

pub async fn handle(
    registry: &SiteRegistry,
    identifier: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = util::resolve_site(registry, identifier)?;
    let url = registry.begin_pairing(entry.id).await?;

    output::print_output(url.as_str(), false);
    output::print_status(
        &format!(
            "Open the URL above, approve access on {}, then paste the redirect URL here:",
            entry.site.display_name()
        ),
        global.quiet,
    );

    let reply = read_reply().await?;
    let paired = if reply.contains(forumbell_core::pairing::PAYLOAD_MARKER) {
        registry
            .handle_open_url(&reply)
            .await?
            .ok_or_else(|| CliError::Pairing {
                message: "the redirect URL carries no usable payload".into(),
            })?
    } else {
        registry.complete_pairing(&reply).await?
    };

    let name = registry
        .site(paired)
        .map_or_else(|| entry.site.display_name().to_owned(), |s| s.display_name().to_owned());
    output::print_status(&format!("Paired with {name}"), global.quiet);
    sites::print_unread(registry, global)
}

/// First non-empty line from stdin.
async fn read_reply() -> Result<String, CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            return Ok(line.to_owned());
        }
    }
    Err(CliError::Pairing {
        message: "no reply was entered".into(),
    })
}
