//! Shared helpers for command handlers.

use forumbell_core::{RegisteredSite, Site, SiteRegistry};

use crate::error::CliError;

/// Resolve a 1-based list position or a forum URL to a registered site.
///
/// URLs match with or without scheme and trailing slash. With duplicate
/// entries the first match wins.
pub fn resolve_site(registry: &SiteRegistry, identifier: &str) -> Result<RegisteredSite, CliError> {
    let sites = registry.sites();

    if let Ok(position) = identifier.trim().parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|i| sites.get(i))
            .cloned()
            .ok_or_else(|| not_found(identifier));
    }

    let wanted = identifier.trim().trim_end_matches('/');
    let normalized = Site::normalize_term(identifier);
    sites
        .iter()
        .find(|entry| {
            let url = entry.site.url.as_str();
            url.eq_ignore_ascii_case(wanted)
                || url.eq_ignore_ascii_case(&normalized)
                || strip_scheme(url).eq_ignore_ascii_case(wanted)
        })
        .cloned()
        .ok_or_else(|| not_found(identifier))
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

fn not_found(identifier: &str) -> CliError {
    CliError::NotFound {
        identifier: identifier.into(),
    }
}
