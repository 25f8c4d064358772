//! Site list command handlers.

use serde::Serialize;
use tabled::Tabled;

use forumbell_core::{RegisteredSite, Site, SiteRegistry};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

/// Serialized form of a site for JSON output. Never carries the token.
#[derive(Debug, Serialize)]
pub struct SiteView {
    pub position: usize,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub paired: bool,
    pub unread_notifications: u64,
    pub unread_private_messages: u64,
}

impl SiteView {
    fn new(position: usize, site: &Site) -> Self {
        Self {
            position,
            url: site.url.clone(),
            title: site.title.clone(),
            description: site.description.clone(),
            icon: site.icon.clone(),
            paired: site.is_paired(),
            unread_notifications: site.unread_notifications,
            unread_private_messages: site.unread_private_messages,
        }
    }
}

fn views(sites: &[RegisteredSite]) -> Vec<SiteView> {
    sites
        .iter()
        .enumerate()
        .map(|(i, entry)| SiteView::new(i + 1, &entry.site))
        .collect()
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Forum")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Paired")]
    paired: &'static str,
    #[tabled(rename = "Notifications")]
    notifications: String,
    #[tabled(rename = "Messages")]
    messages: String,
}

impl From<&SiteView> for SiteRow {
    fn from(v: &SiteView) -> Self {
        let count = |n: u64| if v.paired { n.to_string() } else { "-".into() };
        Self {
            position: v.position,
            name: v.title.clone().unwrap_or_else(|| v.url.clone()),
            url: v.url.clone(),
            paired: if v.paired { "yes" } else { "no" },
            notifications: count(v.unread_notifications),
            messages: count(v.unread_private_messages),
        }
    }
}

#[derive(Debug, Serialize)]
struct UnreadSummary {
    total: u64,
    sites: Vec<SiteView>,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn add(registry: &SiteRegistry, term: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let id = registry.discover_and_add(term).await?;
    let position = registry.len();
    let site = registry.site(id).ok_or_else(|| CliError::NotFound {
        identifier: id.to_string(),
    })?;

    output::print_status(
        &format!(
            "Added {} as #{position}. Pair it with: forumbell pair {position}",
            site.display_name()
        ),
        global.quiet,
    );
    let view = SiteView::new(position, &site);
    let out = output::render_single(global.output, &view, |v| v.url.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn list(registry: &SiteRegistry, global: &GlobalOpts) -> Result<(), CliError> {
    let views = views(&registry.sites());
    let out = output::render_list(
        global.output,
        &views,
        |v| SiteRow::from(v),
        |v| v.url.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn remove(
    registry: &SiteRegistry,
    identifier: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = util::resolve_site(registry, identifier)?;
    if !registry.remove(entry.id).await? {
        return Err(CliError::NotFound {
            identifier: identifier.into(),
        });
    }
    output::print_status(
        &format!("Removed {}", entry.site.display_name()),
        global.quiet,
    );
    Ok(())
}

pub async fn unread(
    registry: &SiteRegistry,
    refresh: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if refresh {
        registry.refresh_all().await?;
    }
    print_unread(registry, global)
}

/// Print the aggregate unread count in the selected format.
pub fn print_unread(registry: &SiteRegistry, global: &GlobalOpts) -> Result<(), CliError> {
    let paired: Vec<SiteView> = views(&registry.sites())
        .into_iter()
        .filter(|v| v.paired)
        .collect();
    let summary = UnreadSummary {
        total: registry.total_unread_count(),
        sites: paired,
    };

    let out = match global.output {
        OutputFormat::Table if !summary.sites.is_empty() => {
            let table = output::render_list(
                global.output,
                &summary.sites,
                |v| SiteRow::from(v),
                |v| v.url.clone(),
            )?;
            format!("{table}\nTotal unread: {}", summary.total)
        }
        _ => output::render_single(global.output, &summary, |s| s.total.to_string())?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn visit(
    registry: &SiteRegistry,
    identifier: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = util::resolve_site(registry, identifier)?;
    let url = registry.visit_url(entry.id).await?;

    if !entry.site.is_paired() {
        output::print_status(
            "Not paired yet; complete pairing with: forumbell pair <site>",
            global.quiet,
        );
    }
    output::print_output(url.as_str(), global.quiet);
    Ok(())
}
