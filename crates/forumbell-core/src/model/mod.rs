// ── Domain model ──

pub mod site;

pub use site::{RegisteredSite, Site, SiteId};
