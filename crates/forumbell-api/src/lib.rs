// forumbell-api: Async HTTP client for Discourse discovery and user-API-key endpoints

pub mod client;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod models;
pub mod session;
pub mod transport;

pub use client::SiteClient;
pub use error::Error;
pub use fetch::{FetchRequest, FetchResponse, HttpFetch, Method, ReqwestFetch};
pub use models::{BasicInfo, CurrentSession, CurrentUser};
pub use transport::TransportConfig;
