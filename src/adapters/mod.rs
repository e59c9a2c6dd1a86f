// Adapters layer: the HTTP fetch adapter and the HTTP surface that serves the feed.

pub mod http;
pub mod server;

pub use http::HttpFeedSource;
pub use server::{create_router, serve, AppState};
