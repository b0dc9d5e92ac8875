mod client;
mod config;
mod error;
mod event_stream;
mod models;

pub use client::HttpCourtApi;
pub use config::HttpConfig;
pub use error::HttpDaoError;
pub use event_stream::SseEventSource;
