pub mod court_api;
pub mod credentials;
pub mod event_source;
pub mod models;
pub mod transport;
