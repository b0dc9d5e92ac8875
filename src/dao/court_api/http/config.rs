const DEFAULT_EVENT_STREAM_PATH: &str = "/api/events";

/// Runtime configuration describing how to reach the court-finder service.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub event_stream_path: String,
}

impl HttpConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            event_stream_path: DEFAULT_EVENT_STREAM_PATH.to_string(),
        }
    }

    /// Override the path of the server-pushed event stream.
    pub fn with_event_stream_path(mut self, path: impl Into<String>) -> Self {
        self.event_stream_path = path.into();
        self
    }

    /// Base URL without a trailing slash.
    pub(crate) fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Event stream path with a guaranteed leading slash.
    pub(crate) fn normalized_event_path(&self) -> String {
        if self.event_stream_path.starts_with('/') {
            self.event_stream_path.clone()
        } else {
            format!("/{}", self.event_stream_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_urls() {
        let config = HttpConfig::new("http://localhost:5000/").with_event_stream_path("api/events");
        assert_eq!(config.normalized_base_url(), "http://localhost:5000");
        assert_eq!(config.normalized_event_path(), "/api/events");
    }
}
