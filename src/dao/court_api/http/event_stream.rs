use std::sync::Arc;

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, header::ACCEPT};
use tracing::{debug, warn};

use crate::{
    dao::{
        event_source::{EventSource, EventStream, decoder::SseDecoder},
        transport::{TransportError, TransportResult},
    },
    dto::events::InboundEvent,
};

use super::{
    client::{HttpCourtApi, ensure_success},
    config::HttpConfig,
    error::HttpDaoError,
};

/// [`EventSource`] reading the service's `text/event-stream` endpoint.
#[derive(Clone)]
pub struct SseEventSource {
    client: Client,
    url: Arc<str>,
}

impl SseEventSource {
    /// Build an event source sharing the connection pool of `api`.
    pub fn new(api: &HttpCourtApi, config: &HttpConfig) -> Self {
        let url = format!(
            "{}{}",
            config.normalized_base_url(),
            config.normalized_event_path()
        );
        Self {
            client: api.client().clone(),
            url: Arc::from(url),
        }
    }
}

impl EventSource for SseEventSource {
    fn connect(&self, token: String) -> BoxFuture<'static, TransportResult<EventStream>> {
        let source = self.clone();
        Box::pin(async move {
            let path = source.url.to_string();
            let response = source
                .client
                .get(source.url.as_ref())
                .bearer_auth(token)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(|err| HttpDaoError::RequestSend {
                    path: path.clone(),
                    source: err,
                })?;
            let response = ensure_success(&path, response).await?;

            let mut body = response.bytes_stream();
            let events = async_stream::stream! {
                let mut decoder = SseDecoder::new();
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for frame in decoder.push(&bytes) {
                                match InboundEvent::from_frame(&frame) {
                                    Ok(Some(event)) => yield Ok(event),
                                    Ok(None) => {
                                        debug!(event = ?frame.event, "skipping unrecognised stream event")
                                    }
                                    Err(err) => {
                                        warn!(event = ?frame.event, error = %err, "failed to decode stream event")
                                    }
                                }
                            }
                        }
                        Err(err) => {
                            let err: TransportError = HttpDaoError::StreamInterrupted { source: err }.into();
                            yield Err(err);
                            break;
                        }
                    }
                }
            };

            Ok(events.boxed())
        })
    }
}
