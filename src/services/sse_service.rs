use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent, VIEW_HANDSHAKE},
    state::SharedState,
};

/// A fresh subscription to the view stream.
pub struct ViewSubscription {
    pub connection_id: String,
    pub receiver: broadcast::Receiver<ServerEvent>,
    pub handshake: Option<ServerEvent>,
}

/// Subscribe to the view SSE stream and prepare the greeting for this client.
pub fn subscribe_view(state: &SharedState) -> ViewSubscription {
    let connection_id = Uuid::new_v4().simple().to_string();
    let receiver = state.view_sse().subscribe();
    let handshake = match ServerEvent::json(
        Some(VIEW_HANDSHAKE.to_string()),
        &Handshake {
            stream: "view".into(),
            connection_id: connection_id.clone(),
            message: "view stream connected".into(),
            degraded: state.is_degraded(),
        },
    ) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialise view handshake");
            None
        }
    };

    ViewSubscription {
        connection_id,
        receiver,
        handshake,
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a view subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: ViewSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ViewSubscription {
        connection_id,
        mut receiver,
        handshake,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        if let Some(handshake) = handshake
            && tx.send(Ok(to_event(handshake))).await.is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged events but keep the stream alive.
                            debug!(connection_id = %connection_id, skipped, "view stream lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(connection_id = %connection_id, "view SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
