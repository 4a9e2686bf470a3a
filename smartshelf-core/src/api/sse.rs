//! Server-Sent Events change feed
//!
//! Streams every `ShelfEvent` to connected clients. The initial event is the
//! current cart, so a freshly loaded page does not wait for the next change.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use smartshelf_common::ShelfEvent;

use crate::api::AppContext;

/// GET /events - SSE event stream
pub async fn event_stream(State(ctx): State<AppContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before taking the snapshot so nothing falls between them
    let rx = ctx.state.subscribe_events();
    let initial = ctx.fanout.cart_update().await;

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => to_sse(&event),
            Err(e) => {
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });
    let stream = stream::iter(to_sse(&initial)).chain(updates);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

fn to_sse(event: &ShelfEvent) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
