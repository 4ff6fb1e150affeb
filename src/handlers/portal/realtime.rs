use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{debug, warn};

use crate::db::AppState;
use crate::feed::ChangeEvent;
use crate::middleware::AuthContext;

/// Wait for the next event owned by `user_id`. `None` once the feed is gone.
async fn next_for_user(rx: &mut Receiver<ChangeEvent>, user_id: &str) -> Option<ChangeEvent> {
    loop {
        match rx.recv().await {
            Ok(event) if event.user_id == user_id => return Some(event),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, user_id, "Realtime subscriber lagged, skipped events");
            }
            Err(RecvError::Closed) => {
                debug!("Change feed closed");
                return None;
            }
        }
    }
}

/// Server-sent events for the caller's own rows (notifications, bookings,
/// tickets, payments, orders). Event name is the table kind.
pub async fn realtime(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();
    let user_id = auth.user_id;

    let events = stream::unfold((rx, user_id), |(mut rx, user_id)| async move {
        let change = next_for_user(&mut rx, &user_id).await?;
        let kind = serde_json::to_value(change.kind)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| "change".to_string());
        let event = match Event::default().event(kind).json_data(&change) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to serialize change event: {}", e);
                Event::default().comment("serialization failed")
            }
        };
        Some((Ok(event), (rx, user_id)))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
