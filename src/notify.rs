//! In-app notifications: stored per user and pushed to their realtime stream.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::feed::{ChangeAction, ChangeEvent, ChangeFeed, ChangeKind};
use crate::models::{NewNotification, Notification};

pub fn notify(
    conn: &Connection,
    feed: &ChangeFeed,
    user_id: &str,
    input: &NewNotification,
) -> Result<Notification> {
    let notification = queries::create_notification(conn, user_id, input)?;
    feed.publish(
        ChangeEvent::new(
            ChangeKind::Notification,
            ChangeAction::Insert,
            user_id,
            &notification.id,
        )
        .with_record(&notification),
    );
    Ok(notification)
}

/// Best-effort variant for side effects of an already committed write.
pub fn notify_quietly(conn: &Connection, feed: &ChangeFeed, user_id: &str, input: &NewNotification) {
    if let Err(e) = notify(conn, feed, user_id, input) {
        tracing::warn!(user_id = %user_id, "Failed to create notification: {}", e);
    }
}
