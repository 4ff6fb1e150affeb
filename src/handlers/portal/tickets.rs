use axum::{Extension, extract::State};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::middleware::AuthContext;
use crate::models::{CreateTicket, CreateTicketReply, Ticket, TicketReply, TicketStatus, TicketWithReplies};

pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateTicket>,
) -> Result<Json<Ticket>> {
    input.validate()?;
    let conn = state.db.get()?;
    if let Some(ref service_id) = input.service_id {
        queries::get_service(&conn, service_id)?.or_not_found(msg::SERVICE_NOT_FOUND)?;
    }

    let ticket = queries::create_ticket(&conn, &auth.user_id, &input)?;
    tracing::info!(ticket_id = %ticket.id, priority = %ticket.priority.as_ref(), "Ticket opened");
    state.feed.publish(
        ChangeEvent::new(ChangeKind::Ticket, ChangeAction::Insert, &auth.user_id, &ticket.id)
            .with_record(&ticket),
    );
    Ok(Json(ticket))
}

pub async fn list_my_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Ticket>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_tickets_for_user(&conn, &auth.user_id)?))
}

fn visible_ticket(conn: &rusqlite::Connection, auth: &AuthContext, id: &str) -> Result<Ticket> {
    queries::get_ticket(conn, id)?
        .filter(|t| t.user_id == auth.user_id || auth.is_admin())
        .or_not_found(msg::TICKET_NOT_FOUND)
}

pub async fn get_my_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TicketWithReplies>> {
    let conn = state.db.get()?;
    let ticket = visible_ticket(&conn, &auth, &id)?;
    let replies = queries::list_ticket_replies(&conn, &ticket.id)?;
    Ok(Json(TicketWithReplies { ticket, replies }))
}

/// Client reply on their own ticket. A resolved ticket reopens.
pub async fn reply_to_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(input): Json<CreateTicketReply>,
) -> Result<Json<TicketReply>> {
    input.validate()?;
    let conn = state.db.get()?;
    let ticket = queries::get_ticket(&conn, &id)?
        .filter(|t| t.user_id == auth.user_id)
        .or_not_found(msg::TICKET_NOT_FOUND)?;

    match ticket.status {
        TicketStatus::Closed => return Err(AppError::BadRequest(msg::TICKET_CLOSED.into())),
        TicketStatus::Resolved => {
            queries::update_ticket(
                &conn,
                &ticket.id,
                &crate::models::UpdateTicket {
                    status: Some(TicketStatus::Open),
                    priority: None,
                },
            )?;
        }
        TicketStatus::Open | TicketStatus::InProgress => {}
    }

    let reply = queries::create_ticket_reply(&conn, &ticket.id, &auth.user_id, &input.message, false)?;
    state.feed.publish(
        ChangeEvent::new(ChangeKind::Ticket, ChangeAction::Update, &ticket.user_id, &ticket.id)
            .with_record(&reply),
    );
    Ok(Json(reply))
}
