use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::email::TicketReplyEmail;
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::middleware::AuthContext;
use crate::models::{
    CreateTicketReply, NewNotification, Ticket, TicketFilter, TicketReply, TicketStatus,
    UpdateTicket,
};
use crate::notify::notify_quietly;
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::site_url;

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Ticket>>> {
    let conn = state.db.get()?;
    let page = queries::list_tickets_paginated(&conn, &filter, pagination.limit(), pagination.offset())?;
    Ok(Json(Paginated::from_page(page, &pagination)))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTicket>,
) -> Result<Json<Ticket>> {
    let conn = state.db.get()?;
    let ticket = queries::update_ticket(&conn, &id, &input)?.or_not_found(msg::TICKET_NOT_FOUND)?;
    tracing::info!(ticket_id = %id, status = %ticket.status.as_ref(), "Ticket updated");
    state.feed.publish(
        ChangeEvent::new(ChangeKind::Ticket, ChangeAction::Update, &ticket.user_id, &ticket.id)
            .with_record(&ticket),
    );
    Ok(Json(ticket))
}

#[derive(Debug, Serialize)]
pub struct StaffReplyResponse {
    pub success: bool,
    pub reply: TicketReply,
    /// Set when the client could not be emailed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Staff reply. Moves an open ticket to in-progress and emails the client.
pub async fn reply_as_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(input): Json<CreateTicketReply>,
) -> Result<Json<StaffReplyResponse>> {
    input.validate()?;

    let (ticket, reply, client_email) = {
        let conn = state.db.get()?;
        let ticket = queries::get_ticket(&conn, &id)?.or_not_found(msg::TICKET_NOT_FOUND)?;
        let reply = queries::create_ticket_reply(&conn, &ticket.id, &auth.user_id, &input.message, true)?;
        if ticket.status == TicketStatus::Open {
            queries::update_ticket(
                &conn,
                &ticket.id,
                &UpdateTicket {
                    status: Some(TicketStatus::InProgress),
                    priority: None,
                },
            )?;
        }
        let client_email = queries::get_user_by_id(&conn, &ticket.user_id)?.map(|u| u.email);

        state.feed.publish(
            ChangeEvent::new(ChangeKind::Ticket, ChangeAction::Update, &ticket.user_id, &ticket.id)
                .with_record(&reply),
        );
        notify_quietly(
            &conn,
            &state.feed,
            &ticket.user_id,
            &NewNotification::new("New reply on your ticket", ticket.subject.clone())
                .link(format!("/portal/tickets/{}", ticket.id)),
        );
        (ticket, reply, client_email)
    };

    let warning = match client_email {
        Some(to) => {
            let ticket_url = site_url(&state.base_url, &format!("portal/tickets/{}", ticket.id));
            state
                .email_service
                .send_ticket_reply(TicketReplyEmail {
                    to: &to,
                    ticket_subject: &ticket.subject,
                    message: &reply.message,
                    ticket_url: &ticket_url,
                })
                .await
                .err()
                .map(|e| {
                    tracing::warn!(ticket_id = %ticket.id, "Failed to email ticket reply: {}", e);
                    "Reply saved, but the client could not be emailed".to_string()
                })
        }
        None => None,
    };

    Ok(Json(StaffReplyResponse {
        success: true,
        reply,
        warning,
    }))
}
