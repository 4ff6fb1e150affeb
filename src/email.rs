//! Transactional email via the Resend API.
//!
//! Every send is a single best-effort attempt. Callers log failures (or
//! surface them as warnings) and never roll back the operation that
//! triggered the email.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TeamRole;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2026")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format minor units as a price, e.g. 150000 "usd" -> "1500.00 USD".
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount_cents / 100,
        (amount_cents % 100).abs(),
        currency.to_uppercase()
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was accepted by Resend
    Sent,
    /// No API key configured; nothing was sent
    NoApiKey,
}

pub struct InvitationEmail<'a> {
    pub to: &'a str,
    pub organization_name: &'a str,
    pub inviter_name: &'a str,
    pub role: TeamRole,
    pub invite_url: &'a str,
    pub expires_at: i64,
}

pub struct BookingReminderEmail<'a> {
    pub to: &'a str,
    pub client_name: &'a str,
    pub service_name: &'a str,
    pub date: &'a str,
    pub time: &'a str,
}

pub struct PaymentConfirmationEmail<'a> {
    pub to: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub description: &'a str,
}

pub struct TicketReplyEmail<'a> {
    pub to: &'a str,
    pub ticket_subject: &'a str,
    pub message: &'a str,
    pub ticket_url: &'a str,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

fn wrap_html(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">{}</h2>
{}
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">You are receiving this email because of activity on your account.</p>
</body>
</html>"#,
        escape_html(heading),
        body
    )
}

#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            from_email,
            http_client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn send_invitation(&self, email: InvitationEmail<'_>) -> Result<EmailSendResult> {
        let subject = format!("You've been invited to join {}", email.organization_name);
        let expires = format_date(email.expires_at);
        let text = format!(
            "{} invited you to join {} as {}.\n\nAccept the invitation:\n{}\n\nThis link expires on {}.",
            email.inviter_name,
            email.organization_name,
            email.role.as_ref(),
            email.invite_url,
            expires
        );
        let body = format!(
            r#"<p><strong>{}</strong> invited you to join <strong>{}</strong> as <strong>{}</strong>.</p>
<p><a href="{}" style="display: inline-block; background: #111; color: #fff; padding: 12px 20px; border-radius: 6px; text-decoration: none;">Accept invitation</a></p>
<p style="color: #666;">This link expires on {}.</p>"#,
            escape_html(email.inviter_name),
            escape_html(email.organization_name),
            email.role.as_ref(),
            escape_html(email.invite_url),
            expires
        );
        self.send(email.to, subject, text, wrap_html("Team invitation", &body))
            .await
    }

    pub async fn send_booking_reminder(
        &self,
        email: BookingReminderEmail<'_>,
    ) -> Result<EmailSendResult> {
        let subject = format!("Reminder: {} on {}", email.service_name, email.date);
        let text = format!(
            "Hi {},\n\nThis is a reminder of your {} appointment on {} at {} (UTC).",
            email.client_name, email.service_name, email.date, email.time
        );
        let body = format!(
            "<p>Hi {},</p><p>This is a reminder of your <strong>{}</strong> appointment on <strong>{}</strong> at <strong>{}</strong> (UTC).</p>",
            escape_html(email.client_name),
            escape_html(email.service_name),
            escape_html(email.date),
            escape_html(email.time)
        );
        self.send(email.to, subject, text, wrap_html("Upcoming appointment", &body))
            .await
    }

    pub async fn send_payment_confirmation(
        &self,
        email: PaymentConfirmationEmail<'_>,
    ) -> Result<EmailSendResult> {
        let amount = format_amount(email.amount_cents, email.currency);
        let subject = format!("Payment received: {}", amount);
        let text = format!(
            "We received your payment of {} for {}. Thank you!",
            amount, email.description
        );
        let body = format!(
            "<p>We received your payment of <strong>{}</strong> for {}.</p><p>Thank you!</p>",
            amount,
            escape_html(email.description)
        );
        self.send(email.to, subject, text, wrap_html("Payment confirmation", &body))
            .await
    }

    pub async fn send_ticket_reply(&self, email: TicketReplyEmail<'_>) -> Result<EmailSendResult> {
        let subject = format!("Re: {}", email.ticket_subject);
        let text = format!(
            "Our team replied to your ticket \"{}\":\n\n{}\n\nView the conversation: {}",
            email.ticket_subject, email.message, email.ticket_url
        );
        let body = format!(
            r#"<p>Our team replied to your ticket <strong>{}</strong>:</p>
<blockquote style="border-left: 3px solid #ddd; margin: 0; padding-left: 12px; color: #333;">{}</blockquote>
<p><a href="{}">View the conversation</a></p>"#,
            escape_html(email.ticket_subject),
            escape_html(email.message).replace('\n', "<br>"),
            escape_html(email.ticket_url)
        );
        self.send(email.to, subject, text, wrap_html("New reply", &body))
            .await
    }

    async fn send(
        &self,
        to: &str,
        subject: String,
        text: String,
        html: String,
    ) -> Result<EmailSendResult> {
        let Some(ref api_key) = self.api_key else {
            tracing::debug!(to = %to, subject = %subject, "No Resend API key configured, skipping email");
            return Ok(EmailSendResult::NoApiKey);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to],
            subject,
            text,
            html,
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Email service error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Email service error: {} - {}",
                status, body
            )));
        }

        let result: ResendEmailResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Email service response error: {}", e)))?;
        tracing::info!(to = %to, email_id = %result.id, "Email sent via Resend");
        Ok(EmailSendResult::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_format_from_minor_units() {
        assert_eq!(format_amount(150_000, "usd"), "1500.00 USD");
        assert_eq!(format_amount(1_999, "eur"), "19.99 EUR");
        assert_eq!(format_amount(5, "sar"), "0.05 SAR");
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[tokio::test]
    async fn unconfigured_service_skips_sending() {
        let service = EmailService::new(None, "noreply@example.com".into());
        let result = service
            .send_invitation(InvitationEmail {
                to: "a@b.com",
                organization_name: "Acme",
                inviter_name: "Owner",
                role: TeamRole::Member,
                invite_url: "http://localhost/invite?token=x",
                expires_at: 0,
            })
            .await
            .unwrap();
        assert_eq!(result, EmailSendResult::NoApiKey);
    }
}
