//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` to define how they are built from a row; the
//! `query_one` / `query_all` helpers cover the common query shapes.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on unexpected stored values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(
    row: &Row,
    col: usize,
    col_name: &str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, password_hash, email_confirmed_at, created_at, updated_at";

pub const PROFILE_COLS: &str =
    "user_id, email, full_name, phone, stripe_customer_id, created_at, updated_at";

pub const USER_ACCOUNT_COLS: &str = "u.id, u.email, p.full_name, p.phone, r.role, u.email_confirmed_at, u.created_at";

pub const WORKSPACE_COLS: &str = "owner_id, name, created_at, updated_at";

pub const TEAM_MEMBER_COLS: &str = "id, organization_id, user_id, email, role, status, invite_token_hash, invite_expires_at, invited_by, activated_at, created_at, updated_at";

pub const ROLE_PERMISSION_COLS: &str = "organization_id, role, manage_team, access_settings, delete_items, create_items, view_analytics, access_advanced_tools, updated_at";

pub const CATEGORY_COLS: &str =
    "id, name_en, name_ar, description_en, description_ar, icon, is_active, created_at, updated_at";

pub const SERVICE_COLS: &str = "id, category_id, name_en, name_ar, description_en, description_ar, price_cents, currency, is_active, created_at, updated_at";

pub const PACKAGE_COLS: &str = "id, service_id, name_en, name_ar, description_en, description_ar, price_cents, currency, features, is_active, created_at, updated_at";

pub const APPOINTMENT_COLS: &str = "id, user_id, service_id, client_name, client_email, client_phone, appointment_date, appointment_time, status, notes, progress, project_status, reminder_sent_at, created_at, updated_at";

pub const ORDER_COLS: &str =
    "id, user_id, package_id, amount_cents, currency, status, created_at, updated_at";

pub const TICKET_COLS: &str =
    "id, user_id, subject, description, priority, status, service_id, created_at, updated_at";

pub const TICKET_REPLY_COLS: &str = "id, ticket_id, author_id, message, is_staff, created_at";

pub const PAYMENT_COLS: &str = "id, user_id, appointment_id, order_id, amount_cents, currency, status, stripe_session_id, stripe_payment_intent, created_at, updated_at";

pub const SUBSCRIPTION_COLS: &str = "id, user_id, status, price_id, current_period_end, cancel_at_period_end, created_at, updated_at";

pub const NOTIFICATION_COLS: &str = "id, user_id, title, message, read, link, created_at";

pub const SITE_SETTING_COLS: &str = "key, value, updated_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            email_confirmed_at: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            user_id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            phone: row.get(3)?,
            stripe_customer_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for UserAccount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let confirmed: Option<i64> = row.get(5)?;
        Ok(UserAccount {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            phone: row.get(3)?,
            role: row
                .get::<_, Option<String>>(4)?
                .and_then(|r| r.parse().ok())
                .unwrap_or(UserRole::Client),
            email_confirmed: confirmed.is_some(),
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for Workspace {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Workspace {
            owner_id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl FromRow for TeamMember {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TeamMember {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            user_id: row.get(2)?,
            email: row.get(3)?,
            role: parse_enum(row, 4, "role")?,
            status: parse_enum(row, 5, "status")?,
            invite_token_hash: row.get(6)?,
            invite_expires_at: row.get(7)?,
            invited_by: row.get(8)?,
            activated_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for RolePermissions {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(RolePermissions {
            organization_id: row.get(0)?,
            role: parse_enum(row, 1, "role")?,
            permissions: PermissionSet {
                manage_team: row.get(2)?,
                access_settings: row.get(3)?,
                delete_items: row.get(4)?,
                create_items: row.get(5)?,
                view_analytics: row.get(6)?,
                access_advanced_tools: row.get(7)?,
            },
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Category {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get(0)?,
            name_en: row.get(1)?,
            name_ar: row.get(2)?,
            description_en: row.get(3)?,
            description_ar: row.get(4)?,
            icon: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Service {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Service {
            id: row.get(0)?,
            category_id: row.get(1)?,
            name_en: row.get(2)?,
            name_ar: row.get(3)?,
            description_en: row.get(4)?,
            description_ar: row.get(5)?,
            price_cents: row.get(6)?,
            currency: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for ServicePackage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ServicePackage {
            id: row.get(0)?,
            service_id: row.get(1)?,
            name_en: row.get(2)?,
            name_ar: row.get(3)?,
            description_en: row.get(4)?,
            description_ar: row.get(5)?,
            price_cents: row.get(6)?,
            currency: row.get(7)?,
            features: parse_json(row, 8, "features")?,
            is_active: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Appointment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Appointment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            service_id: row.get(2)?,
            client_name: row.get(3)?,
            client_email: row.get(4)?,
            client_phone: row.get(5)?,
            appointment_date: row.get(6)?,
            appointment_time: row.get(7)?,
            status: parse_enum(row, 8, "status")?,
            notes: row.get(9)?,
            progress: row.get(10)?,
            project_status: parse_enum(row, 11, "project_status")?,
            reminder_sent_at: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            package_id: row.get(2)?,
            amount_cents: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Ticket {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Ticket {
            id: row.get(0)?,
            user_id: row.get(1)?,
            subject: row.get(2)?,
            description: row.get(3)?,
            priority: parse_enum(row, 4, "priority")?,
            status: parse_enum(row, 5, "status")?,
            service_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for TicketReply {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TicketReply {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            author_id: row.get(2)?,
            message: row.get(3)?,
            is_staff: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            appointment_id: row.get(2)?,
            order_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            stripe_session_id: row.get(7)?,
            stripe_payment_intent: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            status: row.get(2)?,
            price_id: row.get(3)?,
            current_period_end: row.get(4)?,
            cancel_at_period_end: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Notification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            message: row.get(3)?,
            read: row.get(4)?,
            link: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for SiteSetting {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SiteSetting {
            key: row.get(0)?,
            value: parse_json(row, 1, "value")?,
            updated_at: row.get(2)?,
        })
    }
}
