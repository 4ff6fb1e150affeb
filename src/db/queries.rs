use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params, types::Value};
use uuid::Uuid;

use crate::error::{AppError, Result, msg};
use crate::models::*;

use super::from_row::{
    APPOINTMENT_COLS, CATEGORY_COLS, NOTIFICATION_COLS, ORDER_COLS, PACKAGE_COLS, PAYMENT_COLS,
    PROFILE_COLS, ROLE_PERMISSION_COLS, SERVICE_COLS, SITE_SETTING_COLS, SUBSCRIPTION_COLS,
    TEAM_MEMBER_COLS, TICKET_COLS, TICKET_REPLY_COLS, USER_ACCOUNT_COLS, USER_COLS,
    WORKSPACE_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

fn enum_value(value: impl AsRef<str>) -> Value {
    Value::Text(value.as_ref().to_string())
}

// ============ Users ============

/// Create an auth identity with its profile and role in one transaction.
pub fn create_user(
    conn: &mut Connection,
    input: &CreateUser,
    password_hash: Option<&str>,
) -> Result<UserAccount> {
    let id = gen_id();
    let now = now();
    let email = normalize_email(&input.email);
    let confirmed_at = input.email_confirmed.then_some(now);

    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO users (id, email, password_hash, email_confirmed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &email, password_hash, confirmed_at, now],
    )?;
    tx.execute(
        "INSERT INTO profiles (user_id, email, full_name, phone, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &email, input.full_name.trim(), &input.phone, now],
    )?;
    tx.execute(
        "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
        params![&id, input.role.as_ref()],
    )?;
    tx.commit()?;

    Ok(UserAccount {
        id,
        email,
        full_name: input.full_name.trim().to_string(),
        phone: input.phone.clone(),
        role: input.role,
        email_confirmed: confirmed_at.is_some(),
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = normalize_email(email);
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLS),
        &[&user_id],
    )
}

pub fn get_account(conn: &Connection, id: &str) -> Result<Option<UserAccount>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM users u
             LEFT JOIN profiles p ON p.user_id = u.id
             LEFT JOIN user_roles r ON r.user_id = u.id
             WHERE u.id = ?1",
            USER_ACCOUNT_COLS
        ),
        &[&id],
    )
}

pub fn list_accounts_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<UserAccount>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM users u
             LEFT JOIN profiles p ON p.user_id = u.id
             LEFT JOIN user_roles r ON r.user_id = u.id
             ORDER BY u.created_at DESC LIMIT ?1 OFFSET ?2",
            USER_ACCOUNT_COLS
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

pub fn get_user_role(conn: &Connection, user_id: &str) -> Result<Option<UserRole>> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM user_roles WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(role.and_then(|r| r.parse().ok()))
}

pub fn set_user_role(conn: &Connection, user_id: &str, role: UserRole) -> Result<()> {
    conn.execute(
        "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
        params![user_id, role.as_ref()],
    )?;
    Ok(())
}

pub fn set_password_hash(conn: &Connection, user_id: &str, password_hash: &str) -> Result<bool> {
    UpdateBuilder::new("users", user_id)
        .with_updated_at()
        .set("password_hash", password_hash.to_string())
        .execute(conn)
}

pub fn confirm_email(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET email_confirmed_at = COALESCE(email_confirmed_at, ?1) WHERE id = ?2",
        params![now(), user_id],
    )?;
    Ok(())
}

pub fn update_profile(conn: &Connection, user_id: &str, input: &UpdateProfile) -> Result<bool> {
    let mut fields: Vec<(&str, Value)> = Vec::new();
    if let Some(ref name) = input.full_name {
        fields.push(("full_name", name.trim().to_string().into()));
    }
    if let Some(ref phone) = input.phone {
        fields.push(("phone", phone.clone().into()));
    }
    if fields.is_empty() {
        return Ok(false);
    }
    fields.push(("updated_at", now().into()));
    let sets: Vec<String> = fields.iter().map(|(c, _)| format!("{} = ?", c)).collect();
    let mut values: Vec<Value> = fields.into_iter().map(|(_, v)| v).collect();
    values.push(user_id.to_string().into());
    let affected = conn.execute(
        &format!("UPDATE profiles SET {} WHERE user_id = ?", sets.join(", ")),
        rusqlite::params_from_iter(values),
    )?;
    Ok(affected > 0)
}

pub fn set_stripe_customer_id(conn: &Connection, user_id: &str, customer_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET stripe_customer_id = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![customer_id, now(), user_id],
    )?;
    Ok(())
}

pub fn get_user_id_by_stripe_customer(conn: &Connection, customer_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT user_id FROM profiles WHERE stripe_customer_id = ?1",
        params![customer_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM user_roles WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

// ============ User Deletion ============

/// Every (table, column) that can reference a user id.
const USER_REFERENCES: &[(&str, &str)] = &[
    ("notifications", "user_id"),
    ("ticket_replies", "author_id"),
    ("tickets", "user_id"),
    ("payments", "user_id"),
    ("subscriptions", "user_id"),
    ("orders", "user_id"),
    ("appointments", "user_id"),
    ("team_members", "user_id"),
    ("team_members", "organization_id"),
    ("team_members", "invited_by"),
    ("workspace_permissions", "organization_id"),
    ("workspaces", "owner_id"),
    ("site_settings", "updated_by"),
    ("user_roles", "user_id"),
    ("profiles", "user_id"),
    ("users", "id"),
];

/// Delete all rows owned by a user, dependents first. Runs on the caller's transaction.
fn delete_user_rows(conn: &Connection, user_id: &str) -> Result<UserDeletionReport> {
    let mut report = UserDeletionReport {
        notifications: conn.execute("DELETE FROM notifications WHERE user_id = ?1", params![user_id])?,
        ticket_replies: conn.execute(
            "DELETE FROM ticket_replies
             WHERE author_id = ?1 OR ticket_id IN (SELECT id FROM tickets WHERE user_id = ?1)",
            params![user_id],
        )?,
        ..Default::default()
    };
    report.tickets = conn.execute("DELETE FROM tickets WHERE user_id = ?1", params![user_id])?;
    report.payments = conn.execute("DELETE FROM payments WHERE user_id = ?1", params![user_id])?;
    report.subscriptions =
        conn.execute("DELETE FROM subscriptions WHERE user_id = ?1", params![user_id])?;
    report.orders = conn.execute("DELETE FROM orders WHERE user_id = ?1", params![user_id])?;
    report.appointments =
        conn.execute("DELETE FROM appointments WHERE user_id = ?1", params![user_id])?;
    report.team_members = conn.execute(
        "DELETE FROM team_members WHERE user_id = ?1 OR organization_id = ?1 OR invited_by = ?1",
        params![user_id],
    )?;
    report.workspace_permissions = conn.execute(
        "DELETE FROM workspace_permissions WHERE organization_id = ?1",
        params![user_id],
    )?;
    report.workspaces = conn.execute("DELETE FROM workspaces WHERE owner_id = ?1", params![user_id])?;
    conn.execute(
        "UPDATE site_settings SET updated_by = NULL WHERE updated_by = ?1",
        params![user_id],
    )?;
    conn.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user_id])?;
    conn.execute("DELETE FROM profiles WHERE user_id = ?1", params![user_id])?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(report)
}

/// Delete a user and everything referencing them, atomically.
///
/// Returns None when the user does not exist. Any failure rolls back the whole
/// cascade.
pub fn delete_user_cascade(
    conn: &mut Connection,
    user_id: &str,
) -> Result<Option<UserDeletionReport>> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![user_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(None);
    }
    let report = delete_user_rows(&tx, user_id)?;
    tx.commit()?;
    Ok(Some(report))
}

/// Number of rows anywhere in the schema that still reference `user_id`.
pub fn count_user_references(conn: &Connection, user_id: &str) -> Result<i64> {
    let mut total = 0i64;
    for (table, column) in USER_REFERENCES {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column),
            params![user_id],
            |row| row.get(0),
        )?;
        total += count;
    }
    Ok(total)
}

// ============ Workspaces & Permissions ============

pub fn get_workspace(conn: &Connection, owner_id: &str) -> Result<Option<Workspace>> {
    query_one(
        conn,
        &format!("SELECT {} FROM workspaces WHERE owner_id = ?1", WORKSPACE_COLS),
        &[&owner_id],
    )
}

/// Get the owner's workspace, creating it with default role permissions on first use.
pub fn ensure_workspace(conn: &mut Connection, owner_id: &str, name: &str) -> Result<Workspace> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let now = now();
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO workspaces (owner_id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![owner_id, name, now],
    )?;
    if inserted > 0 {
        for role in [TeamRole::Admin, TeamRole::Member, TeamRole::Viewer] {
            write_role_permissions(&tx, owner_id, role, &PermissionSet::default_for(role), now)?;
        }
    }
    let workspace = query_one(
        &tx,
        &format!("SELECT {} FROM workspaces WHERE owner_id = ?1", WORKSPACE_COLS),
        &[&owner_id],
    )?
    .ok_or_else(|| AppError::Internal("workspace missing after insert".into()))?;
    tx.commit()?;
    Ok(workspace)
}

fn write_role_permissions(
    conn: &Connection,
    organization_id: &str,
    role: TeamRole,
    set: &PermissionSet,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO workspace_permissions
            (organization_id, role, manage_team, access_settings, delete_items, create_items,
             view_analytics, access_advanced_tools, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(organization_id, role) DO UPDATE SET
            manage_team = excluded.manage_team,
            access_settings = excluded.access_settings,
            delete_items = excluded.delete_items,
            create_items = excluded.create_items,
            view_analytics = excluded.view_analytics,
            access_advanced_tools = excluded.access_advanced_tools,
            updated_at = excluded.updated_at",
        params![
            organization_id,
            role.as_ref(),
            set.manage_team,
            set.access_settings,
            set.delete_items,
            set.create_items,
            set.view_analytics,
            set.access_advanced_tools,
            now
        ],
    )?;
    Ok(())
}

pub fn get_role_permissions(
    conn: &Connection,
    organization_id: &str,
    role: TeamRole,
) -> Result<Option<RolePermissions>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM workspace_permissions WHERE organization_id = ?1 AND role = ?2",
            ROLE_PERMISSION_COLS
        ),
        &[&organization_id, &role.as_ref()],
    )
}

pub fn list_role_permissions(conn: &Connection, organization_id: &str) -> Result<Vec<RolePermissions>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM workspace_permissions WHERE organization_id = ?1
             ORDER BY CASE role WHEN 'Admin' THEN 0 WHEN 'Member' THEN 1 ELSE 2 END",
            ROLE_PERMISSION_COLS
        ),
        &[&organization_id],
    )
}

/// Toggle individual flags for a role. A role without a stored row starts from its defaults.
pub fn update_role_permissions(
    conn: &Connection,
    organization_id: &str,
    role: TeamRole,
    input: &UpdateRolePermissions,
) -> Result<RolePermissions> {
    let mut permissions = get_role_permissions(conn, organization_id, role)?
        .map(|r| r.permissions)
        .unwrap_or_else(|| PermissionSet::default_for(role));
    permissions.apply(input);
    let now = now();
    write_role_permissions(conn, organization_id, role, &permissions, now)?;
    Ok(RolePermissions {
        organization_id: organization_id.to_string(),
        role,
        permissions,
        updated_at: now,
    })
}

// ============ Team Members ============

pub struct NewInvite<'a> {
    pub organization_id: &'a str,
    pub email: &'a str,
    pub role: TeamRole,
    pub invited_by: &'a str,
    pub token_hash: &'a str,
    pub expires_at: i64,
}

pub fn create_invite(conn: &Connection, input: &NewInvite) -> Result<TeamMember> {
    let id = gen_id();
    let now = now();
    let email = normalize_email(input.email);
    conn.execute(
        "INSERT INTO team_members
            (id, organization_id, email, role, status, invite_token_hash, invite_expires_at,
             invited_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?8)",
        params![
            &id,
            input.organization_id,
            &email,
            input.role.as_ref(),
            input.token_hash,
            input.expires_at,
            input.invited_by,
            now
        ],
    )?;
    Ok(TeamMember {
        id,
        organization_id: input.organization_id.to_string(),
        user_id: None,
        email,
        role: input.role,
        status: MemberStatus::Pending,
        invite_token_hash: Some(input.token_hash.to_string()),
        invite_expires_at: Some(input.expires_at),
        invited_by: Some(input.invited_by.to_string()),
        activated_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_team_member(conn: &Connection, id: &str) -> Result<Option<TeamMember>> {
    query_one(
        conn,
        &format!("SELECT {} FROM team_members WHERE id = ?1", TEAM_MEMBER_COLS),
        &[&id],
    )
}

/// Rows for an email in an organization that are still pending or active.
pub fn list_open_members_by_email(
    conn: &Connection,
    organization_id: &str,
    email: &str,
) -> Result<Vec<TeamMember>> {
    let email = normalize_email(email);
    query_all(
        conn,
        &format!(
            "SELECT {} FROM team_members
             WHERE organization_id = ?1 AND email = ?2 AND status IN ('pending', 'active')
             ORDER BY created_at DESC",
            TEAM_MEMBER_COLS
        ),
        &[&organization_id, &email],
    )
}

/// Look up a member by live token hash, falling back to the consumed hash so
/// replays of an accepted token still resolve to their row.
pub fn get_member_by_token_hash(conn: &Connection, token_hash: &str) -> Result<Option<TeamMember>> {
    let live = query_one(
        conn,
        &format!(
            "SELECT {} FROM team_members WHERE invite_token_hash = ?1",
            TEAM_MEMBER_COLS
        ),
        &[&token_hash],
    )?;
    if live.is_some() {
        return Ok(live);
    }
    query_one(
        conn,
        &format!(
            "SELECT {} FROM team_members WHERE consumed_token_hash = ?1
             ORDER BY activated_at DESC LIMIT 1",
            TEAM_MEMBER_COLS
        ),
        &[&token_hash],
    )
}

pub fn get_active_membership(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
) -> Result<Option<TeamMember>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM team_members
             WHERE organization_id = ?1 AND user_id = ?2 AND status = 'active'",
            TEAM_MEMBER_COLS
        ),
        &[&organization_id, &user_id],
    )
}

pub fn list_team_members(conn: &Connection, organization_id: &str) -> Result<Vec<TeamMemberView>> {
    let now = now();
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, (SELECT full_name FROM profiles p WHERE p.user_id = team_members.user_id)
         FROM team_members WHERE organization_id = ?1 ORDER BY created_at DESC",
        TEAM_MEMBER_COLS
    ))?;
    let rows = stmt
        .query_map(params![organization_id], |row| {
            let member = <TeamMember as super::from_row::FromRow>::from_row(row)?;
            let full_name: Option<String> = row.get(12)?;
            Ok(TeamMemberView {
                effective_status: member.effective_status(now),
                member,
                full_name,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace a pending invite's token and expiry.
pub fn refresh_invite(conn: &Connection, id: &str, token_hash: &str, expires_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE team_members SET invite_token_hash = ?1, invite_expires_at = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![token_hash, expires_at, now(), id],
    )?;
    Ok(affected > 0)
}

/// Transition a pending member to active.
///
/// Guarded on `status = 'pending'`: of two concurrent acceptances exactly one
/// writes. Returns whether this call performed the transition.
pub fn activate_member(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE team_members
         SET status = 'active', user_id = ?1, activated_at = ?2, updated_at = ?2,
             consumed_token_hash = invite_token_hash, invite_token_hash = NULL
         WHERE id = ?3 AND status = 'pending'",
        params![user_id, now, id],
    )?;
    Ok(affected > 0)
}

pub fn update_team_member(
    conn: &Connection,
    id: &str,
    input: &UpdateTeamMember,
) -> Result<Option<TeamMember>> {
    let mut builder = UpdateBuilder::new("team_members", id)
        .with_updated_at()
        .set_opt("role", input.role.map(enum_value))
        .set_opt("status", input.status.map(enum_value));
    if input.status == Some(MemberStatus::Inactive) {
        builder = builder.set("invite_token_hash", Value::Null);
    }
    builder.execute(conn)?;
    get_team_member(conn, id)
}

/// Remove a member row and, if it is linked to an account, that account with
/// its full cascade. One transaction.
///
/// Administrator accounts are never deleted this way; the whole removal is
/// refused instead.
pub fn remove_team_member(
    conn: &mut Connection,
    member: &TeamMember,
) -> Result<Option<UserDeletionReport>> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    if let Some(ref user_id) = member.user_id
        && get_user_role(&tx, user_id)? == Some(UserRole::Admin)
    {
        return Err(AppError::Forbidden(msg::ADMIN_ACCOUNT_PROTECTED.into()));
    }
    tx.execute("DELETE FROM team_members WHERE id = ?1", params![&member.id])?;
    let report = match member.user_id {
        Some(ref user_id) => Some(delete_user_rows(&tx, user_id)?),
        None => None,
    };
    tx.commit()?;
    Ok(report)
}

// ============ Catalog ============

pub fn create_category(conn: &Connection, input: &CreateCategory, icon: &str) -> Result<Category> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO categories
            (id, name_en, name_ar, description_en, description_ar, icon, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            &id,
            input.name_en.trim(),
            &input.name_ar,
            &input.description_en,
            &input.description_ar,
            icon,
            input.is_active,
            now
        ],
    )?;
    Ok(Category {
        id,
        name_en: input.name_en.trim().to_string(),
        name_ar: input.name_ar.clone(),
        description_en: input.description_en.clone(),
        description_ar: input.description_ar.clone(),
        icon: icon.to_string(),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_category(conn: &Connection, id: &str) -> Result<Option<Category>> {
    query_one(
        conn,
        &format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLS),
        &[&id],
    )
}

pub fn list_categories(conn: &Connection, active_only: bool) -> Result<Vec<Category>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM categories {} ORDER BY name_en",
            CATEGORY_COLS, filter
        ),
        &[],
    )
}

pub fn update_category(conn: &Connection, id: &str, input: &UpdateCategory) -> Result<Option<Category>> {
    UpdateBuilder::new("categories", id)
        .with_updated_at()
        .set_opt("name_en", input.name_en.as_ref().map(|n| n.trim().to_string()))
        .set_opt("name_ar", input.name_ar.clone())
        .set_opt("description_en", input.description_en.clone())
        .set_opt("description_ar", input.description_ar.clone())
        .set_opt("icon", input.icon.clone())
        .set_opt("is_active", input.is_active)
        .execute(conn)?;
    get_category(conn, id)
}

pub fn delete_category(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn create_service(conn: &Connection, input: &CreateService) -> Result<Service> {
    let id = gen_id();
    let now = now();
    let currency = input.currency.to_lowercase();
    conn.execute(
        "INSERT INTO services
            (id, category_id, name_en, name_ar, description_en, description_ar, price_cents,
             currency, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            &id,
            &input.category_id,
            input.name_en.trim(),
            &input.name_ar,
            &input.description_en,
            &input.description_ar,
            input.price_cents,
            &currency,
            input.is_active,
            now
        ],
    )?;
    Ok(Service {
        id,
        category_id: input.category_id.clone(),
        name_en: input.name_en.trim().to_string(),
        name_ar: input.name_ar.clone(),
        description_en: input.description_en.clone(),
        description_ar: input.description_ar.clone(),
        price_cents: input.price_cents,
        currency,
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>> {
    query_one(
        conn,
        &format!("SELECT {} FROM services WHERE id = ?1", SERVICE_COLS),
        &[&id],
    )
}

pub fn list_services(
    conn: &Connection,
    category_id: Option<&str>,
    active_only: bool,
) -> Result<Vec<Service>> {
    let mut conditions = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(category_id) = category_id {
        conditions.push("category_id = ?");
        values.push(category_id.to_string().into());
    }
    if active_only {
        conditions.push("is_active = 1");
    }
    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM services {} ORDER BY name_en",
        SERVICE_COLS, filter
    ))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |row| {
            <Service as super::from_row::FromRow>::from_row(row)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_service(conn: &Connection, id: &str, input: &UpdateService) -> Result<Option<Service>> {
    UpdateBuilder::new("services", id)
        .with_updated_at()
        .set_opt("category_id", input.category_id.clone())
        .set_opt("name_en", input.name_en.as_ref().map(|n| n.trim().to_string()))
        .set_opt("name_ar", input.name_ar.clone())
        .set_opt("description_en", input.description_en.clone())
        .set_opt("description_ar", input.description_ar.clone())
        .set_opt("price_cents", input.price_cents)
        .set_opt("currency", input.currency.as_ref().map(|c| c.to_lowercase()))
        .set_opt("is_active", input.is_active)
        .execute(conn)?;
    get_service(conn, id)
}

pub fn delete_service(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn create_package(conn: &Connection, input: &CreateServicePackage) -> Result<ServicePackage> {
    let id = gen_id();
    let now = now();
    let currency = input.currency.to_lowercase();
    let features = serde_json::to_string(&input.features)?;
    conn.execute(
        "INSERT INTO service_packages
            (id, service_id, name_en, name_ar, description_en, description_ar, price_cents,
             currency, features, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            &id,
            &input.service_id,
            input.name_en.trim(),
            &input.name_ar,
            &input.description_en,
            &input.description_ar,
            input.price_cents,
            &currency,
            &features,
            input.is_active,
            now
        ],
    )?;
    Ok(ServicePackage {
        id,
        service_id: input.service_id.clone(),
        name_en: input.name_en.trim().to_string(),
        name_ar: input.name_ar.clone(),
        description_en: input.description_en.clone(),
        description_ar: input.description_ar.clone(),
        price_cents: input.price_cents,
        currency,
        features: input.features.clone(),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_package(conn: &Connection, id: &str) -> Result<Option<ServicePackage>> {
    query_one(
        conn,
        &format!("SELECT {} FROM service_packages WHERE id = ?1", PACKAGE_COLS),
        &[&id],
    )
}

pub fn list_packages(
    conn: &Connection,
    service_id: Option<&str>,
    active_only: bool,
) -> Result<Vec<ServicePackage>> {
    let mut conditions = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(service_id) = service_id {
        conditions.push("service_id = ?");
        values.push(service_id.to_string().into());
    }
    if active_only {
        conditions.push("is_active = 1");
    }
    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM service_packages {} ORDER BY price_cents",
        PACKAGE_COLS, filter
    ))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |row| {
            <ServicePackage as super::from_row::FromRow>::from_row(row)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_package(
    conn: &Connection,
    id: &str,
    input: &UpdateServicePackage,
) -> Result<Option<ServicePackage>> {
    let features = input
        .features
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    UpdateBuilder::new("service_packages", id)
        .with_updated_at()
        .set_opt("name_en", input.name_en.as_ref().map(|n| n.trim().to_string()))
        .set_opt("name_ar", input.name_ar.clone())
        .set_opt("description_en", input.description_en.clone())
        .set_opt("description_ar", input.description_ar.clone())
        .set_opt("price_cents", input.price_cents)
        .set_opt("currency", input.currency.as_ref().map(|c| c.to_lowercase()))
        .set_opt("features", features)
        .set_opt("is_active", input.is_active)
        .execute(conn)?;
    get_package(conn, id)
}

pub fn delete_package(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM service_packages WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

// ============ Appointments ============

pub fn create_appointment(
    conn: &Connection,
    user_id: &str,
    input: &CreateAppointment,
) -> Result<Appointment> {
    let id = gen_id();
    let now = now();
    let email = normalize_email(&input.client_email);
    conn.execute(
        "INSERT INTO appointments
            (id, user_id, service_id, client_name, client_email, client_phone, appointment_date,
             appointment_time, status, notes, progress, project_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, 0, 'not_started', ?10, ?10)",
        params![
            &id,
            user_id,
            &input.service_id,
            input.client_name.trim(),
            &email,
            &input.client_phone,
            input.appointment_date.trim(),
            input.appointment_time.trim(),
            &input.notes,
            now
        ],
    )?;
    Ok(Appointment {
        id,
        user_id: user_id.to_string(),
        service_id: input.service_id.clone(),
        client_name: input.client_name.trim().to_string(),
        client_email: email,
        client_phone: input.client_phone.clone(),
        appointment_date: input.appointment_date.trim().to_string(),
        appointment_time: input.appointment_time.trim().to_string(),
        status: AppointmentStatus::Pending,
        notes: input.notes.clone(),
        progress: 0,
        project_status: ProjectStatus::NotStarted,
        reminder_sent_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_appointment(conn: &Connection, id: &str) -> Result<Option<Appointment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLS),
        &[&id],
    )
}

pub fn list_appointments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Appointment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM appointments WHERE user_id = ?1
             ORDER BY appointment_date DESC, appointment_time DESC",
            APPOINTMENT_COLS
        ),
        &[&user_id],
    )
}

pub fn list_appointments_paginated(
    conn: &Connection,
    filter: &AppointmentFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Appointment>, i64)> {
    let status = filter.status.map(|s| s.as_ref().to_string());
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE ?1 IS NULL OR status = ?1",
        params![&status],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM appointments WHERE ?1 IS NULL OR status = ?1
             ORDER BY appointment_date DESC, appointment_time DESC LIMIT ?2 OFFSET ?3",
            APPOINTMENT_COLS
        ),
        &[&status, &limit, &offset],
    )?;
    Ok((items, total))
}

pub fn update_appointment(
    conn: &Connection,
    id: &str,
    input: &UpdateAppointment,
) -> Result<Option<Appointment>> {
    let mut builder = UpdateBuilder::new("appointments", id)
        .with_updated_at()
        .set_opt("status", input.status.map(enum_value))
        .set_opt("appointment_date", input.appointment_date.as_ref().map(|d| d.trim().to_string()))
        .set_opt("appointment_time", input.appointment_time.as_ref().map(|t| t.trim().to_string()))
        .set_opt("notes", input.notes.clone())
        .set_opt("progress", input.progress)
        .set_opt("project_status", input.project_status.map(enum_value));
    if input.reschedules() {
        builder = builder.set("reminder_sent_at", Value::Null);
    }
    builder.execute(conn)?;
    get_appointment(conn, id)
}

pub fn set_appointment_status(conn: &Connection, id: &str, status: AppointmentStatus) -> Result<bool> {
    UpdateBuilder::new("appointments", id)
        .with_updated_at()
        .set("status", enum_value(status))
        .execute(conn)
}

/// Pending or confirmed bookings starting within `horizon_secs` of `now` that
/// have not been reminded yet.
pub fn list_due_reminders(conn: &Connection, now: i64, horizon_secs: i64) -> Result<Vec<Appointment>> {
    let from = chrono::DateTime::from_timestamp(now, 0).unwrap_or_default();
    let to = from + Duration::seconds(horizon_secs);
    let candidates: Vec<Appointment> = query_all(
        conn,
        &format!(
            "SELECT {} FROM appointments
             WHERE status IN ('pending', 'confirmed') AND reminder_sent_at IS NULL
               AND appointment_date BETWEEN ?1 AND ?2",
            APPOINTMENT_COLS
        ),
        &[
            &from.format("%Y-%m-%d").to_string(),
            &to.format("%Y-%m-%d").to_string(),
        ],
    )?;
    let end = now + horizon_secs;
    Ok(candidates
        .into_iter()
        .filter(|a| a.starts_at().is_some_and(|start| start >= now && start <= end))
        .collect())
}

pub fn mark_reminder_sent(conn: &Connection, id: &str) -> Result<bool> {
    UpdateBuilder::new("appointments", id)
        .set("reminder_sent_at", now())
        .execute(conn)
}

// ============ Orders ============

pub fn create_order(conn: &Connection, user_id: &str, package: &ServicePackage) -> Result<Order> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO orders (id, user_id, package_id, amount_cents, currency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
        params![&id, user_id, &package.id, package.price_cents, &package.currency, now],
    )?;
    Ok(Order {
        id,
        user_id: user_id.to_string(),
        package_id: Some(package.id.clone()),
        amount_cents: package.price_cents,
        currency: package.currency.clone(),
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_order(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn list_orders_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        &[&user_id],
    )
}

pub fn set_order_status(conn: &Connection, id: &str, status: OrderStatus) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .with_updated_at()
        .set("status", enum_value(status))
        .execute(conn)
}

// ============ Tickets ============

pub fn create_ticket(conn: &Connection, user_id: &str, input: &CreateTicket) -> Result<Ticket> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO tickets (id, user_id, subject, description, priority, status, service_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?7, ?7)",
        params![
            &id,
            user_id,
            input.subject.trim(),
            input.description.trim(),
            input.priority.as_ref(),
            &input.service_id,
            now
        ],
    )?;
    Ok(Ticket {
        id,
        user_id: user_id.to_string(),
        subject: input.subject.trim().to_string(),
        description: input.description.trim().to_string(),
        priority: input.priority,
        status: TicketStatus::Open,
        service_id: input.service_id.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_ticket(conn: &Connection, id: &str) -> Result<Option<Ticket>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLS),
        &[&id],
    )
}

pub fn list_tickets_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Ticket>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tickets WHERE user_id = ?1 ORDER BY updated_at DESC",
            TICKET_COLS
        ),
        &[&user_id],
    )
}

pub fn list_tickets_paginated(
    conn: &Connection,
    filter: &TicketFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Ticket>, i64)> {
    let status = filter.status.map(|s| s.as_ref().to_string());
    let priority = filter.priority.map(|p| p.as_ref().to_string());
    let conditions = "(?1 IS NULL OR status = ?1) AND (?2 IS NULL OR priority = ?2)";
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tickets WHERE {}", conditions),
        params![&status, &priority],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM tickets WHERE {} ORDER BY updated_at DESC LIMIT ?3 OFFSET ?4",
            TICKET_COLS, conditions
        ),
        &[&status, &priority, &limit, &offset],
    )?;
    Ok((items, total))
}

pub fn update_ticket(conn: &Connection, id: &str, input: &UpdateTicket) -> Result<Option<Ticket>> {
    UpdateBuilder::new("tickets", id)
        .with_updated_at()
        .set_opt("status", input.status.map(enum_value))
        .set_opt("priority", input.priority.map(enum_value))
        .execute(conn)?;
    get_ticket(conn, id)
}

pub fn create_ticket_reply(
    conn: &Connection,
    ticket_id: &str,
    author_id: &str,
    message: &str,
    is_staff: bool,
) -> Result<TicketReply> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO ticket_replies (id, ticket_id, author_id, message, is_staff, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, ticket_id, author_id, message.trim(), is_staff, now],
    )?;
    conn.execute(
        "UPDATE tickets SET updated_at = ?1 WHERE id = ?2",
        params![now, ticket_id],
    )?;
    Ok(TicketReply {
        id,
        ticket_id: ticket_id.to_string(),
        author_id: author_id.to_string(),
        message: message.trim().to_string(),
        is_staff,
        created_at: now,
    })
}

pub fn list_ticket_replies(conn: &Connection, ticket_id: &str) -> Result<Vec<TicketReply>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM ticket_replies WHERE ticket_id = ?1 ORDER BY created_at, rowid",
            TICKET_REPLY_COLS
        ),
        &[&ticket_id],
    )
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO payments
            (id, user_id, appointment_id, order_id, amount_cents, currency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
        params![
            &id,
            &input.user_id,
            &input.appointment_id,
            &input.order_id,
            input.amount_cents,
            &input.currency,
            now
        ],
    )?;
    Ok(Payment {
        id,
        user_id: input.user_id.clone(),
        appointment_id: input.appointment_id.clone(),
        order_id: input.order_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        status: PaymentStatus::Pending,
        stripe_session_id: None,
        stripe_payment_intent: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

pub fn get_payment_by_session(conn: &Connection, session_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE stripe_session_id = ?1", PAYMENT_COLS),
        &[&session_id],
    )
}

pub fn set_payment_session(conn: &Connection, id: &str, session_id: &str) -> Result<bool> {
    UpdateBuilder::new("payments", id)
        .with_updated_at()
        .set("stripe_session_id", session_id.to_string())
        .execute(conn)
}

/// Mark the payment for a checkout session completed.
///
/// A `failed` payment can still complete: the checkout session stays open
/// after a declined card and the client may retry. Returns the payment only
/// when this call changed it, so a redelivered event does not repeat side
/// effects.
pub fn complete_payment_by_session(
    conn: &Connection,
    session_id: &str,
    payment_intent: Option<&str>,
) -> Result<Option<Payment>> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'completed', stripe_payment_intent = COALESCE(?1, stripe_payment_intent),
             updated_at = ?2
         WHERE stripe_session_id = ?3 AND status IN ('pending', 'failed')",
        params![payment_intent, now(), session_id],
    )?;
    if affected == 0 {
        return Ok(None);
    }
    get_payment_by_session(conn, session_id)
}

/// Mark payments for a failed intent as failed, returning those that changed.
pub fn fail_payments_by_intent(conn: &Connection, payment_intent: &str) -> Result<Vec<Payment>> {
    let now = now();
    let ids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM payments WHERE stripe_payment_intent = ?1 AND status = 'pending'",
        )?;
        stmt.query_map(params![payment_intent], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    let mut failed = Vec::with_capacity(ids.len());
    for id in ids {
        conn.execute(
            "UPDATE payments SET status = 'failed', updated_at = ?1 WHERE id = ?2",
            params![now, &id],
        )?;
        if let Some(payment) = get_payment(conn, &id)? {
            failed.push(payment);
        }
    }
    Ok(failed)
}

pub fn set_payment_intent(conn: &Connection, id: &str, payment_intent: &str) -> Result<bool> {
    UpdateBuilder::new("payments", id)
        .with_updated_at()
        .set("stripe_payment_intent", payment_intent.to_string())
        .execute(conn)
}

pub fn list_payments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC",
            PAYMENT_COLS
        ),
        &[&user_id],
    )
}

pub fn list_payments_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Payment>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM payments ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            PAYMENT_COLS
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Subscriptions ============

pub fn upsert_subscription(conn: &Connection, input: &UpsertSubscription) -> Result<()> {
    let now = now();
    conn.execute(
        "INSERT INTO subscriptions
            (id, user_id, status, price_id, current_period_end, cancel_at_period_end, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            price_id = excluded.price_id,
            current_period_end = excluded.current_period_end,
            cancel_at_period_end = excluded.cancel_at_period_end,
            updated_at = excluded.updated_at",
        params![
            &input.id,
            &input.user_id,
            &input.status,
            &input.price_id,
            input.current_period_end,
            input.cancel_at_period_end,
            now
        ],
    )?;
    Ok(())
}

pub fn list_subscriptions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Subscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 ORDER BY created_at DESC",
            SUBSCRIPTION_COLS
        ),
        &[&user_id],
    )
}

pub fn get_subscription(conn: &Connection, id: &str) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", SUBSCRIPTION_COLS),
        &[&id],
    )
}

// ============ Notifications ============

pub fn create_notification(
    conn: &Connection,
    user_id: &str,
    input: &NewNotification,
) -> Result<Notification> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, message, read, link, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        params![&id, user_id, &input.title, &input.message, &input.link, now],
    )?;
    Ok(Notification {
        id,
        user_id: user_id.to_string(),
        title: input.title.clone(),
        message: input.message.clone(),
        read: false,
        link: input.link.clone(),
        created_at: now,
    })
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    unread_only: bool,
) -> Result<Vec<Notification>> {
    let filter = if unread_only { "AND read = 0" } else { "" };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 {} ORDER BY created_at DESC, rowid DESC",
            NOTIFICATION_COLS, filter
        ),
        &[&user_id],
    )
}

pub fn mark_notification_read(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(affected > 0)
}

pub fn mark_all_notifications_read(conn: &Connection, user_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        params![user_id],
    )?;
    Ok(affected)
}

// ============ Site Settings ============

pub fn list_site_settings(conn: &Connection) -> Result<Vec<SiteSetting>> {
    query_all(
        conn,
        &format!("SELECT {} FROM site_settings ORDER BY key", SITE_SETTING_COLS),
        &[],
    )
}

pub fn upsert_site_setting(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
    updated_by: &str,
) -> Result<SiteSetting> {
    let now = now();
    conn.execute(
        "INSERT INTO site_settings (key, value, updated_by, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value, updated_by = excluded.updated_by, updated_at = excluded.updated_at",
        params![key, serde_json::to_string(value)?, updated_by, now],
    )?;
    Ok(SiteSetting {
        key: key.to_string(),
        value: value.clone(),
        updated_at: now,
    })
}

// ============ Webhook Event Deduplication ============

/// Atomically record a webhook event, returning true if this is a new event.
/// Returns false if the event was already processed.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, provider, event_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![gen_id(), provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge webhook events beyond the retention period. Stripe retries for about three days.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
