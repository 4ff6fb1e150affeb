use rusqlite::Connection;

/// Per-connection settings. Foreign keys are off by default in SQLite.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        "#,
    )
}

/// Initialize the database schema.
///
/// Every table that references a user carries `ON DELETE CASCADE` (or `SET NULL`
/// for non-owning references); user deletion additionally removes dependent rows
/// explicitly inside one transaction.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    configure_connection(conn)?;
    conn.execute_batch(
        r#"
        -- Auth identities
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            email_confirmed_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            full_name TEXT NOT NULL,
            phone TEXT,
            stripe_customer_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_stripe_customer ON profiles(stripe_customer_id);

        -- One role per user
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('admin', 'client'))
        );

        -- Workspaces (organization id = owner's user id)
        CREATE TABLE IF NOT EXISTS workspaces (
            owner_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Team members (invited participants)
        -- invite_token_hash: SHA-256 of the live token, cleared on acceptance/revocation
        -- consumed_token_hash: hash of the accepted token, lets replays resolve idempotently
        CREATE TABLE IF NOT EXISTS team_members (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES workspaces(owner_id) ON DELETE CASCADE,
            user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('Admin', 'Member', 'Viewer')),
            status TEXT NOT NULL CHECK (status IN ('pending', 'active', 'inactive')),
            invite_token_hash TEXT UNIQUE,
            consumed_token_hash TEXT,
            invite_expires_at INTEGER,
            invited_by TEXT REFERENCES users(id) ON DELETE CASCADE,
            activated_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_team_members_org ON team_members(organization_id);
        CREATE INDEX IF NOT EXISTS idx_team_members_org_email ON team_members(organization_id, email);
        CREATE INDEX IF NOT EXISTS idx_team_members_user ON team_members(user_id);
        CREATE INDEX IF NOT EXISTS idx_team_members_consumed ON team_members(consumed_token_hash);

        -- Role permission sets, per organization
        CREATE TABLE IF NOT EXISTS workspace_permissions (
            organization_id TEXT NOT NULL REFERENCES workspaces(owner_id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('Admin', 'Member', 'Viewer')),
            manage_team INTEGER NOT NULL DEFAULT 0,
            access_settings INTEGER NOT NULL DEFAULT 0,
            delete_items INTEGER NOT NULL DEFAULT 0,
            create_items INTEGER NOT NULL DEFAULT 0,
            view_analytics INTEGER NOT NULL DEFAULT 0,
            access_advanced_tools INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (organization_id, role)
        );

        -- Catalog
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            description_en TEXT,
            description_ar TEXT,
            icon TEXT NOT NULL DEFAULT 'Folder',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS services (
            id TEXT PRIMARY KEY,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            description_en TEXT,
            description_ar TEXT,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            currency TEXT NOT NULL DEFAULT 'usd',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_services_category ON services(category_id);

        CREATE TABLE IF NOT EXISTS service_packages (
            id TEXT PRIMARY KEY,
            service_id TEXT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            description_en TEXT,
            description_ar TEXT,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            currency TEXT NOT NULL DEFAULT 'usd',
            features TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_packages_service ON service_packages(service_id);

        -- Bookings
        CREATE TABLE IF NOT EXISTS appointments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            service_id TEXT REFERENCES services(id) ON DELETE SET NULL,
            client_name TEXT NOT NULL,
            client_email TEXT NOT NULL,
            client_phone TEXT,
            appointment_date TEXT NOT NULL,
            appointment_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
            notes TEXT,
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            project_status TEXT NOT NULL DEFAULT 'not_started'
                CHECK (project_status IN ('not_started', 'in_progress', 'review', 'completed', 'on_hold')),
            reminder_sent_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_appointments_user ON appointments(user_id);
        CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date);

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            package_id TEXT REFERENCES service_packages(id) ON DELETE SET NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'paid', 'cancelled', 'failed')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);

        -- Support
        CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            subject TEXT NOT NULL,
            description TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium'
                CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
            status TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'in_progress', 'resolved', 'closed')),
            service_id TEXT REFERENCES services(id) ON DELETE SET NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tickets_user ON tickets(user_id);

        CREATE TABLE IF NOT EXISTS ticket_replies (
            id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            is_staff INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ticket_replies_ticket ON ticket_replies(ticket_id);
        CREATE INDEX IF NOT EXISTS idx_ticket_replies_author ON ticket_replies(author_id);

        -- Payments
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            appointment_id TEXT REFERENCES appointments(id) ON DELETE SET NULL,
            order_id TEXT REFERENCES orders(id) ON DELETE SET NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'failed', 'refunded')),
            stripe_session_id TEXT UNIQUE,
            stripe_payment_intent TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
        CREATE INDEX IF NOT EXISTS idx_payments_intent ON payments(stripe_payment_intent);

        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            price_id TEXT,
            current_period_end INTEGER,
            cancel_at_period_end INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);

        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            link TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, read);

        CREATE TABLE IF NOT EXISTS site_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            updated_at INTEGER NOT NULL
        );

        -- Processed webhook events (replay prevention)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(provider, event_id)
        );
        "#,
    )?;
    Ok(())
}
