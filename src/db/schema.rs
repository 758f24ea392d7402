use rusqlite::Connection;

/// Initialize the database schema.
///
/// Statuses are TEXT with CHECK constraints so a corrupted write fails at
/// the database rather than surfacing as a bad enum parse later.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity - written by the external login flow)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Bearer sessions (written by the external login flow)
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        -- Creators (payees; per-creator webhook secret and revenue aggregate)
        CREATE TABLE IF NOT EXISTS creators (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            display_name TEXT NOT NULL,
            webhook_secret TEXT,
            total_earnings INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        -- Payments (the ledger the reconciliation subsystem owns)
        -- gateway_order_id uniqueness is what makes concurrent order
        -- creation safe: a duplicate insert fails instead of forking rows.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            creator_id TEXT NOT NULL REFERENCES creators(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            currency TEXT NOT NULL CHECK (length(currency) = 3),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'failed', 'refunded')),
            is_monthly INTEGER NOT NULL DEFAULT 0,
            tier_id TEXT,
            message TEXT,
            gateway_order_id TEXT NOT NULL UNIQUE,
            gateway_payment_id TEXT,
            gateway_signature TEXT,
            created_at INTEGER NOT NULL,
            completed_at INTEGER,
            refunded_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_payments_order ON payments(gateway_order_id);
        CREATE INDEX IF NOT EXISTS idx_payments_creator ON payments(creator_id);
        CREATE INDEX IF NOT EXISTS idx_payments_pending
            ON payments(id) WHERE status = 'pending';

        -- Supporters (memberships; written here, read by the dashboard)
        CREATE TABLE IF NOT EXISTS supporters (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            creator_id TEXT NOT NULL REFERENCES creators(id),
            tier_id TEXT,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'cancelled')),
            total_contributed INTEGER NOT NULL DEFAULT 0,
            last_payment_at INTEGER,
            next_billing_date INTEGER,
            created_at INTEGER NOT NULL,

            UNIQUE(user_id, creator_id)
        );
        CREATE INDEX IF NOT EXISTS idx_supporters_creator ON supporters(creator_id);

        -- Notifications (append-only)
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            data TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        "#,
    )
}
