//! PostgreSQL schema.
//!
//! Statements are idempotent and applied in order by
//! [`Database::migrate`](super::Database::migrate).

/// Schema statements, applied in order
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id            BIGSERIAL PRIMARY KEY,
        display_name  TEXT        NOT NULL,
        discriminator TEXT        NOT NULL,
        password_hash TEXT        NOT NULL,
        is_admin      BOOLEAN     NOT NULL DEFAULT FALSE,
        is_bootstrap  BOOLEAN     NOT NULL DEFAULT FALSE,
        avatar        TEXT        NOT NULL,
        banner        TEXT        NOT NULL,
        biography     TEXT        NOT NULL,
        theme         TEXT        NOT NULL,
        locale        TEXT        NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT accounts_identity_unique UNIQUE (display_name, discriminator),
        CONSTRAINT accounts_discriminator_format
            CHECK (discriminator ~ '^[0-9]{4}$' AND discriminator <> '0000')
    )
    "#,
    // At most one row may ever carry the first-account grant
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS accounts_single_bootstrap
        ON accounts (is_bootstrap) WHERE is_bootstrap
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invites (
        id         BIGSERIAL PRIMARY KEY,
        code       TEXT        NOT NULL UNIQUE,
        used       BOOLEAN     NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        used_at    TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token         TEXT PRIMARY KEY,
        account_id    BIGINT      NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        display_name  TEXT        NOT NULL,
        discriminator TEXT        NOT NULL,
        is_admin      BOOLEAN     NOT NULL,
        locale        TEXT        NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL,
        expires_at    TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sessions_expires_at ON sessions (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id         BIGSERIAL PRIMARY KEY,
        account_id BIGINT      NOT NULL REFERENCES accounts (id) ON DELETE CASCADE ON UPDATE CASCADE,
        title      TEXT        NOT NULL,
        filename   TEXT        NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_account_id ON posts (account_id)",
];
