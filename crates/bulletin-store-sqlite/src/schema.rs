//! SQL schema for the Bulletin SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Rows are never deleted; unsubscribing only clears `active`.
CREATE TABLE IF NOT EXISTS subscribers (
    id                 TEXT PRIMARY KEY,
    email              TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name               TEXT,
    active             INTEGER NOT NULL DEFAULT 1,
    confirmed          INTEGER NOT NULL DEFAULT 0,
    confirmation_token TEXT NOT NULL UNIQUE,
    confirmed_at       TEXT,            -- ISO 8601 UTC; set once
    unsubscribe_token  TEXT NOT NULL UNIQUE,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS subscribers_eligible_idx
    ON subscribers(active, confirmed);

PRAGMA user_version = 1;
";
