//! SQL schema for the sift SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS interests (
    id            TEXT PRIMARY KEY,
    group_id      TEXT NOT NULL,
    user_id       TEXT NOT NULL,
    descr         TEXT NOT NULL DEFAULT '',
    enabled       INTEGER NOT NULL,
    enabled_since TEXT,              -- RFC 3339 UTC or NULL
    expires       TEXT,              -- RFC 3339 UTC or NULL
    created       TEXT NOT NULL,
    updated       TEXT NOT NULL,
    result        TEXT,
    public        INTEGER NOT NULL DEFAULT 0,
    followers     INTEGER NOT NULL DEFAULT 0 CHECK (followers >= 0),
    rate_limit    INTEGER NOT NULL DEFAULT 0,
    cond          TEXT NOT NULL,     -- condition document; never updated
    cond_ids      TEXT NOT NULL      -- JSON array of leaf ids; never updated
);

-- Multi-key index over cond_ids: one row per (leaf id, interest).
CREATE TABLE IF NOT EXISTS interest_conds (
    cond_id     TEXT NOT NULL,
    interest_id TEXT NOT NULL REFERENCES interests(id) ON DELETE CASCADE,
    PRIMARY KEY (cond_id, interest_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS interests_owner_idx     ON interests(group_id, user_id, id);
CREATE INDEX IF NOT EXISTS interests_followers_idx ON interests(followers, id);
CREATE INDEX IF NOT EXISTS interests_lifecycle_idx ON interests(enabled, expires);
CREATE INDEX IF NOT EXISTS interest_conds_interest ON interest_conds(interest_id);

PRAGMA user_version = 1;
";
