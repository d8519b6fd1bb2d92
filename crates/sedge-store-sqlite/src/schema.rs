//! SQL schema for the Sedge SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    entity_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    canonical_token TEXT NOT NULL UNIQUE,  -- uuid4 hex; generated once, never recomputed
    cik             TEXT,                  -- legacy convenience; never used for resolution
    created_at      TEXT NOT NULL          -- ISO 8601 UTC
);

-- The sole identity-resolution mechanism. Rows are never mutated; a
-- conflicting claim for (scheme, value) is a hard error upstream.
CREATE TABLE IF NOT EXISTS entity_identifiers (
    identifier_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id     INTEGER NOT NULL REFERENCES entities(entity_id),
    scheme        TEXT NOT NULL,
    value         TEXT NOT NULL,           -- normalized by sedge-core before it gets here
    country       TEXT,
    issuer        TEXT,
    added_at      TEXT NOT NULL,
    UNIQUE (scheme, value)
);

-- One descriptive record per entity, stored as a JSON document. Merging is
-- fill-only-if-empty on the typed struct, not SQL-level.
CREATE TABLE IF NOT EXISTS entity_metadata (
    entity_id  INTEGER PRIMARY KEY REFERENCES entities(entity_id),
    doc_json   TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metric_names (
    metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL,
    source    TEXT NOT NULL,
    unit      TEXT,
    added_at  TEXT NOT NULL,
    UNIQUE (name, source)
);

CREATE TABLE IF NOT EXISTS dates (
    date_id INTEGER PRIMARY KEY AUTOINCREMENT,
    date    TEXT NOT NULL UNIQUE           -- YYYY-MM-DD
);

-- Facts are append-only observations. No UPDATE or DELETE is ever issued
-- against this table; duplicates are absorbed by INSERT OR IGNORE.
CREATE TABLE IF NOT EXISTS fact_values (
    fact_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id  INTEGER NOT NULL REFERENCES entities(entity_id),
    date_id    INTEGER NOT NULL REFERENCES dates(date_id),
    metric_id  INTEGER NOT NULL REFERENCES metric_names(metric_id),
    value_text TEXT NOT NULL,
    UNIQUE (entity_id, date_id, metric_id)
);

CREATE TABLE IF NOT EXISTS processed_files (
    processed_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id      INTEGER NOT NULL REFERENCES entities(entity_id),
    source_file    TEXT NOT NULL,
    content_sha256 TEXT,                   -- recorded for drift diagnosis; not part of the key
    processed_at   TEXT NOT NULL,
    UNIQUE (entity_id, source_file)
);

CREATE INDEX IF NOT EXISTS fact_values_entity_idx        ON fact_values(entity_id);
CREATE INDEX IF NOT EXISTS fact_values_metric_idx        ON fact_values(metric_id);
CREATE INDEX IF NOT EXISTS entity_identifiers_scheme_idx ON entity_identifiers(scheme);

PRAGMA user_version = 1;
";
