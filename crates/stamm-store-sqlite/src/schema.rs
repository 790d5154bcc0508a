//! SQL schema for the Stamm SQLite store.
//!
//! Executed once at connection startup. Dates are stored as zero-padded
//! `YYYY-MM-DD` text so that string order is chronological order.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Fixed vocabulary, seeded at startup.
CREATE TABLE IF NOT EXISTS event_type (
    id         INTEGER PRIMARY KEY,
    code       TEXT NOT NULL UNIQUE,
    label      TEXT NOT NULL,
    sort_order INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS person (
    id           INTEGER PRIMARY KEY,
    xref         TEXT NOT NULL UNIQUE,
    given_name   TEXT,
    family_name  TEXT,
    maiden_name  TEXT,
    sex          TEXT NOT NULL DEFAULT 'unknown',
    needs_review INTEGER NOT NULL DEFAULT 0,
    notes        TEXT,
    biography    TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS family (
    id         INTEGER PRIMARY KEY,
    xref       TEXT NOT NULL UNIQUE,
    spouse1_id INTEGER REFERENCES person(id) ON DELETE SET NULL,
    spouse2_id INTEGER REFERENCES person(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS family_child (
    family_id    INTEGER NOT NULL REFERENCES family(id) ON DELETE CASCADE,
    child_id     INTEGER NOT NULL REFERENCES person(id) ON DELETE CASCADE,
    relationship TEXT NOT NULL DEFAULT 'biological',
    PRIMARY KEY (family_id, child_id)
);

-- One row per distinct raw place text.
CREATE TABLE IF NOT EXISTS location (
    id             INTEGER PRIMARY KEY,
    raw_text       TEXT NOT NULL UNIQUE,
    normalized     TEXT NOT NULL,
    city           TEXT,
    county         TEXT,
    state          TEXT,
    country        TEXT,
    latitude       REAL,
    longitude      REAL,
    geocode_status TEXT NOT NULL DEFAULT 'pending'  -- pending | success | failed | skipped
);

CREATE TABLE IF NOT EXISTS event (
    id                INTEGER PRIMARY KEY,
    person_id         INTEGER NOT NULL REFERENCES person(id) ON DELETE CASCADE,
    family_id         INTEGER REFERENCES family(id) ON DELETE SET NULL,
    event_type_id     INTEGER NOT NULL REFERENCES event_type(id),
    location_id       INTEGER REFERENCES location(id),
    date_raw          TEXT,
    date_sort         TEXT,
    date_end          TEXT,
    date_precision    TEXT NOT NULL DEFAULT 'unknown',
    validation_status TEXT NOT NULL DEFAULT 'unvalidated',
    description       TEXT
);

-- Creation fields are never rewritten; only the resolution columns change.
CREATE TABLE IF NOT EXISTS conflict (
    id               INTEGER PRIMARY KEY,
    person_id        INTEGER NOT NULL REFERENCES person(id) ON DELETE CASCADE,
    event_id         INTEGER REFERENCES event(id) ON DELETE CASCADE,
    related_event_id INTEGER REFERENCES event(id) ON DELETE CASCADE,
    conflict_type    TEXT NOT NULL,
    severity         TEXT NOT NULL,
    description      TEXT NOT NULL,
    resolution       TEXT,
    resolved_at      TEXT,
    resolved_by      TEXT,
    notes            TEXT,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingest_run (
    run_id        TEXT PRIMARY KEY,
    source_name   TEXT NOT NULL,
    source_digest TEXT NOT NULL,
    report        TEXT NOT NULL,   -- JSON-encoded LoadReport
    loaded_at     TEXT NOT NULL
);

-- At most one row: the run currently allowed to write.
CREATE TABLE IF NOT EXISTS ingest_lock (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    run_id      TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS event_person_idx       ON event(person_id);
CREATE INDEX IF NOT EXISTS event_location_idx     ON event(location_id);
CREATE INDEX IF NOT EXISTS family_child_child_idx ON family_child(child_id);
CREATE INDEX IF NOT EXISTS conflict_person_idx    ON conflict(person_id);
CREATE INDEX IF NOT EXISTS location_status_idx    ON location(geocode_status);

PRAGMA user_version = 1;
";
