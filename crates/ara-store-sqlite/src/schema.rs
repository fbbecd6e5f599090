//! SQL schema for the Ara SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS audits (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    edit_unique_id        TEXT NOT NULL UNIQUE,
    consult_unique_id     TEXT NOT NULL UNIQUE,
    audit_type            TEXT NOT NULL,   -- 'FAST' | 'COMPLEMENTARY' | 'FULL'
    procedure_name        TEXT NOT NULL,
    procedure_url         TEXT,
    initiator             TEXT,
    auditor_name          TEXT,
    auditor_email         TEXT,
    auditor_organisation  TEXT,
    contact_name          TEXT,
    contact_email         TEXT,
    contact_form_url      TEXT,
    technologies          TEXT NOT NULL DEFAULT '[]',
    not_compliant_content TEXT,
    derogated_content     TEXT,
    not_in_scope_content  TEXT,
    notes                 TEXT,
    created_at            TEXT NOT NULL,   -- RFC 3339 UTC
    published_at          TEXT,
    edited_at             TEXT
);

-- Outlives its audit: no foreign key, never deleted.
CREATE TABLE IF NOT EXISTS audit_traces (
    edit_unique_id    TEXT PRIMARY KEY,
    consult_unique_id TEXT NOT NULL UNIQUE,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recipients (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    name     TEXT NOT NULL,
    email    TEXT NOT NULL,
    UNIQUE (email, audit_id)
);

CREATE TABLE IF NOT EXISTS tools (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    name     TEXT NOT NULL,
    function TEXT NOT NULL DEFAULT '',
    url      TEXT NOT NULL DEFAULT '',
    UNIQUE (name, url, audit_id)
);

CREATE TABLE IF NOT EXISTS test_environments (
    id                           INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id                     INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    platform                     TEXT NOT NULL,
    operating_system             TEXT NOT NULL,
    operating_system_version     TEXT NOT NULL DEFAULT '',
    assistive_technology         TEXT NOT NULL,
    assistive_technology_version TEXT NOT NULL DEFAULT '',
    browser                      TEXT NOT NULL,
    browser_version              TEXT NOT NULL DEFAULT '',
    UNIQUE (platform, operating_system, assistive_technology, browser, audit_id)
);

CREATE TABLE IF NOT EXISTS audited_pages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id      INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    position      INTEGER NOT NULL,
    name          TEXT NOT NULL,
    url           TEXT NOT NULL,
    is_transverse INTEGER NOT NULL DEFAULT 0
);

-- Exactly one transverse page per audit.
CREATE UNIQUE INDEX IF NOT EXISTS audited_pages_transverse_idx
    ON audited_pages(audit_id) WHERE is_transverse = 1;

CREATE TABLE IF NOT EXISTS criterion_results (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id                INTEGER NOT NULL REFERENCES audited_pages(id) ON DELETE CASCADE,
    topic                  INTEGER NOT NULL,
    criterion              INTEGER NOT NULL,
    status                 TEXT NOT NULL DEFAULT 'NOT_TESTED',
    compliant_comment      TEXT,
    not_compliant_comment  TEXT,
    not_applicable_comment TEXT,
    user_impact            TEXT,             -- 'MINOR' | 'MAJOR' | 'BLOCKING'
    quick_win              INTEGER NOT NULL DEFAULT 0,
    UNIQUE (page_id, topic, criterion)
);

-- Blob bytes live in the object store; this is metadata only.
CREATE TABLE IF NOT EXISTS example_images (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id         INTEGER NOT NULL REFERENCES criterion_results(id) ON DELETE CASCADE,
    storage_key       TEXT NOT NULL UNIQUE,
    original_filename TEXT NOT NULL,
    mime_type         TEXT NOT NULL,
    size              INTEGER NOT NULL,
    content_hash      TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS recipients_audit_idx   ON recipients(audit_id);
CREATE INDEX IF NOT EXISTS tools_audit_idx        ON tools(audit_id);
CREATE INDEX IF NOT EXISTS environments_audit_idx ON test_environments(audit_id);
CREATE INDEX IF NOT EXISTS pages_audit_idx        ON audited_pages(audit_id);
CREATE INDEX IF NOT EXISTS images_result_idx      ON example_images(result_id);

PRAGMA user_version = 1;
";
