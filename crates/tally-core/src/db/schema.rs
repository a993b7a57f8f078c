//! Canonical SQLite schema for tally.
//!
//! - `projects` is the read-only project directory the engine validates against
//! - `change_orders` holds CO status, locked/current amounts, and a write `version`
//! - `tickets` holds T&M tickets; `co_id` is the single CO membership link
//! - `tally_meta` records the applied schema version
//!
//! Money columns are decimal text so no precision is lost to floating point.
//! Timestamps are microseconds since the Unix epoch.

/// Migration v1: tables, read-path indexes, and metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    project_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE CHECK (length(trim(code)) > 0),
    name TEXT NOT NULL,
    budget TEXT NOT NULL DEFAULT '0',
    is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS change_orders (
    co_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(project_id),
    number INTEGER NOT NULL CHECK (number > 0),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'submitted', 'approved', 'rejected')),
    original_amount TEXT NOT NULL DEFAULT '0',
    current_amount TEXT NOT NULL DEFAULT '0',
    submitted_at_us INTEGER,
    approved_at_us INTEGER,
    approved_by TEXT,
    rejected_at_us INTEGER,
    rejected_by TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (project_id, number),
    CHECK (status = 'draft' OR submitted_at_us IS NOT NULL),
    CHECK (status <> 'approved' OR (approved_by IS NOT NULL AND length(trim(approved_by)) > 0)),
    CHECK (status <> 'rejected' OR (rejected_by IS NOT NULL AND length(trim(rejected_by)) > 0))
);

CREATE TABLE IF NOT EXISTS tickets (
    ticket_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(project_id),
    co_id INTEGER REFERENCES change_orders(co_id) ON DELETE SET NULL,
    status TEXT NOT NULL DEFAULT 'pending_review'
        CHECK (status IN ('draft', 'pending_review', 'approved', 'rejected', 'billed', 'paid')),
    work_date TEXT,
    description TEXT,
    location TEXT,
    cost_code TEXT,
    labor_total TEXT NOT NULL DEFAULT '0',
    materials_total TEXT NOT NULL DEFAULT '0',
    total_amount TEXT NOT NULL DEFAULT '0',
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tally_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tickets_co
    ON tickets(co_id);

CREATE INDEX IF NOT EXISTS idx_tickets_project_status
    ON tickets(project_id, status, created_at_us);

CREATE INDEX IF NOT EXISTS idx_tickets_unassigned
    ON tickets(project_id) WHERE co_id IS NULL;

CREATE INDEX IF NOT EXISTS idx_change_orders_project_status
    ON change_orders(project_id, status);

INSERT OR IGNORE INTO tally_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
";

/// Indexes expected by list/filter/report query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tickets_co",
    "idx_tickets_project_status",
    "idx_tickets_unassigned",
    "idx_change_orders_project_status",
];
