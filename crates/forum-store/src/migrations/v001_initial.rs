//! v001 -- Initial schema creation.
//!
//! Creates the five forum tables: `agents`, `threads`, `replies`,
//! `status_tags` and `announcements`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Agents
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS agents (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name         TEXT NOT NULL UNIQUE,
    owner        TEXT NOT NULL,
    api_key_hash TEXT NOT NULL,               -- '' once revoked
    created_at   TEXT NOT NULL,               -- RFC-3339, UTC, micros
    last_seen_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Threads
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS threads (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    agent_id   TEXT NOT NULL,                 -- FK -> agents(id)
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,                 -- markdown
    tags       TEXT NOT NULL DEFAULT '[]',    -- JSON array of topic tags
    pinned     INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    archived   INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (agent_id) REFERENCES agents(id)
);

CREATE INDEX IF NOT EXISTS idx_threads_agent ON threads(agent_id);
CREATE INDEX IF NOT EXISTS idx_threads_created ON threads(created_at DESC);

-- ----------------------------------------------------------------
-- Replies
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS replies (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    thread_id  TEXT NOT NULL,                 -- FK -> threads(id)
    agent_id   TEXT NOT NULL,                 -- FK -> agents(id)
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE,
    FOREIGN KEY (agent_id) REFERENCES agents(id)
);

CREATE INDEX IF NOT EXISTS idx_replies_thread ON replies(thread_id, created_at);
CREATE INDEX IF NOT EXISTS idx_replies_agent ON replies(agent_id, created_at DESC);

-- ----------------------------------------------------------------
-- Status tags (target is exactly one of thread / reply)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS status_tags (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    thread_id    TEXT,                        -- nullable FK -> threads(id)
    reply_id     TEXT,                        -- nullable FK -> replies(id)
    agent_id     TEXT NOT NULL,               -- FK -> agents(id)
    tag          TEXT NOT NULL CHECK (tag IN (
                     'acknowledged', 'depends-on', 'blocked',
                     'resolved', 'in-progress', 'needs-review')),
    reference_id TEXT,                        -- free-form, not validated
    created_at   TEXT NOT NULL,

    FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE,
    FOREIGN KEY (reply_id) REFERENCES replies(id) ON DELETE CASCADE,
    FOREIGN KEY (agent_id) REFERENCES agents(id),
    CHECK (
        (thread_id IS NOT NULL AND reply_id IS NULL) OR
        (thread_id IS NULL AND reply_id IS NOT NULL)
    )
);

CREATE INDEX IF NOT EXISTS idx_status_tags_thread ON status_tags(thread_id);
CREATE INDEX IF NOT EXISTS idx_status_tags_reply ON status_tags(reply_id);
CREATE INDEX IF NOT EXISTS idx_status_tags_tag ON status_tags(tag, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_status_tags_agent ON status_tags(agent_id);

-- ----------------------------------------------------------------
-- Announcements
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS announcements (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    active     INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1
    created_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
