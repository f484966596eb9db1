//! Canonical SQLite schema for the issue store.
//!
//! The schema is normalized for queryability and carries the engine's two
//! idempotency guards as UNIQUE constraints:
//! - `issue_votes` is unique per (issue, user, vote type), so a concurrent
//!   duplicate cast surfaces as a constraint violation rather than a second
//!   row
//! - `user_badges` is unique per (user, badge key), so badge re-evaluation
//!   can never double-award
//!
//! Enum-valued columns are CHECK-constrained to the documented value sets.

/// Migration v1: core tables plus the uniqueness guards.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS departments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    description TEXT,
    contact_email TEXT,
    contact_phone TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    role TEXT NOT NULL DEFAULT 'citizen'
        CHECK (role IN ('citizen', 'admin', 'department_staff')),
    is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    civic_karma INTEGER NOT NULL DEFAULT 0,
    department_id INTEGER REFERENCES departments(id) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN (
        'road_maintenance', 'streetlight', 'sanitation', 'water_supply',
        'electricity', 'traffic', 'parks', 'other'
    )),
    status TEXT NOT NULL DEFAULT 'submitted' CHECK (status IN (
        'submitted', 'acknowledged', 'in_progress', 'resolved', 'closed', 'rejected'
    )),
    priority TEXT NOT NULL DEFAULT 'medium'
        CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
    latitude REAL,
    longitude REAL,
    address TEXT,
    photo_urls TEXT NOT NULL DEFAULT '[]',
    upvotes INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
    confirmations INTEGER NOT NULL DEFAULT 0 CHECK (confirmations >= 0),
    urgency_score INTEGER NOT NULL DEFAULT 0,
    reporter_id INTEGER NOT NULL REFERENCES users(id),
    assigned_to_id INTEGER REFERENCES users(id),
    department_id INTEGER REFERENCES departments(id),
    created_at_us INTEGER NOT NULL,
    acknowledged_at_us INTEGER,
    resolved_at_us INTEGER
);

CREATE TABLE IF NOT EXISTS issue_votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    vote_type TEXT NOT NULL CHECK (vote_type IN ('upvote', 'confirm')),
    created_at_us INTEGER NOT NULL,
    UNIQUE (issue_id, user_id, vote_type)
);

CREATE TABLE IF NOT EXISTS issue_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issue_updates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    status TEXT NOT NULL CHECK (status IN (
        'submitted', 'acknowledged', 'in_progress', 'resolved', 'closed', 'rejected'
    )),
    comment TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    badge_key TEXT NOT NULL CHECK (length(trim(badge_key)) > 0),
    badge_name TEXT NOT NULL,
    badge_description TEXT NOT NULL,
    earned_at_us INTEGER NOT NULL,
    UNIQUE (user_id, badge_key)
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    issue_id INTEGER REFERENCES issues(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    created_at_us INTEGER NOT NULL
);
";

/// Migration v2: read-path indexes for the queue, feed, and reader queries.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_status_created
    ON issues(status, created_at_us ASC);

CREATE INDEX IF NOT EXISTS idx_issues_category
    ON issues(category, reporter_id);

CREATE INDEX IF NOT EXISTS idx_issues_reporter_status
    ON issues(reporter_id, status);

CREATE INDEX IF NOT EXISTS idx_issues_department_status
    ON issues(department_id, status);

CREATE INDEX IF NOT EXISTS idx_issue_votes_user_type
    ON issue_votes(user_id, vote_type);

CREATE INDEX IF NOT EXISTS idx_issue_comments_issue_created
    ON issue_comments(issue_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_issue_comments_user
    ON issue_comments(user_id);

CREATE INDEX IF NOT EXISTS idx_issue_updates_issue_created
    ON issue_updates(issue_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_user_badges_user
    ON user_badges(user_id, badge_key);

CREATE INDEX IF NOT EXISTS idx_notifications_user_read
    ON notifications(user_id, is_read, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_users_role_active
    ON users(role, is_active, department_id, id);
";

/// Indexes expected by list/filter/queue query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_issues_status_created",
    "idx_issues_category",
    "idx_issues_reporter_status",
    "idx_issues_department_status",
    "idx_issue_votes_user_type",
    "idx_issue_comments_issue_created",
    "idx_issue_comments_user",
    "idx_issue_updates_issue_created",
    "idx_user_badges_user",
    "idx_notifications_user_read",
    "idx_users_role_active",
];

#[cfg(test)]
mod tests {
    use crate::store::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&mut conn)?;

        conn.execute(
            "INSERT INTO departments (name, created_at_us) VALUES ('Public Works', 0)",
            [],
        )?;

        for idx in 0..12_i64 {
            conn.execute(
                "INSERT INTO users (name, email, role, is_active, department_id, created_at_us)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)",
                params![
                    format!("user-{idx}"),
                    format!("user-{idx}@example.org"),
                    if idx % 4 == 0 { "department_staff" } else { "citizen" },
                    if idx % 4 == 0 { Some(1_i64) } else { None },
                    idx
                ],
            )?;
        }

        for idx in 0..24_i64 {
            conn.execute(
                "INSERT INTO issues (
                    title, description, category, status, priority,
                    reporter_id, department_id, created_at_us
                 ) VALUES (?1, 'desc', 'road_maintenance', ?2, 'medium', ?3, 1, ?4)",
                params![
                    format!("Pothole {idx}"),
                    if idx % 2 == 0 { "submitted" } else { "acknowledged" },
                    idx % 12 + 1,
                    idx
                ],
            )?;
        }

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        let details = stmt
            .query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>();
        details
    }

    #[test]
    fn query_plan_uses_queue_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT id
             FROM issues
             WHERE status = 'submitted'
             ORDER BY created_at_us ASC
             LIMIT 20",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_issues_status_created")),
            "expected queue index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_staff_lookup_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT id
             FROM users
             WHERE role = 'department_staff' AND is_active = 1 AND department_id = 1
             ORDER BY id ASC",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_users_role_active")),
            "expected staff index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn duplicate_vote_violates_unique_constraint() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        conn.execute(
            "INSERT INTO issue_votes (issue_id, user_id, vote_type, created_at_us)
             VALUES (1, 2, 'upvote', 0)",
            [],
        )?;

        let second = conn.execute(
            "INSERT INTO issue_votes (issue_id, user_id, vote_type, created_at_us)
             VALUES (1, 2, 'upvote', 1)",
            [],
        );
        assert!(second.is_err(), "second identical vote must be rejected");

        // A different vote type by the same user is allowed.
        conn.execute(
            "INSERT INTO issue_votes (issue_id, user_id, vote_type, created_at_us)
             VALUES (1, 2, 'confirm', 2)",
            [],
        )?;

        Ok(())
    }

    #[test]
    fn duplicate_badge_violates_unique_constraint() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        conn.execute(
            "INSERT INTO user_badges (user_id, badge_key, badge_name, badge_description, earned_at_us)
             VALUES (1, 'first_report', 'First Steps', 'Reported your first issue', 0)",
            [],
        )?;

        let second = conn.execute(
            "INSERT INTO user_badges (user_id, badge_key, badge_name, badge_description, earned_at_us)
             VALUES (1, 'first_report', 'First Steps', 'Reported your first issue', 1)",
            [],
        );
        assert!(second.is_err(), "badge keys are unique per user");

        Ok(())
    }

    #[test]
    fn enum_checks_reject_unknown_values() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let bad = conn.execute(
            "INSERT INTO issues (title, description, category, reporter_id, created_at_us)
             VALUES ('t', 'd', 'graffiti', 1, 0)",
            [],
        );
        assert!(bad.is_err(), "unknown category must fail the CHECK");
        Ok(())
    }
}
