//! Typed query helpers for the issue store.
//!
//! Provides typed Rust structs and composable query functions for the access
//! patterns the engine needs: issues by filter, votes by (issue, user),
//! users by role/active flag, badge keys, notifications, and the aggregate
//! activity counts behind badge predicates.
//!
//! All functions take a shared `&Connection` reference and return typed
//! structs (never raw rows). Inside an engine action the connection is a
//! transaction, so every helper call participates in that transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::model::issue::{
    Comment, Issue, IssueCategory, IssueDraft, IssuePriority, IssueStatus, IssueUpdateRecord,
    Vote, VoteType,
};
use crate::model::user::{Badge, Department, Notification, User, UserRole};

// ---------------------------------------------------------------------------
// Time and conversion helpers
// ---------------------------------------------------------------------------

/// Current wall time in microseconds, the store's timestamp unit.
#[must_use]
pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

fn ts(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or_default()
}

fn parse_col<T>(row_idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(row_idx, rusqlite::types::Type::Text, Box::new(error))
    })
}

/// Whether a rusqlite error is a UNIQUE/constraint violation. The engine
/// maps these to domain errors (duplicate vote) instead of storage failures.
#[must_use]
pub fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn map_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let category: String = row.get("category")?;
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let photo_urls_json: String = row.get("photo_urls")?;
    let photo_urls: Vec<String> = serde_json::from_str(&photo_urls_json).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Issue {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: parse_col(0, &category)?,
        status: parse_col(0, &status)?,
        priority: parse_col(0, &priority)?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        address: row.get("address")?,
        photo_urls,
        upvotes: row.get("upvotes")?,
        confirmations: row.get("confirmations")?,
        urgency_score: row.get("urgency_score")?,
        reporter_id: row.get("reporter_id")?,
        assigned_to_id: row.get("assigned_to_id")?,
        department_id: row.get("department_id")?,
        created_at: ts(row.get("created_at_us")?),
        acknowledged_at: row
            .get::<_, Option<i64>>("acknowledged_at_us")?
            .map(ts),
        resolved_at: row.get::<_, Option<i64>>("resolved_at_us")?.map(ts),
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        role: parse_col(0, &role)?,
        is_active: row.get("is_active")?,
        civic_karma: row.get("civic_karma")?,
        department_id: row.get("department_id")?,
        created_at: ts(row.get("created_at_us")?),
    })
}

fn map_department(row: &Row<'_>) -> rusqlite::Result<Department> {
    Ok(Department {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        contact_email: row.get("contact_email")?,
        contact_phone: row.get("contact_phone")?,
    })
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        issue_id: row.get("issue_id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        is_read: row.get("is_read")?,
        created_at: ts(row.get("created_at_us")?),
    })
}

const ISSUE_COLUMNS: &str = "id, title, description, category, status, priority, \
     latitude, longitude, address, photo_urls, upvotes, confirmations, \
     urgency_score, reporter_id, assigned_to_id, department_id, \
     created_at_us, acknowledged_at_us, resolved_at_us";

const USER_COLUMNS: &str =
    "id, name, email, phone, role, is_active, civic_karma, department_id, created_at_us";

// ---------------------------------------------------------------------------
// Provisioning (admin/test seam)
// ---------------------------------------------------------------------------

/// Input fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub department_id: Option<i64>,
}

impl NewUser {
    /// A plain active citizen account.
    #[must_use]
    pub fn citizen(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            role: UserRole::Citizen,
            is_active: true,
            department_id: None,
        }
    }

    /// An active staff account attached to a department.
    #[must_use]
    pub fn staff(name: &str, email: &str, department_id: i64) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            role: UserRole::DepartmentStaff,
            is_active: true,
            department_id: Some(department_id),
        }
    }

    /// An active admin account.
    #[must_use]
    pub fn admin(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            role: UserRole::Admin,
            is_active: true,
            department_id: None,
        }
    }
}

/// Insert a user row, returning its id.
///
/// # Errors
///
/// Returns a storage error on constraint violations (duplicate email).
pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (name, email, phone, role, is_active, department_id, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.is_active,
            user.department_id,
            now_us()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a department row, returning its id. Department names must match
/// the category mapping table exactly for routing to find them.
///
/// # Errors
///
/// Returns a storage error on constraint violations (duplicate name).
pub fn insert_department(conn: &Connection, name: &str, contact_email: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO departments (name, contact_email, created_at_us) VALUES (?1, ?2, ?3)",
        params![name, contact_email, now_us()],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Fetch a user by id.
///
/// # Errors
///
/// Returns `UserNotFound` when no such row exists.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        |row| map_user(row),
    )
    .optional()?
    .ok_or(EngineError::UserNotFound(user_id))
}

/// All active users with the given role, ordered by id.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn active_users_by_role(conn: &Connection, role: UserRole) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE role = ?1 AND is_active = 1
         ORDER BY id ASC"
    ))?;
    let users = stmt
        .query_map(params![role.as_str()], |row| map_user(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Active department staff in the given department, ordered by id. The
/// stable id ordering is what makes auto-assignment deterministic.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn active_staff_in_department(conn: &Connection, department_id: i64) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE role = 'department_staff' AND is_active = 1 AND department_id = ?1
         ORDER BY id ASC"
    ))?;
    let users = stmt
        .query_map(params![department_id], |row| map_user(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Add (or subtract) karma points for a user.
///
/// # Errors
///
/// Returns `UserNotFound` when no row was updated.
pub fn adjust_karma(conn: &Connection, user_id: i64, points: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET civic_karma = civic_karma + ?2 WHERE id = ?1",
        params![user_id, points],
    )?;
    if updated == 0 {
        return Err(EngineError::UserNotFound(user_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

/// Look up a department by its exact name.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn department_by_name(conn: &Connection, name: &str) -> Result<Option<Department>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, contact_email, contact_phone
             FROM departments WHERE name = ?1",
            params![name],
            |row| map_department(row),
        )
        .optional()?)
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Insert a new issue in `submitted` state, returning its id.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn insert_issue(conn: &Connection, reporter_id: i64, draft: &IssueDraft) -> Result<i64> {
    conn.execute(
        "INSERT INTO issues (
            title, description, category, status, priority,
            latitude, longitude, address, reporter_id, created_at_us
         ) VALUES (?1, ?2, ?3, 'submitted', ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            draft.title,
            draft.description,
            draft.category.as_str(),
            draft.priority.as_str(),
            draft.latitude,
            draft.longitude,
            draft.address,
            reporter_id,
            now_us()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an issue by id.
///
/// # Errors
///
/// Returns `IssueNotFound` when no such row exists.
pub fn get_issue(conn: &Connection, issue_id: i64) -> Result<Issue> {
    conn.query_row(
        &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
        params![issue_id],
        |row| map_issue(row),
    )
    .optional()?
    .ok_or(EngineError::IssueNotFound(issue_id))
}

/// Filter criteria for issue listings. All fields optional, AND semantics.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub category: Option<IssueCategory>,
    pub priority: Option<IssuePriority>,
    pub reporter_id: Option<i64>,
    pub department_id: Option<i64>,
    pub limit: Option<usize>,
}

/// List issues matching the filter, newest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn list_issues(conn: &Connection, filter: &IssueFilter) -> Result<Vec<Issue>> {
    let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1=1");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        let _ = write!(sql, " AND status = ?{}", args.len() + 1);
        args.push(Box::new(status.as_str()));
    }
    if let Some(category) = filter.category {
        let _ = write!(sql, " AND category = ?{}", args.len() + 1);
        args.push(Box::new(category.as_str()));
    }
    if let Some(priority) = filter.priority {
        let _ = write!(sql, " AND priority = ?{}", args.len() + 1);
        args.push(Box::new(priority.as_str()));
    }
    if let Some(reporter_id) = filter.reporter_id {
        let _ = write!(sql, " AND reporter_id = ?{}", args.len() + 1);
        args.push(Box::new(reporter_id));
    }
    if let Some(department_id) = filter.department_id {
        let _ = write!(sql, " AND department_id = ?{}", args.len() + 1);
        args.push(Box::new(department_id));
    }

    sql.push_str(" ORDER BY created_at_us DESC, id DESC");
    if let Some(limit) = filter.limit {
        let _ = write!(sql, " LIMIT {limit}");
    }

    let mut stmt = conn.prepare(&sql)?;
    let args_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(AsRef::as_ref).collect();
    let issues = stmt
        .query_map(rusqlite::params_from_iter(args_ref), |row| map_issue(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(issues)
}

/// Open work: issues still in `submitted` or `acknowledged`, optionally
/// scoped to one department. Ordering is applied by the caller.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn open_issues(conn: &Connection, department_id: Option<i64>) -> Result<Vec<Issue>> {
    let mut sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE status IN ('submitted', 'acknowledged')"
    );
    if department_id.is_some() {
        sql.push_str(" AND department_id = ?1");
    }
    sql.push_str(" ORDER BY created_at_us ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let issues = match department_id {
        Some(id) => stmt
            .query_map(params![id], |row| map_issue(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], |row| map_issue(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(issues)
}

/// Issues carrying both coordinates, for the planar nearby feed.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn issues_with_coordinates(conn: &Connection) -> Result<Vec<Issue>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE latitude IS NOT NULL AND longitude IS NOT NULL"
    ))?;
    let issues = stmt
        .query_map([], |row| map_issue(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(issues)
}

/// Persist new vote tallies and the recomputed urgency score.
///
/// # Errors
///
/// Returns `IssueNotFound` when no row was updated.
pub fn set_vote_tallies(
    conn: &Connection,
    issue_id: i64,
    upvotes: i64,
    confirmations: i64,
    urgency_score: i64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE issues SET upvotes = ?2, confirmations = ?3, urgency_score = ?4 WHERE id = ?1",
        params![issue_id, upvotes, confirmations, urgency_score],
    )?;
    if updated == 0 {
        return Err(EngineError::IssueNotFound(issue_id));
    }
    Ok(())
}

/// Persist a status change plus any newly stamped lifecycle timestamps.
///
/// # Errors
///
/// Returns `IssueNotFound` when no row was updated.
pub fn set_status(
    conn: &Connection,
    issue_id: i64,
    status: IssueStatus,
    acknowledged_at_us: Option<i64>,
    resolved_at_us: Option<i64>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE issues SET
            status = ?2,
            acknowledged_at_us = COALESCE(acknowledged_at_us, ?3),
            resolved_at_us = COALESCE(resolved_at_us, ?4)
         WHERE id = ?1",
        params![issue_id, status.as_str(), acknowledged_at_us, resolved_at_us],
    )?;
    if updated == 0 {
        return Err(EngineError::IssueNotFound(issue_id));
    }
    Ok(())
}

/// Persist the routed department for an issue.
///
/// # Errors
///
/// Returns `IssueNotFound` when no row was updated.
pub fn set_department(conn: &Connection, issue_id: i64, department_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE issues SET department_id = ?2 WHERE id = ?1",
        params![issue_id, department_id],
    )?;
    if updated == 0 {
        return Err(EngineError::IssueNotFound(issue_id));
    }
    Ok(())
}

/// Persist the assignee for an issue.
///
/// # Errors
///
/// Returns `IssueNotFound` when no row was updated.
pub fn set_assignee(conn: &Connection, issue_id: i64, user_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE issues SET assigned_to_id = ?2 WHERE id = ?1",
        params![issue_id, user_id],
    )?;
    if updated == 0 {
        return Err(EngineError::IssueNotFound(issue_id));
    }
    Ok(())
}

/// Replace the photo URL list for an issue.
///
/// # Errors
///
/// Returns `IssueNotFound` when no row was updated.
pub fn set_photo_urls(conn: &Connection, issue_id: i64, photo_urls: &[String]) -> Result<()> {
    let json = serde_json::to_string(photo_urls)
        .map_err(|error| EngineError::Storage(rusqlite::Error::ToSqlConversionFailure(Box::new(error))))?;
    let updated = conn.execute(
        "UPDATE issues SET photo_urls = ?2 WHERE id = ?1",
        params![issue_id, json],
    )?;
    if updated == 0 {
        return Err(EngineError::IssueNotFound(issue_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Insert a vote row. The UNIQUE (issue, user, type) constraint is the
/// authoritative duplicate guard; callers map violations to `DuplicateVote`.
pub fn insert_vote(
    conn: &Connection,
    issue_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO issue_votes (issue_id, user_id, vote_type, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![issue_id, user_id, vote_type.as_str(), now_us()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete a vote row, returning whether one existed.
///
/// # Errors
///
/// Returns a storage error if the delete fails.
pub fn delete_vote(
    conn: &Connection,
    issue_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM issue_votes WHERE issue_id = ?1 AND user_id = ?2 AND vote_type = ?3",
        params![issue_id, user_id, vote_type.as_str()],
    )?;
    Ok(deleted > 0)
}

/// All votes cast on an issue by one user.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn votes_by_user_on_issue(conn: &Connection, issue_id: i64, user_id: i64) -> Result<Vec<Vote>> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id, user_id, vote_type, created_at_us
         FROM issue_votes WHERE issue_id = ?1 AND user_id = ?2",
    )?;
    let votes = stmt
        .query_map(params![issue_id, user_id], |row| {
            let vote_type: String = row.get("vote_type")?;
            Ok(Vote {
                id: row.get("id")?,
                issue_id: row.get("issue_id")?,
                user_id: row.get("user_id")?,
                vote_type: parse_col(0, &vote_type)?,
                created_at: ts(row.get("created_at_us")?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(votes)
}

// ---------------------------------------------------------------------------
// Comments and audit records
// ---------------------------------------------------------------------------

/// Insert a comment row, returning its id.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn insert_comment(conn: &Connection, issue_id: i64, user_id: i64, body: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO issue_comments (issue_id, user_id, body, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![issue_id, user_id, body, now_us()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on an issue, newest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn comments_for_issue(conn: &Connection, issue_id: i64) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id, user_id, body, created_at_us
         FROM issue_comments WHERE issue_id = ?1
         ORDER BY created_at_us DESC, id DESC",
    )?;
    let comments = stmt
        .query_map(params![issue_id], |row| {
            Ok(Comment {
                id: row.get("id")?,
                issue_id: row.get("issue_id")?,
                user_id: row.get("user_id")?,
                body: row.get("body")?,
                created_at: ts(row.get("created_at_us")?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}

/// Insert an immutable audit record for a status/comment change.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn insert_issue_update(
    conn: &Connection,
    issue_id: i64,
    user_id: i64,
    status: IssueStatus,
    comment: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO issue_updates (issue_id, user_id, status, comment, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![issue_id, user_id, status.as_str(), comment, now_us()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit history for an issue, newest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn updates_for_issue(conn: &Connection, issue_id: i64) -> Result<Vec<IssueUpdateRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id, user_id, status, comment, created_at_us
         FROM issue_updates WHERE issue_id = ?1
         ORDER BY created_at_us DESC, id DESC",
    )?;
    let updates = stmt
        .query_map(params![issue_id], |row| {
            let status: String = row.get("status")?;
            Ok(IssueUpdateRecord {
                id: row.get("id")?,
                issue_id: row.get("issue_id")?,
                user_id: row.get("user_id")?,
                status: parse_col(0, &status)?,
                comment: row.get("comment")?,
                created_at: ts(row.get("created_at_us")?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(updates)
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

/// The badge keys a user already holds.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn badge_keys_for_user(conn: &Connection, user_id: i64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT badge_key FROM user_badges WHERE user_id = ?1")?;
    let keys = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(keys)
}

/// Insert a badge unless the user already holds it. Returns whether a row
/// was inserted. `INSERT OR IGNORE` plus the UNIQUE (user, key) constraint
/// keeps this correct under concurrent re-evaluation.
///
/// # Errors
///
/// Returns a storage error if the insert fails for a non-constraint reason.
pub fn insert_badge_if_absent(
    conn: &Connection,
    user_id: i64,
    badge_key: &str,
    badge_name: &str,
    badge_description: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_badges
            (user_id, badge_key, badge_name, badge_description, earned_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, badge_key, badge_name, badge_description, now_us()],
    )?;
    Ok(inserted > 0)
}

/// Badges earned by a user, oldest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn badges_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Badge>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, badge_key, badge_name, badge_description, earned_at_us
         FROM user_badges WHERE user_id = ?1
         ORDER BY earned_at_us ASC, id ASC",
    )?;
    let badges = stmt
        .query_map(params![user_id], |row| {
            Ok(Badge {
                id: row.get("id")?,
                user_id: row.get("user_id")?,
                badge_key: row.get("badge_key")?,
                badge_name: row.get("badge_name")?,
                badge_description: row.get("badge_description")?,
                earned_at: ts(row.get("earned_at_us")?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(badges)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Insert one unread notification row, returning its id.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn insert_notification(
    conn: &Connection,
    user_id: i64,
    issue_id: Option<i64>,
    title: &str,
    message: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, issue_id, title, message, is_read, created_at_us)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![user_id, issue_id, title, message, now_us()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Notifications for a user, newest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn list_notifications(
    conn: &Connection,
    user_id: i64,
    unread_only: bool,
    limit: usize,
) -> Result<Vec<Notification>> {
    let mut sql = String::from(
        "SELECT id, user_id, issue_id, title, message, is_read, created_at_us
         FROM notifications WHERE user_id = ?1",
    );
    if unread_only {
        sql.push_str(" AND is_read = 0");
    }
    let _ = write!(sql, " ORDER BY created_at_us DESC, id DESC LIMIT {limit}");

    let mut stmt = conn.prepare(&sql)?;
    let notifications = stmt
        .query_map(params![user_id], |row| map_notification(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(notifications)
}

/// Mark one notification read, scoped to its owner. Returns whether a row
/// was updated.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn mark_notification_read(conn: &Connection, notification_id: i64, user_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )?;
    Ok(updated > 0)
}

/// Mark all of a user's notifications read, returning the updated count.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn mark_all_notifications_read(conn: &Connection, user_id: i64) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )?;
    Ok(updated)
}

/// Count of unread notifications for a user.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn unread_notification_count(conn: &Connection, user_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Aggregate activity counts for one user; the input to badge predicates
/// and the profile stats surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserActivity {
    pub civic_karma: i64,
    pub issues_reported: i64,
    pub issues_resolved: i64,
    pub upvotes_cast: i64,
    pub confirms_cast: i64,
    pub comments_made: i64,
    pub badges_earned: i64,
    pub reported_by_category: HashMap<IssueCategory, i64>,
}

impl UserActivity {
    /// How many issues this user reported in one category.
    #[must_use]
    pub fn reported_in(&self, category: IssueCategory) -> i64 {
        self.reported_by_category.get(&category).copied().unwrap_or(0)
    }
}

/// Load the aggregate activity snapshot for a user.
///
/// # Errors
///
/// Returns `UserNotFound` when the user does not exist.
pub fn load_user_activity(conn: &Connection, user_id: i64) -> Result<UserActivity> {
    let user = get_user(conn, user_id)?;

    let mut activity = UserActivity {
        civic_karma: user.civic_karma,
        ..UserActivity::default()
    };

    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM issues WHERE reporter_id = ?1 GROUP BY category",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let category: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((category, count))
    })?;
    for row in rows {
        let (category, count) = row?;
        activity.issues_reported += count;
        activity
            .reported_by_category
            .insert(parse_col(0, &category)?, count);
    }

    activity.issues_resolved = conn.query_row(
        "SELECT COUNT(*) FROM issues WHERE reporter_id = ?1 AND status = 'resolved'",
        params![user_id],
        |row| row.get(0),
    )?;

    activity.upvotes_cast = conn.query_row(
        "SELECT COUNT(*) FROM issue_votes WHERE user_id = ?1 AND vote_type = 'upvote'",
        params![user_id],
        |row| row.get(0),
    )?;

    activity.confirms_cast = conn.query_row(
        "SELECT COUNT(*) FROM issue_votes WHERE user_id = ?1 AND vote_type = 'confirm'",
        params![user_id],
        |row| row.get(0),
    )?;

    activity.comments_made = conn.query_row(
        "SELECT COUNT(*) FROM issue_comments WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    activity.badges_earned = conn.query_row(
        "SELECT COUNT(*) FROM user_badges WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok(activity)
}

/// One leaderboard row: an active citizen ranked by karma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub name: String,
    pub civic_karma: i64,
    pub badges_earned: i64,
    pub issues_reported: i64,
}

/// Civic karma leaderboard over active citizens.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn leaderboard(conn: &Connection, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT u.id, u.name, u.civic_karma,
                (SELECT COUNT(*) FROM user_badges b WHERE b.user_id = u.id),
                (SELECT COUNT(*) FROM issues i WHERE i.reporter_id = u.id)
         FROM users u
         WHERE u.role = 'citizen' AND u.is_active = 1
         ORDER BY u.civic_karma DESC, u.id ASC
         LIMIT {limit}"
    ))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(
            |(idx, (user_id, name, civic_karma, badges_earned, issues_reported))| {
                LeaderboardEntry {
                    rank: idx + 1,
                    user_id,
                    name,
                    civic_karma,
                    badges_earned,
                    issues_reported,
                }
            },
        )
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{
        IssueFilter, NewUser, insert_department, insert_issue, insert_user, insert_vote,
        is_constraint_violation, list_issues, load_user_activity,
    };
    use crate::model::issue::{IssueCategory, IssueDraft, IssuePriority, IssueStatus, VoteType};
    use crate::store;

    fn draft(title: &str, category: IssueCategory) -> IssueDraft {
        IssueDraft {
            title: title.to_string(),
            description: "test issue".to_string(),
            category,
            priority: IssuePriority::default(),
            latitude: None,
            longitude: None,
            address: None,
        }
    }

    #[test]
    fn filter_combines_with_and_semantics() {
        let conn = store::open_in_memory().expect("open store");
        let reporter = insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert reporter");
        let other = insert_user(&conn, &NewUser::citizen("Ben", "ben@example.org"))
            .expect("insert other");

        insert_issue(&conn, reporter, &draft("pothole", IssueCategory::RoadMaintenance))
            .expect("insert issue");
        insert_issue(&conn, reporter, &draft("dark lamp", IssueCategory::Streetlight))
            .expect("insert issue");
        insert_issue(&conn, other, &draft("leak", IssueCategory::RoadMaintenance))
            .expect("insert issue");

        let filtered = list_issues(
            &conn,
            &IssueFilter {
                category: Some(IssueCategory::RoadMaintenance),
                reporter_id: Some(reporter),
                ..IssueFilter::default()
            },
        )
        .expect("list issues");

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "pothole");
        assert_eq!(filtered[0].status, IssueStatus::Submitted);
    }

    #[test]
    fn duplicate_vote_insert_is_a_constraint_violation() {
        let conn = store::open_in_memory().expect("open store");
        let user = insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");
        let issue = insert_issue(&conn, user, &draft("pothole", IssueCategory::RoadMaintenance))
            .expect("insert issue");

        insert_vote(&conn, issue, user, VoteType::Upvote).expect("first vote");
        let error = insert_vote(&conn, issue, user, VoteType::Upvote)
            .expect_err("second vote must violate the unique constraint");
        assert!(is_constraint_violation(&error));
    }

    #[test]
    fn activity_counts_reported_categories() {
        let conn = store::open_in_memory().expect("open store");
        let user = insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");
        insert_department(&conn, "Public Works", None).expect("insert department");

        for idx in 0..3 {
            insert_issue(
                &conn,
                user,
                &draft(&format!("pothole {idx}"), IssueCategory::RoadMaintenance),
            )
            .expect("insert issue");
        }
        insert_issue(&conn, user, &draft("leak", IssueCategory::WaterSupply))
            .expect("insert issue");

        let activity = load_user_activity(&conn, user).expect("load activity");
        assert_eq!(activity.issues_reported, 4);
        assert_eq!(activity.reported_in(IssueCategory::RoadMaintenance), 3);
        assert_eq!(activity.reported_in(IssueCategory::WaterSupply), 1);
        assert_eq!(activity.reported_in(IssueCategory::Parks), 0);
    }
}
