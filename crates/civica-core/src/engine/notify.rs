//! Notification emitter.
//!
//! Notifications are persisted rows, not a message bus: the engine only
//! creates them, an external delivery/read layer lists them and flips the
//! read flag. Composite emitters compute the recipient set for each engine
//! event and de-duplicate it, so a user occupying two roles for one event
//! (e.g. reporter who is also the assignee) still gets exactly one row.

use rusqlite::Connection;
use std::collections::HashSet;

use crate::error::Result;
use crate::model::issue::{Issue, IssueStatus};
use crate::model::user::{Notification, UserRole};
use crate::store::query;

/// Create one unread notification for `recipient`.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn emit(
    conn: &Connection,
    recipient: i64,
    title: &str,
    message: &str,
    issue_id: Option<i64>,
) -> Result<i64> {
    let id = query::insert_notification(conn, recipient, issue_id, title, message)?;
    tracing::debug!(recipient, notification = id, title, "emitted notification");
    Ok(id)
}

/// Notify every admin that a new issue was submitted.
///
/// # Errors
///
/// Returns a storage error if a lookup or insert fails.
pub fn notify_new_submission(conn: &Connection, issue: &Issue, reporter_name: &str) -> Result<Vec<i64>> {
    let admins = query::active_users_by_role(conn, UserRole::Admin)?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for admin in admins {
        if !seen.insert(admin.id) {
            continue;
        }
        ids.push(emit(
            conn,
            admin.id,
            "New Issue Reported",
            &format!(
                "New issue '{}' has been reported by {reporter_name}",
                issue.title
            ),
            Some(issue.id),
        )?);
    }
    Ok(ids)
}

/// Notify the reporter (and the assignee, when distinct from both reporter
/// and actor) about a status change.
///
/// # Errors
///
/// Returns a storage error if an insert fails.
pub fn notify_status_change(
    conn: &Connection,
    issue: &Issue,
    actor_id: i64,
    old_status: IssueStatus,
    new_status: IssueStatus,
    comment: Option<&str>,
) -> Result<Vec<i64>> {
    let mut change = if old_status == new_status {
        String::new()
    } else {
        format!("Status changed from {old_status} to {new_status}")
    };
    if let Some(comment) = comment {
        if !change.is_empty() {
            change.push_str(" | ");
        }
        change.push_str("New comment: ");
        change.push_str(comment);
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    seen.insert(issue.reporter_id);
    ids.push(emit(
        conn,
        issue.reporter_id,
        "Issue Status Update",
        &format!("Your issue '{}' has been updated: {change}", issue.title),
        Some(issue.id),
    )?);

    if let Some(assignee) = issue.assigned_to_id {
        if assignee != actor_id && seen.insert(assignee) {
            ids.push(emit(
                conn,
                assignee,
                "Issue Status Update",
                &format!("Issue '{}' status has changed to {new_status}", issue.title),
                Some(issue.id),
            )?);
        }
    }

    Ok(ids)
}

/// Notify a staff member they were assigned an issue.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn notify_assigned(conn: &Connection, issue: &Issue, assignee: i64) -> Result<i64> {
    emit(
        conn,
        assignee,
        "Issue Assigned",
        &format!("You have been assigned to issue: {}", issue.title),
        Some(issue.id),
    )
}

/// Notify the reporter (unless they commented) and the assignee (unless
/// they commented or are the reporter) about a new comment.
///
/// # Errors
///
/// Returns a storage error if an insert fails.
pub fn notify_comment(
    conn: &Connection,
    issue: &Issue,
    commenter_id: i64,
    commenter_name: &str,
    body: &str,
) -> Result<Vec<i64>> {
    let mut seen = HashSet::new();
    seen.insert(commenter_id);

    let mut ids = Vec::new();

    if seen.insert(issue.reporter_id) {
        ids.push(emit(
            conn,
            issue.reporter_id,
            "New Comment on Your Issue",
            &format!(
                "{commenter_name} commented on your issue '{}': {body}",
                issue.title
            ),
            Some(issue.id),
        )?);
    }

    if let Some(assignee) = issue.assigned_to_id {
        if seen.insert(assignee) {
            ids.push(emit(
                conn,
                assignee,
                "New Comment on Assigned Issue",
                &format!(
                    "{commenter_name} commented on issue '{}': {body}",
                    issue.title
                ),
                Some(issue.id),
            )?);
        }
    }

    Ok(ids)
}

/// Reader interface consumed by the delivery layer.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn list(
    conn: &Connection,
    user_id: i64,
    unread_only: bool,
    limit: usize,
) -> Result<Vec<Notification>> {
    query::list_notifications(conn, user_id, unread_only, limit)
}
