//! Issue lifecycle state machine.
//!
//! submitted → acknowledged → in_progress → {resolved, closed, rejected}.
//! The terminal set is convention, not enforcement: any staff/admin actor
//! may set any status value. What the engine does guarantee is that the
//! lifecycle timestamps are stamped exactly once (guarded by "not already
//! set"), that every change leaves an immutable audit record, and that the
//! reporter's resolution bonus is paid only the first time an issue reaches
//! `resolved`.

use rusqlite::Connection;

use crate::config::RewardConfig;
use crate::error::{EngineError, Result};
use crate::model::issue::{Issue, IssueStatus};
use crate::model::user::UserRole;
use crate::store::query;

use super::{karma, notify};

/// Apply a status change (optionally with a staff comment) to an issue.
///
/// Side effects, all in the caller's transaction:
/// - stamps `acknowledged_at` the first time the status implies
///   acknowledgement, and `resolved_at` the first time it is `resolved`
/// - writes one `issue_updates` audit row
/// - notifies the reporter (and the assignee when distinct from both
///   reporter and actor)
/// - awards the reporter the resolution bonus on first resolution
///
/// # Errors
///
/// Returns `Authorization` for citizen actors, `UserNotFound` for a missing
/// actor, and `IssueNotFound` for a missing issue.
pub fn apply_status(
    conn: &Connection,
    rewards: RewardConfig,
    issue_id: i64,
    new_status: IssueStatus,
    actor_id: i64,
    comment: Option<&str>,
) -> Result<Issue> {
    let actor = query::get_user(conn, actor_id)?;
    if actor.role == UserRole::Citizen {
        return Err(EngineError::Authorization {
            user_id: actor_id,
            action: "update issue status",
        });
    }

    let issue = query::get_issue(conn, issue_id)?;
    let old_status = issue.status;
    let first_resolution = new_status == IssueStatus::Resolved && issue.resolved_at.is_none();

    let now = query::now_us();
    query::set_status(
        conn,
        issue_id,
        new_status,
        new_status.implies_acknowledged().then_some(now),
        (new_status == IssueStatus::Resolved).then_some(now),
    )?;

    query::insert_issue_update(conn, issue_id, actor_id, new_status, comment)?;
    notify::notify_status_change(conn, &issue, actor_id, old_status, new_status, comment)?;

    if first_resolution {
        karma::award_karma_isolated(
            conn,
            issue.reporter_id,
            rewards.resolution,
            &format!("Issue resolved: {}", issue.title),
        );
    }

    tracing::info!(
        issue_id,
        actor = actor_id,
        from = %old_status,
        to = %new_status,
        "applied status change"
    );

    query::get_issue(conn, issue_id)
}
