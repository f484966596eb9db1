//! Category routing, staff assignment, and the priority work queue.
//!
//! Routing is a fixed category → department-name table; departments must be
//! pre-provisioned with exactly those names. Assignment picks the first
//! active staff member in the routed department by ascending user id. That
//! is a documented simplification, not load balancing: the same ordering is
//! picked every time.

use rusqlite::Connection;
use std::cmp::Reverse;

use crate::config::RewardConfig;
use crate::error::{EngineError, Result};
use crate::model::issue::{Issue, IssueCategory, IssuePriority, IssueStatus};
use crate::model::user::{Department, User};
use crate::store::query;

use super::{lifecycle, notify};

/// Fixed routing table: each category maps to exactly one department name.
#[must_use]
pub const fn department_for(category: IssueCategory) -> &'static str {
    match category {
        IssueCategory::RoadMaintenance | IssueCategory::Streetlight => "Public Works",
        IssueCategory::Sanitation => "Sanitation Department",
        IssueCategory::WaterSupply => "Water Department",
        IssueCategory::Electricity => "Electricity Department",
        IssueCategory::Traffic => "Traffic Department",
        IssueCategory::Parks => "Parks and Recreation",
        IssueCategory::Other => "General Administration",
    }
}

/// Categories treated as critical for priority scoring.
pub const CRITICAL_CATEGORIES: [IssueCategory; 3] = [
    IssueCategory::WaterSupply,
    IssueCategory::Electricity,
    IssueCategory::RoadMaintenance,
];

/// Route an issue to its department and persist the assignment.
///
/// # Errors
///
/// Returns `IssueNotFound` for a missing issue and `Routing` when the
/// mapped department has not been provisioned.
pub fn route(conn: &Connection, issue_id: i64) -> Result<Department> {
    let issue = query::get_issue(conn, issue_id)?;
    let department_name = department_for(issue.category);

    let Some(department) = query::department_by_name(conn, department_name)? else {
        return Err(EngineError::Routing {
            category: issue.category,
            department: department_name,
        });
    };

    query::set_department(conn, issue_id, department.id)?;
    tracing::info!(issue_id, department = %department.name, "routed issue");
    Ok(department)
}

/// Auto-assign an issue to staff, routing it first if needed.
///
/// Selects the first active staff member in the department (stable ordering
/// by user id), sets the assignee, moves the issue to `acknowledged`
/// through the state machine, and notifies the assignee.
///
/// # Errors
///
/// Returns `Routing` when the department is missing and `NoStaffAvailable`
/// when the department has no active staff.
pub fn auto_assign(conn: &Connection, rewards: RewardConfig, issue_id: i64) -> Result<User> {
    let issue = query::get_issue(conn, issue_id)?;
    let department_id = match issue.department_id {
        Some(id) => id,
        None => route(conn, issue_id)?.id,
    };

    let staff = query::active_staff_in_department(conn, department_id)?;
    let Some(assignee) = staff.into_iter().next() else {
        return Err(EngineError::NoStaffAvailable { department_id });
    };

    query::set_assignee(conn, issue_id, assignee.id)?;
    lifecycle::apply_status(
        conn,
        rewards,
        issue_id,
        IssueStatus::Acknowledged,
        assignee.id,
        None,
    )?;
    notify::notify_assigned(conn, &issue, assignee.id)?;

    tracing::info!(issue_id, assignee = assignee.id, "auto-assigned issue");
    Ok(assignee)
}

/// Deterministic composite priority for the staff work queue.
///
/// Priority-tier base (urgent=10, high=7, medium=4, low=1), +3 for critical
/// categories, +1 when both coordinates are present.
#[must_use]
pub fn priority_score(issue: &Issue) -> i64 {
    let mut score = match issue.priority {
        IssuePriority::Urgent => 10,
        IssuePriority::High => 7,
        IssuePriority::Medium => 4,
        IssuePriority::Low => 1,
    };

    if CRITICAL_CATEGORIES.contains(&issue.category) {
        score += 3;
    }

    if issue.has_coordinates() {
        score += 1;
    }

    score
}

/// The staff work queue: open issues (submitted/acknowledged), optionally
/// scoped to one department, ordered by (priority score desc, urgency score
/// desc, created_at asc) — ties go to the oldest issue.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn priority_queue(conn: &Connection, department_id: Option<i64>) -> Result<Vec<Issue>> {
    let mut issues = query::open_issues(conn, department_id)?;
    issues.sort_by_key(|issue| {
        (
            Reverse(priority_score(issue)),
            Reverse(issue.urgency_score),
            issue.created_at,
        )
    });
    Ok(issues)
}
