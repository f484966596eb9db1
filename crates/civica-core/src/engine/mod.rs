//! The engine façade.
//!
//! [`Engine`] owns the store connection and executes each logical action
//! (submit, vote, status change, assignment, comment) as one SQLite
//! transaction: tally/score/status mutations and their audit, notification,
//! and badge side effects commit together or not at all. Karma and badge
//! side effects are isolated inside the transaction — their failure is
//! logged as an anomaly without rolling back the primary action.

pub mod karma;
pub mod lifecycle;
pub mod notify;
pub mod routing;
pub mod scoring;

use rusqlite::Connection;
use std::path::Path;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::issue::{Comment, Issue, IssueDraft, IssueStatus, IssueUpdateRecord, VoteType};
use crate::model::user::{Department, Notification, User};
use crate::store::{
    self,
    query::{self, IssueFilter, LeaderboardEntry, UserActivity},
};

/// Rough conversion from planar coordinate deltas to kilometres. This is a
/// documented approximation, not a geospatial engine.
const KM_PER_DEGREE: f64 = 111.0;

/// The issue lifecycle and civic engagement engine.
pub struct Engine {
    conn: Connection,
    config: EngineConfig,
}

impl Engine {
    /// Wrap an already opened store connection with default configuration.
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self::with_config(conn, EngineConfig::default())
    }

    /// Wrap an already opened store connection with explicit configuration.
    #[must_use]
    pub const fn with_config(conn: Connection, config: EngineConfig) -> Self {
        Self { conn, config }
    }

    /// Open (or create) the store at `path` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if opening or migrating the store fails.
    pub fn open(path: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        let conn = store::open_store(path)?;
        Ok(Self::with_config(conn, config))
    }

    /// Read access to the underlying store, for the external read layers.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn transaction<T>(
        &mut self,
        action: impl FnOnce(&Connection, &EngineConfig) -> Result<T>,
    ) -> Result<T> {
        let config = self.config.clone();
        let tx = self.conn.transaction().map_err(EngineError::Storage)?;
        let value = action(&tx, &config)?;
        tx.commit()?;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Submission and social actions
    // -----------------------------------------------------------------------

    /// Submit a new issue report.
    ///
    /// Creates the issue in `submitted` state, awards the reporter the
    /// report reward, and notifies every admin.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for a missing reporter.
    pub fn submit_issue(&mut self, reporter_id: i64, draft: &IssueDraft) -> Result<Issue> {
        self.transaction(|conn, config| {
            let reporter = query::get_user(conn, reporter_id)?;
            let issue_id = query::insert_issue(conn, reporter_id, draft)?;
            let issue = query::get_issue(conn, issue_id)?;

            karma::award_karma_isolated(
                conn,
                reporter_id,
                config.rewards.report,
                &format!("Reported issue: {}", issue.title),
            );
            notify::notify_new_submission(conn, &issue, &reporter.name)?;

            tracing::info!(issue_id, reporter = reporter_id, "issue submitted");
            Ok(issue)
        })
    }

    /// Cast a vote; returns the issue's new urgency score.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVote` when a vote of this type already exists.
    pub fn cast_vote(&mut self, issue_id: i64, user_id: i64, vote_type: VoteType) -> Result<i64> {
        self.transaction(|conn, config| {
            scoring::cast_vote(conn, config.rewards, issue_id, user_id, vote_type)
        })
    }

    /// Remove a vote; returns the issue's new urgency score.
    ///
    /// # Errors
    ///
    /// Returns `VoteNotFound` when no such vote exists.
    pub fn remove_vote(&mut self, issue_id: i64, user_id: i64, vote_type: VoteType) -> Result<i64> {
        self.transaction(|conn, _| scoring::remove_vote(conn, issue_id, user_id, vote_type))
    }

    /// Add a comment to an issue; returns the comment id.
    ///
    /// Awards the commenter the comment reward and notifies the reporter
    /// and assignee (excluding the commenter).
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`/`UserNotFound` for missing rows.
    pub fn add_comment(&mut self, issue_id: i64, user_id: i64, body: &str) -> Result<i64> {
        self.transaction(|conn, config| {
            let issue = query::get_issue(conn, issue_id)?;
            let commenter = query::get_user(conn, user_id)?;
            let comment_id = query::insert_comment(conn, issue_id, user_id, body)?;

            karma::award_karma_isolated(
                conn,
                user_id,
                config.rewards.comment,
                &format!("Commented on issue: {}", issue.title),
            );
            notify::notify_comment(conn, &issue, user_id, &commenter.name, body)?;

            Ok(comment_id)
        })
    }

    /// Append a photo URL supplied by the upload layer to an issue's photo
    /// list; returns the updated list. The engine never touches image bytes.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` for a missing issue.
    pub fn attach_photo(&mut self, issue_id: i64, photo_url: &str) -> Result<Vec<String>> {
        self.transaction(|conn, _| {
            let issue = query::get_issue(conn, issue_id)?;
            let mut photos = issue.photo_urls;
            photos.push(photo_url.to_string());
            query::set_photo_urls(conn, issue_id, &photos)?;
            Ok(photos)
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle, routing, assignment
    // -----------------------------------------------------------------------

    /// Apply a status change (optionally with a comment) as `actor_id`.
    ///
    /// # Errors
    ///
    /// Returns `Authorization` for citizen actors.
    pub fn apply_status(
        &mut self,
        issue_id: i64,
        new_status: IssueStatus,
        actor_id: i64,
        comment: Option<&str>,
    ) -> Result<Issue> {
        self.transaction(|conn, config| {
            lifecycle::apply_status(conn, config.rewards, issue_id, new_status, actor_id, comment)
        })
    }

    /// Route an issue to its department by category.
    ///
    /// # Errors
    ///
    /// Returns `Routing` when the mapped department is not provisioned.
    pub fn route(&mut self, issue_id: i64) -> Result<Department> {
        self.transaction(|conn, _| routing::route(conn, issue_id))
    }

    /// Auto-assign an issue to the first available staff member, routing
    /// first if needed.
    ///
    /// # Errors
    ///
    /// Returns `Routing` or `NoStaffAvailable` as applicable.
    pub fn auto_assign(&mut self, issue_id: i64) -> Result<User> {
        self.transaction(|conn, config| routing::auto_assign(conn, config.rewards, issue_id))
    }

    /// The staff work queue, optionally scoped to one department.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn priority_queue(&self, department_id: Option<i64>) -> Result<Vec<Issue>> {
        routing::priority_queue(&self.conn, department_id)
    }

    // -----------------------------------------------------------------------
    // Karma and badges
    // -----------------------------------------------------------------------

    /// Adjust a user's karma directly; returns newly earned badge keys.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for a missing user.
    pub fn award_karma(&mut self, user_id: i64, points: i64, reason: &str) -> Result<Vec<String>> {
        self.transaction(|conn, _| karma::award_karma(conn, user_id, points, reason))
    }

    /// Re-run the badge table for a user; returns newly earned keys.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for a missing user.
    pub fn evaluate_badges(&mut self, user_id: i64) -> Result<Vec<String>> {
        self.transaction(|conn, _| karma::evaluate_badges(conn, user_id))
    }

    // -----------------------------------------------------------------------
    // Read surfaces
    // -----------------------------------------------------------------------

    /// Fetch one issue.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` for a missing issue.
    pub fn issue(&self, issue_id: i64) -> Result<Issue> {
        query::get_issue(&self.conn, issue_id)
    }

    /// List issues matching a filter.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        query::list_issues(&self.conn, filter)
    }

    /// Audit history for an issue, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn issue_updates(&self, issue_id: i64) -> Result<Vec<IssueUpdateRecord>> {
        query::updates_for_issue(&self.conn, issue_id)
    }

    /// Comments on an issue, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn comments(&self, issue_id: i64) -> Result<Vec<Comment>> {
        query::comments_for_issue(&self.conn, issue_id)
    }

    /// Issues within `radius_km` of a point, sorted by urgency score desc.
    ///
    /// Planar approximation: degree deltas scaled by ~111 km/degree. Good
    /// enough for a city map, not a geospatial index.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn nearby_issues(&self, latitude: f64, longitude: f64, radius_km: f64) -> Result<Vec<Issue>> {
        let mut nearby: Vec<Issue> = query::issues_with_coordinates(&self.conn)?
            .into_iter()
            .filter(|issue| {
                let (Some(lat), Some(lon)) = (issue.latitude, issue.longitude) else {
                    return false;
                };
                let distance_km =
                    ((lat - latitude).powi(2) + (lon - longitude).powi(2)).sqrt() * KM_PER_DEGREE;
                distance_km <= radius_km
            })
            .collect();
        nearby.sort_by(|a, b| {
            b.urgency_score
                .cmp(&a.urgency_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(nearby)
    }

    /// Civic karma leaderboard over active citizens.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        query::leaderboard(&self.conn, self.config.queue.leaderboard_limit)
    }

    /// Aggregate activity counts for one user.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for a missing user.
    pub fn user_stats(&self, user_id: i64) -> Result<UserActivity> {
        query::load_user_activity(&self.conn, user_id)
    }

    // -----------------------------------------------------------------------
    // Notification reader
    // -----------------------------------------------------------------------

    /// Notifications for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        notify::list(
            &self.conn,
            user_id,
            unread_only,
            self.config.queue.notification_limit,
        )
    }

    /// Mark one notification read; returns whether a row was updated.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub fn mark_notification_read(&mut self, notification_id: i64, user_id: i64) -> Result<bool> {
        query::mark_notification_read(&self.conn, notification_id, user_id)
    }

    /// Mark all of a user's notifications read; returns the updated count.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub fn mark_all_notifications_read(&mut self, user_id: i64) -> Result<usize> {
        query::mark_all_notifications_read(&self.conn, user_id)
    }

    /// Count of unread notifications for a user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn unread_count(&self, user_id: i64) -> Result<i64> {
        query::unread_notification_count(&self.conn, user_id)
    }
}
