//! Community vote scoring.
//!
//! One vote of each type per (user, issue). The store's UNIQUE constraint is
//! the authoritative guard: two concurrent casts race to insert and exactly
//! one wins, with the loser's constraint violation surfaced as
//! `DuplicateVote`. The urgency score is recomputed synchronously on every
//! tally change so `urgency_score == upvotes*2 + confirmations` holds after
//! every commit.

use rusqlite::Connection;

use crate::config::RewardConfig;
use crate::error::{EngineError, Result};
use crate::model::issue::{VoteType, urgency_score};
use crate::store::query;

use super::karma;

/// Cast a vote and return the issue's new urgency score.
///
/// Awards the voter the vote reward as an isolated side effect. Reporter
/// self-votes are permitted and earn the same reward; the engine does not
/// special-case them.
///
/// # Errors
///
/// Returns `IssueNotFound`/`UserNotFound` for missing rows and
/// `DuplicateVote` when a vote of this type already exists, including when
/// a concurrent cast won the insert race.
pub fn cast_vote(
    conn: &Connection,
    rewards: RewardConfig,
    issue_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> Result<i64> {
    let issue = query::get_issue(conn, issue_id)?;
    let voter = query::get_user(conn, user_id)?;

    if let Err(error) = query::insert_vote(conn, issue_id, user_id, vote_type) {
        if query::is_constraint_violation(&error) {
            return Err(EngineError::DuplicateVote {
                issue_id,
                user_id,
                vote_type,
            });
        }
        return Err(error.into());
    }

    let (upvotes, confirmations) = match vote_type {
        VoteType::Upvote => (issue.upvotes + 1, issue.confirmations),
        VoteType::Confirm => (issue.upvotes, issue.confirmations + 1),
    };
    let score = urgency_score(upvotes, confirmations);
    query::set_vote_tallies(conn, issue_id, upvotes, confirmations, score)?;
    tracing::debug!(issue_id, upvotes, confirmations, score, "recomputed urgency score");

    karma::award_karma_isolated(
        conn,
        voter.id,
        rewards.vote,
        &format!("Voted on issue: {}", issue.title),
    );

    Ok(score)
}

/// Remove a previously cast vote and return the issue's new urgency score.
///
/// Tallies floor at zero; the vote reward is not clawed back.
///
/// # Errors
///
/// Returns `IssueNotFound` for a missing issue and `VoteNotFound` when no
/// vote of this type by this user exists.
pub fn remove_vote(
    conn: &Connection,
    issue_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> Result<i64> {
    let issue = query::get_issue(conn, issue_id)?;

    if !query::delete_vote(conn, issue_id, user_id, vote_type)? {
        return Err(EngineError::VoteNotFound {
            issue_id,
            user_id,
            vote_type,
        });
    }

    let (upvotes, confirmations) = match vote_type {
        VoteType::Upvote => ((issue.upvotes - 1).max(0), issue.confirmations),
        VoteType::Confirm => (issue.upvotes, (issue.confirmations - 1).max(0)),
    };
    let score = urgency_score(upvotes, confirmations);
    query::set_vote_tallies(conn, issue_id, upvotes, confirmations, score)?;
    tracing::debug!(issue_id, upvotes, confirmations, score, "recomputed urgency score");

    Ok(score)
}
