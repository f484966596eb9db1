//! Civic karma and the badge achievement engine.
//!
//! Karma is a cumulative per-user reputation counter adjusted by fixed
//! per-action rewards. Every award re-evaluates the badge table: a fixed
//! ordered list of independent predicates over the user's aggregate
//! activity. Badge points are display metadata baked into the badge record;
//! they are never re-applied to karma.
//!
//! # Idempotency
//!
//! Already-held badge keys are excluded up front, and insertion goes through
//! `INSERT OR IGNORE` against the store's UNIQUE (user, badge key)
//! constraint, so concurrent re-evaluation can never double-award.

use rusqlite::Connection;

use crate::error::Result;
use crate::model::issue::IssueCategory;
use crate::store::query::{self, UserActivity};

/// One entry in the achievement table.
pub struct BadgeSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Display-only point value shown next to the badge.
    pub points: i64,
    predicate: fn(&UserActivity) -> bool,
}

impl BadgeSpec {
    /// Whether the user's current activity satisfies this badge.
    #[must_use]
    pub fn is_satisfied_by(&self, activity: &UserActivity) -> bool {
        (self.predicate)(activity)
    }
}

/// The fixed, ordered achievement table.
pub const BADGES: &[BadgeSpec] = &[
    BadgeSpec {
        key: "first_report",
        name: "First Steps",
        description: "Reported your first issue",
        points: 10,
        predicate: |a| a.issues_reported >= 1,
    },
    BadgeSpec {
        key: "pothole_patriot",
        name: "Pothole Patriot",
        description: "Reported 5 road maintenance issues",
        points: 50,
        predicate: |a| a.reported_in(IssueCategory::RoadMaintenance) >= 5,
    },
    BadgeSpec {
        key: "streetlight_saver",
        name: "Streetlight Saver",
        description: "Reported 3 streetlight issues",
        points: 30,
        predicate: |a| a.reported_in(IssueCategory::Streetlight) >= 3,
    },
    BadgeSpec {
        key: "clean_up_crew",
        name: "Clean-Up Crew",
        description: "Reported 5 sanitation issues",
        points: 50,
        predicate: |a| a.reported_in(IssueCategory::Sanitation) >= 5,
    },
    BadgeSpec {
        key: "water_warrior",
        name: "Water Warrior",
        description: "Reported 3 water supply issues",
        points: 30,
        predicate: |a| a.reported_in(IssueCategory::WaterSupply) >= 3,
    },
    BadgeSpec {
        key: "power_protector",
        name: "Power Protector",
        description: "Reported 3 electricity issues",
        points: 30,
        predicate: |a| a.reported_in(IssueCategory::Electricity) >= 3,
    },
    BadgeSpec {
        key: "traffic_tracker",
        name: "Traffic Tracker",
        description: "Reported 3 traffic issues",
        points: 30,
        predicate: |a| a.reported_in(IssueCategory::Traffic) >= 3,
    },
    BadgeSpec {
        key: "park_patrol",
        name: "Park Patrol",
        description: "Reported 3 park issues",
        points: 30,
        predicate: |a| a.reported_in(IssueCategory::Parks) >= 3,
    },
    BadgeSpec {
        key: "community_champion",
        name: "Community Champion",
        description: "Earned 500+ civic karma",
        points: 100,
        predicate: |a| a.civic_karma >= 500,
    },
    BadgeSpec {
        key: "issue_resolver",
        name: "Issue Resolver",
        description: "Had 10 issues resolved",
        points: 200,
        predicate: |a| a.issues_resolved >= 10,
    },
    BadgeSpec {
        key: "voting_veteran",
        name: "Voting Veteran",
        description: "Voted on 50 issues",
        points: 100,
        predicate: |a| a.upvotes_cast >= 50,
    },
    BadgeSpec {
        key: "confirmation_king",
        name: "Confirmation King",
        description: "Confirmed 25 issues",
        points: 75,
        predicate: |a| a.confirms_cast >= 25,
    },
    BadgeSpec {
        key: "social_butterfly",
        name: "Social Butterfly",
        description: "Commented on 20 issues",
        points: 50,
        predicate: |a| a.comments_made >= 20,
    },
];

/// Add `points` (any signed value) to a user's karma, then re-evaluate the
/// badge table. Returns the keys of any newly earned badges.
///
/// # Errors
///
/// Returns `UserNotFound` when the user does not exist. Badge evaluation
/// errors are isolated: they are logged and yield an empty list without
/// failing the award.
pub fn award_karma(conn: &Connection, user_id: i64, points: i64, reason: &str) -> Result<Vec<String>> {
    query::adjust_karma(conn, user_id, points)?;
    tracing::info!(user_id, points, reason, "awarded karma");

    match evaluate_badges(conn, user_id) {
        Ok(new_badges) => Ok(new_badges),
        Err(error) => {
            tracing::warn!(user_id, error = %error, "badge evaluation failed after karma award");
            Ok(Vec::new())
        }
    }
}

/// Award karma as a side effect of another action. A failure here (e.g. the
/// voter row vanished) is an anomaly: it is logged and reported through the
/// return value but must never roll back the primary action, so the caller
/// ignores the flag unless it wants to surface it.
pub(crate) fn award_karma_isolated(conn: &Connection, user_id: i64, points: i64, reason: &str) {
    if let Err(error) = award_karma(conn, user_id, points, reason) {
        tracing::warn!(
            user_id,
            points,
            reason,
            error = %error,
            "karma award failed; primary action preserved"
        );
    }
}

/// Run every badge predicate not yet satisfied by an existing badge record,
/// awarding each newly true one exactly once. Returns newly earned keys.
///
/// # Errors
///
/// Returns `UserNotFound` when the user does not exist, or a storage error.
pub fn evaluate_badges(conn: &Connection, user_id: i64) -> Result<Vec<String>> {
    let existing = query::badge_keys_for_user(conn, user_id)?;
    let activity = query::load_user_activity(conn, user_id)?;

    let mut earned = Vec::new();
    for spec in BADGES {
        if existing.contains(spec.key) || !spec.is_satisfied_by(&activity) {
            continue;
        }

        if query::insert_badge_if_absent(conn, user_id, spec.key, spec.name, spec.description)? {
            tracing::info!(user_id, badge = spec.key, "awarded badge");
            earned.push(spec.key.to_string());
        }
    }

    Ok(earned)
}

#[cfg(test)]
mod tests {
    use super::{BADGES, award_karma, evaluate_badges};
    use crate::error::EngineError;
    use crate::model::issue::{IssueCategory, IssueDraft, IssuePriority};
    use crate::store::{self, query::{self, NewUser}};
    use std::collections::HashSet;

    fn draft(category: IssueCategory) -> IssueDraft {
        IssueDraft {
            title: "issue".to_string(),
            description: "desc".to_string(),
            category,
            priority: IssuePriority::default(),
            latitude: None,
            longitude: None,
            address: None,
        }
    }

    #[test]
    fn badge_keys_are_unique_and_complete() {
        let mut seen = HashSet::new();
        for spec in BADGES {
            assert!(seen.insert(spec.key), "duplicate badge key {}", spec.key);
        }
        assert_eq!(BADGES.len(), 13);
    }

    #[test]
    fn award_karma_to_missing_user_fails() {
        let conn = store::open_in_memory().expect("open store");
        let error = award_karma(&conn, 999, 10, "test").expect_err("missing user");
        assert!(matches!(error, EngineError::UserNotFound(999)));
    }

    #[test]
    fn first_report_then_category_badge() {
        let conn = store::open_in_memory().expect("open store");
        let user = query::insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");

        query::insert_issue(&conn, user, &draft(IssueCategory::RoadMaintenance))
            .expect("insert issue");
        let earned = evaluate_badges(&conn, user).expect("evaluate");
        assert_eq!(earned, vec!["first_report".to_string()]);

        for _ in 0..4 {
            query::insert_issue(&conn, user, &draft(IssueCategory::RoadMaintenance))
                .expect("insert issue");
        }
        let earned = evaluate_badges(&conn, user).expect("evaluate");
        assert_eq!(earned, vec!["pothole_patriot".to_string()]);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let conn = store::open_in_memory().expect("open store");
        let user = query::insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");
        query::insert_issue(&conn, user, &draft(IssueCategory::Parks)).expect("insert issue");

        let first = evaluate_badges(&conn, user).expect("evaluate");
        assert_eq!(first, vec!["first_report".to_string()]);

        let second = evaluate_badges(&conn, user).expect("evaluate");
        assert!(second.is_empty(), "re-evaluation must not re-award");

        let badges = query::badges_for_user(&conn, user).expect("badges");
        assert_eq!(badges.len(), 1);
    }

    #[test]
    fn community_champion_at_500_karma() {
        let conn = store::open_in_memory().expect("open store");
        let user = query::insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");

        let earned = award_karma(&conn, user, 499, "seed").expect("award");
        assert!(earned.is_empty());

        let earned = award_karma(&conn, user, 1, "tip over").expect("award");
        assert_eq!(earned, vec!["community_champion".to_string()]);
    }

    #[test]
    fn karma_can_be_revoked() {
        let conn = store::open_in_memory().expect("open store");
        let user = query::insert_user(&conn, &NewUser::citizen("Ada", "ada@example.org"))
            .expect("insert user");

        award_karma(&conn, user, 20, "seed").expect("award");
        award_karma(&conn, user, -5, "revoke").expect("revoke");

        let loaded = query::get_user(&conn, user).expect("get user");
        assert_eq!(loaded.civic_karma, 15);
    }
}
