use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The eight reportable issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    RoadMaintenance,
    Streetlight,
    Sanitation,
    WaterSupply,
    Electricity,
    Traffic,
    Parks,
    Other,
}

impl IssueCategory {
    pub const ALL: [Self; 8] = [
        Self::RoadMaintenance,
        Self::Streetlight,
        Self::Sanitation,
        Self::WaterSupply,
        Self::Electricity,
        Self::Traffic,
        Self::Parks,
        Self::Other,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::RoadMaintenance => "road_maintenance",
            Self::Streetlight => "streetlight",
            Self::Sanitation => "sanitation",
            Self::WaterSupply => "water_supply",
            Self::Electricity => "electricity",
            Self::Traffic => "traffic",
            Self::Parks => "parks",
            Self::Other => "other",
        }
    }
}

/// Lifecycle states of an issue.
///
/// `submitted` is initial; `resolved`, `closed`, and `rejected` are terminal
/// by convention. Forward-only order is not hard-enforced: any staff/admin
/// status update is accepted, and the timestamp stamping below is guarded by
/// "not already set" instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Submitted,
    Acknowledged,
    InProgress,
    Resolved,
    Closed,
    Rejected,
}

impl IssueStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Acknowledged => "acknowledged",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status marks the end of the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed | Self::Rejected)
    }

    /// Whether reaching this status implies the issue has been acknowledged.
    ///
    /// Used to stamp `acknowledged_at` the first time any of these is set.
    #[must_use]
    pub const fn implies_acknowledged(self) -> bool {
        matches!(
            self,
            Self::Acknowledged | Self::InProgress | Self::Resolved | Self::Closed
        )
    }
}

/// Reporter-declared priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for IssuePriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl IssuePriority {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// The two community vote kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Upvote,
    Confirm,
}

impl VoteType {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Confirm => "confirm",
        }
    }
}

/// Derived urgency ranking: upvotes weigh double, confirmations single.
#[must_use]
pub const fn urgency_score(upvotes: i64, confirmations: i64) -> i64 {
    upvotes * 2 + confirmations
}

/// All persisted fields for an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: IssueCategory,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub photo_urls: Vec<String>,
    pub upvotes: i64,
    pub confirmations: i64,
    pub urgency_score: i64,
    pub reporter_id: i64,
    pub assigned_to_id: Option<i64>,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Whether both coordinates are recorded.
    #[must_use]
    pub const fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Input fields for a new issue report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub category: IssueCategory,
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A single (issue, user, type) vote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// Immutable audit record of a status/comment change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdateRecord {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub status: IssueStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A citizen/staff comment on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for IssueCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "road_maintenance" => Ok(Self::RoadMaintenance),
            "streetlight" => Ok(Self::Streetlight),
            "sanitation" => Ok(Self::Sanitation),
            "water_supply" => Ok(Self::WaterSupply),
            "electricity" => Ok(Self::Electricity),
            "traffic" => Ok(Self::Traffic),
            "parks" => Ok(Self::Parks),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                expected: "category",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for IssueStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "submitted" => Ok(Self::Submitted),
            "acknowledged" => Ok(Self::Acknowledged),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for IssuePriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for VoteType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "upvote" => Ok(Self::Upvote),
            "confirm" => Ok(Self::Confirm),
            _ => Err(ParseEnumError {
                expected: "vote type",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IssueCategory, IssuePriority, IssueStatus, VoteType, urgency_score};
    use std::str::FromStr;

    #[test]
    fn enum_json_roundtrips() {
        assert_eq!(
            serde_json::to_string(&IssueCategory::RoadMaintenance).unwrap(),
            "\"road_maintenance\""
        );
        assert_eq!(
            serde_json::to_string(&IssueStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&IssuePriority::Urgent).unwrap(),
            "\"urgent\""
        );
        assert_eq!(
            serde_json::to_string(&VoteType::Confirm).unwrap(),
            "\"confirm\""
        );

        assert_eq!(
            serde_json::from_str::<IssueCategory>("\"water_supply\"").unwrap(),
            IssueCategory::WaterSupply
        );
        assert_eq!(
            serde_json::from_str::<IssueStatus>("\"submitted\"").unwrap(),
            IssueStatus::Submitted
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in IssueCategory::ALL {
            let rendered = value.to_string();
            assert_eq!(IssueCategory::from_str(&rendered).unwrap(), value);
        }

        for value in [
            IssueStatus::Submitted,
            IssueStatus::Acknowledged,
            IssueStatus::InProgress,
            IssueStatus::Resolved,
            IssueStatus::Closed,
            IssueStatus::Rejected,
        ] {
            let rendered = value.to_string();
            assert_eq!(IssueStatus::from_str(&rendered).unwrap(), value);
        }

        for value in [
            IssuePriority::Low,
            IssuePriority::Medium,
            IssuePriority::High,
            IssuePriority::Urgent,
        ] {
            let rendered = value.to_string();
            assert_eq!(IssuePriority::from_str(&rendered).unwrap(), value);
        }

        for value in [VoteType::Upvote, VoteType::Confirm] {
            let rendered = value.to_string();
            assert_eq!(VoteType::from_str(&rendered).unwrap(), value);
        }
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!(IssueCategory::from_str("graffiti").is_err());
        assert!(IssueStatus::from_str("pending").is_err());
        assert!(IssuePriority::from_str("critical").is_err());
        assert!(VoteType::from_str("downvote").is_err());
    }

    #[test]
    fn status_semantics() {
        assert!(IssueStatus::Resolved.is_terminal());
        assert!(IssueStatus::Closed.is_terminal());
        assert!(IssueStatus::Rejected.is_terminal());
        assert!(!IssueStatus::Submitted.is_terminal());
        assert!(!IssueStatus::InProgress.is_terminal());

        assert!(IssueStatus::Acknowledged.implies_acknowledged());
        assert!(IssueStatus::InProgress.implies_acknowledged());
        assert!(IssueStatus::Resolved.implies_acknowledged());
        assert!(IssueStatus::Closed.implies_acknowledged());
        assert!(!IssueStatus::Submitted.implies_acknowledged());
        assert!(!IssueStatus::Rejected.implies_acknowledged());
    }

    #[test]
    fn urgency_score_weighs_upvotes_double() {
        assert_eq!(urgency_score(0, 0), 0);
        assert_eq!(urgency_score(3, 2), 8);
        assert_eq!(urgency_score(1, 0), 2);
        assert_eq!(urgency_score(0, 1), 1);
    }
}
