use std::fmt;

use crate::model::issue::{IssueCategory, VoteType};

/// Machine-readable error codes for the request layer to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DuplicateVote,
    VoteNotFound,
    Authorization,
    IssueNotFound,
    UserNotFound,
    Routing,
    NoStaffAvailable,
    InvalidEnumValue,
    ConfigParseError,
    Storage,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DuplicateVote => "E2001",
            Self::VoteNotFound => "E2002",
            Self::Authorization => "E2003",
            Self::IssueNotFound => "E2004",
            Self::UserNotFound => "E2005",
            Self::Routing => "E3001",
            Self::NoStaffAvailable => "E3002",
            Self::InvalidEnumValue => "E4001",
            Self::ConfigParseError => "E4002",
            Self::Storage => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DuplicateVote => "Vote already cast",
            Self::VoteNotFound => "Vote not found",
            Self::Authorization => "Not authorized for this action",
            Self::IssueNotFound => "Issue not found",
            Self::UserNotFound => "User not found",
            Self::Routing => "No department for issue category",
            Self::NoStaffAvailable => "No active staff in department",
            Self::InvalidEnumValue => "Invalid category/status/priority value",
            Self::ConfigParseError => "Config file parse error",
            Self::Storage => "Storage operation failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::DuplicateVote => Some("Each user may hold one vote of each type per issue."),
            Self::VoteNotFound => None,
            Self::Authorization => Some("Status and assignment changes require staff or admin."),
            Self::IssueNotFound | Self::UserNotFound => None,
            Self::Routing => {
                Some("Provision a department matching the category mapping table first.")
            }
            Self::NoStaffAvailable => {
                Some("Add an active department_staff user to the target department.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented enum values."),
            Self::ConfigParseError => Some("Fix syntax in the engine config TOML and retry."),
            Self::Storage => Some("Retry once. If persistent, check the store file and disk."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error taxonomy for engine operations.
///
/// Every variant except `Storage` is an expected, recoverable condition the
/// request layer translates into a user-facing response.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("user {user_id} already cast a {vote_type} vote on issue {issue_id}")]
    DuplicateVote {
        issue_id: i64,
        user_id: i64,
        vote_type: VoteType,
    },

    #[error("no {vote_type} vote by user {user_id} on issue {issue_id}")]
    VoteNotFound {
        issue_id: i64,
        user_id: i64,
        vote_type: VoteType,
    },

    #[error("user {user_id} is not authorized to {action}")]
    Authorization { user_id: i64, action: &'static str },

    #[error("issue {0} not found")]
    IssueNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("no department '{department}' provisioned for category {category}")]
    Routing {
        category: IssueCategory,
        department: &'static str,
    },

    #[error("no active staff available in department {department_id}")]
    NoStaffAvailable { department_id: i64 },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    /// Map to the stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateVote { .. } => ErrorCode::DuplicateVote,
            Self::VoteNotFound { .. } => ErrorCode::VoteNotFound,
            Self::Authorization { .. } => ErrorCode::Authorization,
            Self::IssueNotFound(_) => ErrorCode::IssueNotFound,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::Routing { .. } => ErrorCode::Routing,
            Self::NoStaffAvailable { .. } => ErrorCode::NoStaffAvailable,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{EngineError, ErrorCode};
    use crate::model::issue::VoteType;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::DuplicateVote,
            ErrorCode::VoteNotFound,
            ErrorCode::Authorization,
            ErrorCode::IssueNotFound,
            ErrorCode::UserNotFound,
            ErrorCode::Routing,
            ErrorCode::NoStaffAvailable,
            ErrorCode::InvalidEnumValue,
            ErrorCode::ConfigParseError,
            ErrorCode::Storage,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::DuplicateVote.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn engine_error_maps_to_code() {
        let err = EngineError::DuplicateVote {
            issue_id: 1,
            user_id: 7,
            vote_type: VoteType::Upvote,
        };
        assert_eq!(err.code(), ErrorCode::DuplicateVote);
        assert_eq!(
            err.to_string(),
            "user 7 already cast a upvote vote on issue 1"
        );

        assert_eq!(
            EngineError::IssueNotFound(42).code(),
            ErrorCode::IssueNotFound
        );
    }
}
