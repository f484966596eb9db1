use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::issue::ParseEnumError;

/// The three account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Citizen,
    Admin,
    DepartmentStaff,
}

impl UserRole {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
            Self::DepartmentStaff => "department_staff",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "admin" => Ok(Self::Admin),
            "department_staff" => Ok(Self::DepartmentStaff),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

/// A registered account: citizen, admin, or department staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub civic_karma: i64,
    /// Home department for `department_staff`; `None` for other roles.
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Target of category routing; provisioned by admins ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

/// An earned achievement. Append-only; at most one per (user, key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub user_id: i64,
    pub badge_key: String,
    pub badge_name: String,
    pub badge_description: String,
    pub earned_at: DateTime<Utc>,
}

/// A persisted notification row. Created unread by the engine; the read
/// layer flips `is_read`, the core never deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub issue_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::UserRole;
    use std::str::FromStr;

    #[test]
    fn role_roundtrips() {
        for role in [UserRole::Citizen, UserRole::Admin, UserRole::DepartmentStaff] {
            assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
        assert_eq!(
            serde_json::to_string(&UserRole::DepartmentStaff).unwrap(),
            "\"department_staff\""
        );
        assert!(UserRole::from_str("moderator").is_err());
    }
}
