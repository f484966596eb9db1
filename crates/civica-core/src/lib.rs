//! Issue lifecycle and civic engagement engine.
//!
//! Citizens report civic problems (potholes, broken streetlights, garbage),
//! community votes drive an urgency score, issues route to municipal
//! departments and staff, and a karma/badge engine rewards participation.
//!
//! The [`Engine`] façade owns a SQLite store and exposes one method per
//! logical action; each mutating method runs as a single transaction.
//!
//! ```no_run
//! use civica_core::{Engine, EngineConfig};
//! use civica_core::model::issue::{IssueCategory, IssueDraft, IssuePriority, VoteType};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = Engine::open(Path::new("civica.db"), EngineConfig::default())?;
//! let issue = engine.submit_issue(
//!     1,
//!     &IssueDraft {
//!         title: "Pothole on Main St".into(),
//!         description: "Deep pothole near the crosswalk".into(),
//!         category: IssueCategory::RoadMaintenance,
//!         priority: IssuePriority::High,
//!         latitude: Some(12.9716),
//!         longitude: Some(77.5946),
//!         address: Some("Main St & 4th".into()),
//!     },
//! )?;
//! engine.cast_vote(issue.id, 2, VoteType::Upvote)?;
//! let staff = engine.auto_assign(issue.id)?;
//! println!("assigned to {}", staff.name);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

pub use config::{EngineConfig, QueueConfig, RewardConfig};
pub use engine::Engine;
pub use error::{EngineError, ErrorCode, Result};
