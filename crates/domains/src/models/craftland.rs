//! Craftland code domain model.
//!
//! A craftland code is a user-submitted map code. Its moderation state is
//! driven by community votes and reports, with admins able to override it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Pending => "pending",
            CodeStatus::Approved => "approved",
            CodeStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for CodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CodeStatus::Pending),
            "approved" => Ok(CodeStatus::Approved),
            "rejected" => Ok(CodeStatus::Rejected),
            other => Err(format!("unknown code status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// One user's vote on a code. The timestamp feeds the voting-velocity
/// heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ballot {
    pub user_id: Uuid,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub category: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CraftlandCode {
    pub id: Uuid,
    /// The in-game code players type; unique across all submissions.
    pub code: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub region: String,
    pub difficulty: String,
    /// Blob id of the cover image, if one was uploaded.
    pub cover_image_id: Option<String>,
    pub submitted_by: Uuid,

    pub upvotes: Vec<Ballot>,
    pub downvotes: Vec<Ballot>,
    pub net_votes: i64,
    pub last_vote_time: Option<DateTime<Utc>>,

    pub is_verified: bool,
    pub is_fraudulent: bool,
    pub status: CodeStatus,

    pub likes: Vec<Uuid>,

    pub reports: Vec<Report>,
    /// Number of reports still pending.
    pub report_count: u32,
    pub last_reported_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the repository on every successful save.
    pub version: u64,
}

impl CraftlandCode {
    /// Builds a freshly submitted, unmoderated code.
    pub fn new(input: NewCraftlandCode, submitted_by: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: input.code.trim().to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            category: input.category,
            region: input.region,
            difficulty: input.difficulty,
            cover_image_id: None,
            submitted_by,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            net_votes: 0,
            last_vote_time: None,
            is_verified: false,
            is_fraudulent: false,
            status: CodeStatus::Pending,
            likes: Vec::new(),
            reports: Vec::new(),
            report_count: 0,
            last_reported_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Which way `user_id` currently votes on this code, if at all.
    pub fn vote_of(&self, user_id: Uuid) -> Option<VoteDirection> {
        if self.upvotes.iter().any(|b| b.user_id == user_id) {
            Some(VoteDirection::Up)
        } else if self.downvotes.iter().any(|b| b.user_id == user_id) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub fn has_pending_report_from(&self, user_id: Uuid) -> bool {
        self.reports
            .iter()
            .any(|r| r.user_id == user_id && r.status == ReportStatus::Pending)
    }

    pub fn pending_report_count(&self) -> u32 {
        self.reports
            .iter()
            .filter(|r| r.status == ReportStatus::Pending)
            .count() as u32
    }

    /// Ballots cast by `user_id` on this code at or after `since`.
    pub fn ballots_by_since(&self, user_id: Uuid, since: DateTime<Utc>) -> usize {
        self.upvotes
            .iter()
            .chain(self.downvotes.iter())
            .filter(|b| b.user_id == user_id && b.cast_at >= since)
            .count()
    }
}

/// User input for a new submission.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewCraftlandCode {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub difficulty: String,
}

/// User input for a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub reason: String,
    pub category: String,
    pub details: Option<String>,
}

/// Admin override of the moderation flags. `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ModerationPatch {
    pub is_verified: Option<bool>,
    pub is_fraudulent: Option<bool>,
}

/// Listing filter for codes.
#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub status: Option<CodeStatus>,
    pub submitted_by: Option<Uuid>,
}
