//! # Vote / fraud / verification rules
//!
//! Pure functions over a `CraftlandCode` snapshot. Each operation either
//! rejects without touching anything, or returns the next snapshot together
//! with the side effects the caller must run after persisting it.
//!
//! Moderation flags keep two invariants at all times:
//! `is_verified` implies `Approved`, `is_fraudulent` implies `Rejected`,
//! and the two flags are never set together.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::models::{
    Ballot, CodeStatus, CraftlandCode, ModerationPatch, NewCraftlandCode, NewReport,
    Notification, NotificationKind, Report, ReportStatus, VoteDirection,
};

pub const MAX_CODE_LEN: usize = 64;
pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_REPORT_REASON_LEN: usize = 500;

/// Thresholds of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRules {
    /// Minimum gap between two votes on the same code, whoever casts them.
    pub vote_cooldown: Duration,
    pub verify_net_votes: i64,
    pub fraud_downvotes: usize,
    /// Pending reports that flag a code as fraudulent.
    pub report_threshold: u32,
    pub max_recent_submissions: u64,
    pub submission_window: Duration,
    pub max_downvote_ratio: f64,
    pub max_recent_votes: u64,
    pub vote_window: Duration,
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            vote_cooldown: Duration::minutes(5),
            verify_net_votes: 10,
            fraud_downvotes: 5,
            report_threshold: 5,
            max_recent_submissions: 3,
            submission_window: Duration::hours(1),
            max_downvote_ratio: 0.7,
            max_recent_votes: 10,
            vote_window: Duration::minutes(5),
        }
    }
}

/// Recent activity of the voting user, gathered by the caller from the
/// repository over `submission_window` and `vote_window`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoterActivity {
    pub recent_submissions: u64,
    pub recent_votes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FraudSignal {
    SubmissionVelocity(u64),
    DownvoteRatio(f64),
    VotingVelocity(u64),
}

impl fmt::Display for FraudSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FraudSignal::SubmissionVelocity(n) => {
                write!(f, "{n} codes submitted within the last hour")
            }
            FraudSignal::DownvoteRatio(r) => {
                write!(f, "{:.0}% of votes on this code are downvotes", r * 100.0)
            }
            FraudSignal::VotingVelocity(n) => write!(f, "{n} votes cast within the last minutes"),
        }
    }
}

/// Side effects to run once the new snapshot is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Notify(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub is_now_verified: bool,
    pub verification_state_changed: bool,
    pub net_votes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report_count: u32,
    pub is_fraudulent: bool,
}

/// Result of an accepted rule application.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    pub code: CraftlandCode,
    pub outcome: T,
    pub commands: Vec<EngineCommand>,
}

pub fn validate_submission(input: &NewCraftlandCode) -> Result<()> {
    let code = input.code.trim();
    let title = input.title.trim();
    if code.is_empty() {
        return Err(DomainError::Validation("code is required".into()));
    }
    if title.is_empty() {
        return Err(DomainError::Validation("title is required".into()));
    }
    if code.chars().count() > MAX_CODE_LEN {
        return Err(DomainError::Validation(format!(
            "code must be at most {MAX_CODE_LEN} characters"
        )));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if input.description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DomainError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

/// Rejects while the per-code cooldown is running.
pub fn check_cooldown(code: &CraftlandCode, rules: &EngineRules, now: DateTime<Utc>) -> Result<()> {
    let Some(last) = code.last_vote_time else {
        return Ok(());
    };
    let remaining = last + rules.vote_cooldown - now;
    if remaining > Duration::zero() {
        let retry_after_secs = (remaining.num_milliseconds() + 999) / 1000;
        return Err(DomainError::Cooldown {
            retry_after_secs: retry_after_secs.max(1) as u64,
        });
    }
    Ok(())
}

/// Evaluates the fraud heuristics, returning the first one that trips.
pub fn check_fraud(
    code: &CraftlandCode,
    activity: &VoterActivity,
    rules: &EngineRules,
) -> Option<FraudSignal> {
    if activity.recent_submissions > rules.max_recent_submissions {
        return Some(FraudSignal::SubmissionVelocity(activity.recent_submissions));
    }

    let total = code.upvotes.len() + code.downvotes.len();
    if total > 0 {
        let ratio = code.downvotes.len() as f64 / total as f64;
        if ratio > rules.max_downvote_ratio {
            return Some(FraudSignal::DownvoteRatio(ratio));
        }
    }

    if activity.recent_votes > rules.max_recent_votes {
        return Some(FraudSignal::VotingVelocity(activity.recent_votes));
    }
    None
}

pub fn cast_vote(
    code: &CraftlandCode,
    user_id: Uuid,
    direction: VoteDirection,
    activity: &VoterActivity,
    rules: &EngineRules,
    now: DateTime<Utc>,
) -> Result<Transition<VoteOutcome>> {
    check_cooldown(code, rules, now)?;
    if let Some(signal) = check_fraud(code, activity, rules) {
        return Err(DomainError::SuspiciousActivity(signal.to_string()));
    }

    let mut next = code.clone();
    let mut commands = Vec::new();
    let was_verified = next.is_verified;

    next.upvotes.retain(|b| b.user_id != user_id);
    next.downvotes.retain(|b| b.user_id != user_id);
    let ballot = Ballot {
        user_id,
        cast_at: now,
    };
    match direction {
        VoteDirection::Up => next.upvotes.push(ballot),
        VoteDirection::Down => next.downvotes.push(ballot),
    }
    next.net_votes = next.upvotes.len() as i64 - next.downvotes.len() as i64;
    next.last_vote_time = Some(now);
    next.updated_at = now;

    let fraud_reached = next.downvotes.len() >= rules.fraud_downvotes;

    if next.net_votes >= rules.verify_net_votes
        && !next.is_verified
        && !next.is_fraudulent
        && !fraud_reached
    {
        next.is_verified = true;
        next.status = CodeStatus::Approved;
        commands.push(EngineCommand::Notify(notification(
            &next,
            NotificationKind::CodeVerified,
            "Craftland code verified",
            format!(
                "Your craftland code \"{}\" ({}) was verified by the community.",
                next.title, next.code
            ),
            now,
        )));
    }

    if fraud_reached {
        commands.extend(mark_fraudulent(
            &mut next,
            "received too many downvotes from the community",
            now,
        ));
    }

    let outcome = VoteOutcome {
        is_now_verified: next.is_verified,
        verification_state_changed: was_verified != next.is_verified,
        net_votes: next.net_votes,
    };
    Ok(Transition {
        code: next,
        outcome,
        commands,
    })
}

/// Flips `user_id`'s like. Returns the next snapshot and the new membership.
pub fn toggle_like(code: &CraftlandCode, user_id: Uuid, now: DateTime<Utc>) -> (CraftlandCode, bool) {
    let mut next = code.clone();
    let liked = if let Some(pos) = next.likes.iter().position(|u| *u == user_id) {
        next.likes.remove(pos);
        false
    } else {
        next.likes.push(user_id);
        true
    };
    next.updated_at = now;
    (next, liked)
}

pub fn add_report(
    code: &CraftlandCode,
    user_id: Uuid,
    input: NewReport,
    rules: &EngineRules,
    now: DateTime<Utc>,
) -> Result<Transition<ReportOutcome>> {
    let reason = input.reason.trim();
    if reason.is_empty() {
        return Err(DomainError::Validation("report reason is required".into()));
    }
    if reason.chars().count() > MAX_REPORT_REASON_LEN {
        return Err(DomainError::Validation(format!(
            "report reason must be at most {MAX_REPORT_REASON_LEN} characters"
        )));
    }
    if code.has_pending_report_from(user_id) {
        return Err(DomainError::Conflict(
            "you already have a pending report on this code".into(),
        ));
    }

    let mut next = code.clone();
    next.reports.push(Report {
        id: Uuid::new_v4(),
        user_id,
        reason: reason.to_string(),
        category: input.category,
        details: input.details.filter(|d| !d.trim().is_empty()),
        created_at: now,
        status: ReportStatus::Pending,
    });
    next.report_count = next.pending_report_count();
    next.last_reported_at = Some(now);
    next.updated_at = now;

    let mut commands = Vec::new();
    if next.report_count >= rules.report_threshold {
        commands.extend(mark_fraudulent(
            &mut next,
            "was reported by multiple users",
            now,
        ));
    }

    let outcome = ReportOutcome {
        report_count: next.report_count,
        is_fraudulent: next.is_fraudulent,
    };
    Ok(Transition {
        code: next,
        outcome,
        commands,
    })
}

/// Closes a report. Leaves the moderation flags alone.
pub fn resolve_report(
    code: &CraftlandCode,
    report_id: Uuid,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> Result<CraftlandCode> {
    if status == ReportStatus::Pending {
        return Err(DomainError::Validation(
            "a report can only be resolved or dismissed".into(),
        ));
    }
    let mut next = code.clone();
    let report = next
        .reports
        .iter_mut()
        .find(|r| r.id == report_id)
        .ok_or_else(|| DomainError::not_found("Report", report_id))?;
    report.status = status;
    next.report_count = next.pending_report_count();
    next.updated_at = now;
    Ok(next)
}

/// Admin override. Never subject to cooldown or fraud checks.
pub fn moderate(
    code: &CraftlandCode,
    patch: ModerationPatch,
    now: DateTime<Utc>,
) -> Result<CraftlandCode> {
    if patch.is_verified == Some(true) && patch.is_fraudulent == Some(true) {
        return Err(DomainError::Validation(
            "a code cannot be both verified and fraudulent".into(),
        ));
    }
    let mut next = code.clone();

    match patch.is_fraudulent {
        Some(true) => {
            next.is_fraudulent = true;
            next.is_verified = false;
        }
        Some(false) => next.is_fraudulent = false,
        None => {}
    }
    match patch.is_verified {
        Some(true) => {
            next.is_verified = true;
            next.is_fraudulent = false;
        }
        Some(false) => next.is_verified = false,
        None => {}
    }

    next.status = if next.is_fraudulent {
        CodeStatus::Rejected
    } else if next.is_verified {
        CodeStatus::Approved
    } else if patch == ModerationPatch::default() {
        next.status
    } else {
        CodeStatus::Pending
    };
    next.updated_at = now;
    Ok(next)
}

fn mark_fraudulent(
    code: &mut CraftlandCode,
    why: &str,
    now: DateTime<Utc>,
) -> Option<EngineCommand> {
    let newly_flagged = !code.is_fraudulent;
    code.is_fraudulent = true;
    code.is_verified = false;
    code.status = CodeStatus::Rejected;
    if !newly_flagged {
        return None;
    }
    Some(EngineCommand::Notify(notification(
        code,
        NotificationKind::CodeRejected,
        "Craftland code rejected",
        format!(
            "Your craftland code \"{}\" ({}) was rejected because it {why}.",
            code.title, code.code
        ),
        now,
    )))
}

fn notification(
    code: &CraftlandCode,
    kind: NotificationKind,
    title: &str,
    message: String,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id: code.submitted_by,
        kind,
        title: title.to_string(),
        message,
        link: Some(format!("/craftland-codes/{}", code.id)),
        read: false,
        created_at: now,
    }
}
