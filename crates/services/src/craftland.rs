//! Craftland code service: submissions, votes, likes, reports and
//! moderation.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use domains::voting::{
    self, EngineCommand, EngineRules, ReportOutcome, VoteOutcome, VoterActivity,
};
use domains::{
    Actor, BlobStore, CodeFilter, CraftlandCode, CraftlandRepo, DomainError, ModerationPatch,
    NewCraftlandCode, NewReport, Notification, NotificationRepo, Page, Pagination, RateLimiter,
    ReportStatus, Result, VoteDirection,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{require_admin, require_owner_or_admin};

/// Upper bound for cover images.
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: usize,
}

pub struct CraftlandService {
    codes: Arc<dyn CraftlandRepo>,
    notifications: Arc<dyn NotificationRepo>,
    blobs: Arc<dyn BlobStore>,
    /// Throttles new submissions per user.
    submissions: Arc<dyn RateLimiter>,
    rules: EngineRules,
}

impl CraftlandService {
    pub fn new(
        codes: Arc<dyn CraftlandRepo>,
        notifications: Arc<dyn NotificationRepo>,
        blobs: Arc<dyn BlobStore>,
        submissions: Arc<dyn RateLimiter>,
        rules: EngineRules,
    ) -> Self {
        Self {
            codes,
            notifications,
            blobs,
            submissions,
            rules,
        }
    }

    pub fn rules(&self) -> &EngineRules {
        &self.rules
    }

    pub async fn submit(&self, actor: &Actor, input: NewCraftlandCode) -> Result<CraftlandCode> {
        voting::validate_submission(&input)?;

        if !self
            .submissions
            .check(&format!("craftland-submit:{}", actor.user_id))
            .await?
        {
            return Err(DomainError::RateLimited(
                "too many submissions, try again later".into(),
            ));
        }
        if self.codes.code_exists(input.code.trim()).await? {
            return Err(DomainError::Conflict(format!(
                "code {} was already submitted",
                input.code.trim()
            )));
        }

        let code = CraftlandCode::new(input, actor.user_id, Utc::now());
        self.codes.insert(&code).await?;
        info!(code_id = %code.id, user_id = %actor.user_id, "craftland code submitted");
        Ok(code)
    }

    pub async fn get(&self, id: Uuid) -> Result<CraftlandCode> {
        self.codes
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("CraftlandCode", id))
    }

    pub async fn list(&self, filter: &CodeFilter, page: Pagination) -> Result<Page<CraftlandCode>> {
        self.codes.list(filter, page).await
    }

    /// Moderation notices addressed to `actor`, newest first.
    pub async fn notifications(&self, actor: &Actor) -> Result<Vec<Notification>> {
        let mut inbox = self.notifications.list_for_user(actor.user_id).await?;
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inbox)
    }

    /// Casts or replaces `actor`'s vote. Rejections leave the code untouched.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cast_vote(
        &self,
        actor: &Actor,
        id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let code = self.get(id).await?;
        let now = Utc::now();

        // Cheap check first so a cooling-down code costs no activity queries.
        voting::check_cooldown(&code, &self.rules, now)?;

        let activity = VoterActivity {
            recent_submissions: self
                .codes
                .count_submissions_since(actor.user_id, now - self.rules.submission_window)
                .await?,
            recent_votes: self
                .codes
                .count_votes_since(actor.user_id, now - self.rules.vote_window)
                .await?,
        };

        let transition =
            voting::cast_vote(&code, actor.user_id, direction, &activity, &self.rules, now)
                .inspect_err(|e| {
                    if let DomainError::SuspiciousActivity(reason) = e {
                        warn!(code_id = %id, %reason, "vote blocked by fraud check");
                    }
                })?;

        self.codes.save(&transition.code).await?;
        if transition.outcome.verification_state_changed
            || transition.code.is_fraudulent != code.is_fraudulent
        {
            info!(
                code_id = %id,
                status = transition.code.status.as_str(),
                net_votes = transition.outcome.net_votes,
                "craftland code moderation state changed by votes"
            );
        }
        self.run(transition.commands).await;
        Ok(transition.outcome)
    }

    pub async fn toggle_like(&self, actor: &Actor, id: Uuid) -> Result<LikeOutcome> {
        let code = self.get(id).await?;
        let (next, liked) = voting::toggle_like(&code, actor.user_id, Utc::now());
        let saved = self.codes.save(&next).await?;
        Ok(LikeOutcome {
            liked,
            like_count: saved.likes.len(),
        })
    }

    pub async fn add_report(
        &self,
        actor: &Actor,
        id: Uuid,
        input: NewReport,
    ) -> Result<ReportOutcome> {
        let code = self.get(id).await?;
        let transition = voting::add_report(&code, actor.user_id, input, &self.rules, Utc::now())?;
        self.codes.save(&transition.code).await?;
        if transition.outcome.is_fraudulent && !code.is_fraudulent {
            info!(
                code_id = %id,
                reports = transition.outcome.report_count,
                "craftland code rejected by reports"
            );
        }
        self.run(transition.commands).await;
        Ok(transition.outcome)
    }

    pub async fn resolve_report(
        &self,
        actor: &Actor,
        id: Uuid,
        report_id: Uuid,
        status: ReportStatus,
    ) -> Result<CraftlandCode> {
        require_admin(actor)?;
        let code = self.get(id).await?;
        let next = voting::resolve_report(&code, report_id, status, Utc::now())?;
        self.codes.save(&next).await
    }

    /// Admin override of the moderation flags.
    pub async fn moderate(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ModerationPatch,
    ) -> Result<CraftlandCode> {
        require_admin(actor)?;
        let code = self.get(id).await?;
        let next = voting::moderate(&code, patch, Utc::now())?;
        let saved = self.codes.save(&next).await?;
        info!(
            code_id = %id,
            admin_id = %actor.user_id,
            status = saved.status.as_str(),
            "craftland code moderated"
        );
        Ok(saved)
    }

    /// Replaces the cover image. The previous blob is removed best-effort.
    pub async fn set_cover_image(
        &self,
        actor: &Actor,
        id: Uuid,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<CraftlandCode> {
        if content_type.type_() != mime::IMAGE {
            return Err(DomainError::Validation(format!(
                "cover must be an image, got {content_type}"
            )));
        }
        if data.is_empty() || data.len() > MAX_COVER_BYTES {
            return Err(DomainError::Validation(format!(
                "cover image must be between 1 byte and {MAX_COVER_BYTES} bytes"
            )));
        }

        let code = self.get(id).await?;
        require_owner_or_admin(actor, code.submitted_by)?;

        let blob_id = self.blobs.put(data, content_type).await?;
        let mut next = code.clone();
        let previous = next.cover_image_id.replace(blob_id.clone());
        next.updated_at = Utc::now();

        let saved = match self.codes.save(&next).await {
            Ok(saved) => saved,
            Err(e) => {
                self.delete_blob(&blob_id).await;
                return Err(e);
            }
        };
        if let Some(old) = previous {
            self.delete_blob(&old).await;
        }
        Ok(saved)
    }

    /// Deletes a code and, best-effort, its cover image.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let code = self.get(id).await?;
        require_owner_or_admin(actor, code.submitted_by)?;

        if !self.codes.delete(id).await? {
            return Err(DomainError::not_found("CraftlandCode", id));
        }
        info!(code_id = %id, user_id = %actor.user_id, "craftland code deleted");

        if let Some(blob_id) = &code.cover_image_id {
            self.delete_blob(blob_id).await;
        }
        Ok(())
    }

    async fn delete_blob(&self, blob_id: &str) {
        if let Err(e) = self.blobs.delete(blob_id).await {
            warn!(%blob_id, error = %e, "failed to delete blob");
        }
    }

    /// The snapshot is already saved here, so a failing command is logged
    /// rather than surfaced.
    async fn run(&self, commands: Vec<EngineCommand>) {
        for command in commands {
            match command {
                EngineCommand::Notify(notification) => {
                    if let Err(e) = self.notifications.push(&notification).await {
                        warn!(
                            user_id = %notification.user_id,
                            kind = notification.kind.as_str(),
                            error = %e,
                            "failed to deliver notification"
                        );
                    }
                }
            }
        }
    }
}
