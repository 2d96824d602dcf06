//! Request and response bodies. Everything on the wire is camelCase.

use chrono::{DateTime, Utc};
use domains::voting::{ReportOutcome, VoteOutcome};
use domains::{
    Actor, CodeStatus, CraftlandCode, ItemType, ModerationPatch, Notification, Order, OrderLine,
    OrderStatus, Pagination, Report, ReportStatus, VoteDirection,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PAGE_LIMIT: u64 = 100;
/// Storage offsets are signed 64-bit.
pub const MAX_PAGE_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListCodesQuery {
    pub status: Option<CodeStatus>,
    pub submitted_by: Option<Uuid>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl ListCodesQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            offset: self.offset.unwrap_or(defaults.offset).min(MAX_PAGE_OFFSET),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub is_now_verified: bool,
    pub verification_state_changed: bool,
    pub net_votes: i64,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(o: VoteOutcome) -> Self {
        Self {
            is_now_verified: o.is_now_verified,
            verification_state_changed: o.verification_state_changed,
            net_votes: o.net_votes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub report_count: u32,
    pub is_fraudulent: bool,
}

impl From<ReportOutcome> for ReportResponse {
    fn from(o: ReportOutcome) -> Self {
        Self {
            report_count: o.report_count,
            is_fraudulent: o.is_fraudulent,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    pub is_verified: Option<bool>,
    pub is_fraudulent: Option<bool>,
}

impl From<ModerationRequest> for ModerationPatch {
    fn from(r: ModerationRequest) -> Self {
        ModerationPatch {
            is_verified: r.is_verified,
            is_fraudulent: r.is_fraudulent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveReportRequest {
    pub status: ReportStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub category: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for ReportView {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            reason: r.reason.clone(),
            category: r.category.clone(),
            details: r.details.clone(),
            status: r.status,
            created_at: r.created_at,
        }
    }
}

/// A code as seen by one caller. Reporter identities are only shown to
/// admins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub region: String,
    pub difficulty: String,
    pub cover_image_id: Option<String>,
    pub submitted_by: Uuid,
    pub upvotes: usize,
    pub downvotes: usize,
    pub net_votes: i64,
    pub last_vote_time: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub is_fraudulent: bool,
    pub status: CodeStatus,
    pub like_count: usize,
    pub liked_by_me: bool,
    pub my_vote: Option<VoteDirection>,
    pub report_count: u32,
    pub last_reported_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<ReportView>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeResponse {
    pub fn for_viewer(code: &CraftlandCode, viewer: &Actor) -> Self {
        Self {
            id: code.id,
            code: code.code.clone(),
            title: code.title.clone(),
            description: code.description.clone(),
            category: code.category.clone(),
            region: code.region.clone(),
            difficulty: code.difficulty.clone(),
            cover_image_id: code.cover_image_id.clone(),
            submitted_by: code.submitted_by,
            upvotes: code.upvotes.len(),
            downvotes: code.downvotes.len(),
            net_votes: code.net_votes,
            last_vote_time: code.last_vote_time,
            is_verified: code.is_verified,
            is_fraudulent: code.is_fraudulent,
            status: code.status,
            like_count: code.likes.len(),
            liked_by_me: code.likes.contains(&viewer.user_id),
            my_vote: code.vote_of(viewer.user_id),
            report_count: code.report_count,
            last_reported_at: code.last_reported_at,
            reports: viewer
                .is_admin()
                .then(|| code.reports.iter().map(ReportView::from).collect()),
            created_at: code.created_at,
            updated_at: code.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub item_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub item_id: Uuid,
    pub name: String,
    pub item_type: ItemType,
    pub quantity: u32,
    pub price_at_purchase: i64,
    pub metadata: serde_json::Value,
}

impl From<&OrderLine> for OrderLineView {
    fn from(l: &OrderLine) -> Self {
        Self {
            item_id: l.item_id,
            name: l.name.clone(),
            item_type: l.item_type,
            quantity: l.quantity,
            price_at_purchase: l.price_at_purchase,
            metadata: l.metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub transaction_id: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub coin_balance_before: i64,
    pub coin_balance_after: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLineView>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_details: PaymentView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(o: &Order) -> Self {
        let p = &o.payment_details;
        Self {
            id: o.id,
            user_id: o.user_id,
            items: o.items.iter().map(OrderLineView::from).collect(),
            total_amount: o.total_amount,
            status: o.status,
            payment_details: PaymentView {
                transaction_id: p.transaction_id.clone(),
                method: p.method.clone(),
                timestamp: p.timestamp,
                coin_balance_before: p.coin_balance_before,
                coin_balance_after: p.coin_balance_after,
            },
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationResponse {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.as_str(),
            title: n.title.clone(),
            message: n.message.clone(),
            link: n.link.clone(),
            read: n.read,
            created_at: n.created_at,
        }
    }
}
