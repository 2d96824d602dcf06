use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Ballot, CodeFilter, CraftlandCode, CraftlandRepo, DomainError, Page, Pagination, Report,
    Result,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    is_unique_violation, parse_enum, stale, to_i32, to_i64, to_u32, to_u64, DbResultExt, PgStore,
};
use crate::error::StorageError;

const CODE_COLUMNS: &str = "id, code, title, description, category, region, difficulty, \
    cover_image_id, submitted_by, upvotes, downvotes, net_votes, last_vote_time, is_verified, \
    is_fraudulent, status, likes, reports, report_count, last_reported_at, created_at, \
    updated_at, version";

#[derive(FromRow)]
struct CodeRow {
    id: Uuid,
    code: String,
    title: String,
    description: String,
    category: String,
    region: String,
    difficulty: String,
    cover_image_id: Option<String>,
    submitted_by: Uuid,
    upvotes: Json<Vec<Ballot>>,
    downvotes: Json<Vec<Ballot>>,
    net_votes: i64,
    last_vote_time: Option<DateTime<Utc>>,
    is_verified: bool,
    is_fraudulent: bool,
    status: String,
    likes: Json<Vec<Uuid>>,
    reports: Json<Vec<Report>>,
    report_count: i32,
    last_reported_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<CodeRow> for CraftlandCode {
    type Error = DomainError;

    fn try_from(row: CodeRow) -> Result<Self> {
        Ok(CraftlandCode {
            id: row.id,
            code: row.code,
            title: row.title,
            description: row.description,
            category: row.category,
            region: row.region,
            difficulty: row.difficulty,
            cover_image_id: row.cover_image_id,
            submitted_by: row.submitted_by,
            upvotes: row.upvotes.0,
            downvotes: row.downvotes.0,
            net_votes: row.net_votes,
            last_vote_time: row.last_vote_time,
            is_verified: row.is_verified,
            is_fraudulent: row.is_fraudulent,
            status: parse_enum("status", row.status)?,
            likes: row.likes.0,
            reports: row.reports.0,
            report_count: to_u32(row.report_count, "report_count")?,
            last_reported_at: row.last_reported_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: to_u64(row.version, "version")?,
        })
    }
}

#[async_trait]
impl CraftlandRepo for PgStore {
    async fn insert(&self, code: &CraftlandCode) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO craftland_codes (id, code, title, description, category, region, \
             difficulty, cover_image_id, submitted_by, upvotes, downvotes, net_votes, \
             last_vote_time, is_verified, is_fraudulent, status, likes, reports, report_count, \
             last_reported_at, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23)",
        )
        .bind(code.id)
        .bind(&code.code)
        .bind(&code.title)
        .bind(&code.description)
        .bind(&code.category)
        .bind(&code.region)
        .bind(&code.difficulty)
        .bind(&code.cover_image_id)
        .bind(code.submitted_by)
        .bind(Json(&code.upvotes))
        .bind(Json(&code.downvotes))
        .bind(code.net_votes)
        .bind(code.last_vote_time)
        .bind(code.is_verified)
        .bind(code.is_fraudulent)
        .bind(code.status.as_str())
        .bind(Json(&code.likes))
        .bind(Json(&code.reports))
        .bind(to_i32(code.report_count, "report_count")?)
        .bind(code.last_reported_at)
        .bind(code.created_at)
        .bind(code.updated_at)
        .bind(to_i64(code.version, "version")?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::Conflict(format!(
                "code {} was already submitted",
                code.code
            ))),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<CraftlandCode>> {
        let row: Option<CodeRow> =
            sqlx::query_as(&format!("SELECT {CODE_COLUMNS} FROM craftland_codes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .db()?;
        row.map(CraftlandCode::try_from).transpose()
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM craftland_codes WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .db()?;
        Ok(exists)
    }

    async fn save(&self, code: &CraftlandCode) -> Result<CraftlandCode> {
        let row: Option<CodeRow> = sqlx::query_as(&format!(
            "UPDATE craftland_codes SET title = $3, description = $4, category = $5, \
             region = $6, difficulty = $7, cover_image_id = $8, upvotes = $9, downvotes = $10, \
             net_votes = $11, last_vote_time = $12, is_verified = $13, is_fraudulent = $14, \
             status = $15, likes = $16, reports = $17, report_count = $18, \
             last_reported_at = $19, updated_at = $20, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(code.id)
        .bind(to_i64(code.version, "version")?)
        .bind(&code.title)
        .bind(&code.description)
        .bind(&code.category)
        .bind(&code.region)
        .bind(&code.difficulty)
        .bind(&code.cover_image_id)
        .bind(Json(&code.upvotes))
        .bind(Json(&code.downvotes))
        .bind(code.net_votes)
        .bind(code.last_vote_time)
        .bind(code.is_verified)
        .bind(code.is_fraudulent)
        .bind(code.status.as_str())
        .bind(Json(&code.likes))
        .bind(Json(&code.reports))
        .bind(to_i32(code.report_count, "report_count")?)
        .bind(code.last_reported_at)
        .bind(code.updated_at)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        match row {
            Some(row) => row.try_into(),
            None if CraftlandRepo::get(self, code.id).await?.is_some() => {
                Err(stale("craftland code"))
            }
            None => Err(DomainError::not_found("CraftlandCode", code.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM craftland_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .db()?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &CodeFilter, page: Pagination) -> Result<Page<CraftlandCode>> {
        let status = filter.status.map(|s| s.as_str());
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM craftland_codes \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::uuid IS NULL OR submitted_by = $2)",
        )
        .bind(status)
        .bind(filter.submitted_by)
        .fetch_one(&self.pool)
        .await
        .db()?;

        let rows: Vec<CodeRow> = sqlx::query_as(&format!(
            "SELECT {CODE_COLUMNS} FROM craftland_codes \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::uuid IS NULL OR submitted_by = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(filter.submitted_by)
        .bind(to_i64(page.limit, "limit")?)
        .bind(to_i64(page.offset, "offset")?)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(CraftlandCode::try_from)
                .collect::<Result<_>>()?,
            total: to_u64(total, "count")?,
            offset: page.offset,
            limit: page.limit,
        })
    }

    async fn count_submissions_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM craftland_codes WHERE submitted_by = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .db()?;
        to_u64(count, "count")
    }

    async fn count_votes_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM craftland_codes c, \
             jsonb_array_elements(c.upvotes || c.downvotes) AS b \
             WHERE (b ->> 'user_id')::uuid = $1 AND (b ->> 'cast_at')::timestamptz >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .db()?;
        to_u64(count, "count")
    }
}
