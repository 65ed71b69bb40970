use crate::{
    db::{
        errors::{DbError, Result},
        models::image_tasks::{ImageTaskCreateDBRequest, ImageTaskDBResponse, TaskStatus},
    },
    types::{ImageTaskId, PriceBookId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, PgConnection};

#[derive(Debug, Clone, FromRow)]
struct ImageTaskRow {
    id: ImageTaskId,
    user_id: UserId,
    status: TaskStatus,
    cost: Decimal,
    config: serde_json::Value,
    price_snapshot_id: PriceBookId,
    output_ref: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ImageTaskRow> for ImageTaskDBResponse {
    fn from(row: ImageTaskRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            cost: row.cost,
            config: row.config,
            price_snapshot_id: row.price_snapshot_id,
            output_ref: row.output_ref,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TASK_COLUMNS: &str =
    "id, user_id, status, cost, config, price_snapshot_id, output_ref, error, created_at, updated_at";

pub struct ImageTasks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ImageTasks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &ImageTaskCreateDBRequest) -> Result<ImageTaskDBResponse> {
        let row = sqlx::query_as::<_, ImageTaskRow>(&format!(
            r#"
            INSERT INTO image_tasks (user_id, status, cost, config, price_snapshot_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.status)
        .bind(request.cost)
        .bind(&request.config)
        .bind(request.price_snapshot_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(ImageTaskDBResponse::from(row))
    }

    pub async fn get_by_id(&mut self, task_id: ImageTaskId) -> Result<Option<ImageTaskDBResponse>> {
        let row = sqlx::query_as::<_, ImageTaskRow>(&format!("SELECT {TASK_COLUMNS} FROM image_tasks WHERE id = $1"))
            .bind(task_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(ImageTaskDBResponse::from))
    }

    pub async fn list(&mut self, user_id: Option<UserId>, skip: i64, limit: i64) -> Result<Vec<ImageTaskDBResponse>> {
        let rows = sqlx::query_as::<_, ImageTaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM image_tasks
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(ImageTaskDBResponse::from).collect())
    }

    pub async fn mark_completed(&mut self, task_id: ImageTaskId, output_ref: &str) -> Result<ImageTaskDBResponse> {
        self.transition(task_id, TaskStatus::Completed, Some(output_ref), None).await
    }

    pub async fn mark_failed(&mut self, task_id: ImageTaskId, error: &str) -> Result<ImageTaskDBResponse> {
        self.transition(task_id, TaskStatus::Failed, None, Some(error)).await
    }

    async fn transition(
        &mut self,
        task_id: ImageTaskId,
        to: TaskStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<ImageTaskDBResponse> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, TaskStatus>("SELECT status FROM image_tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        if !current.can_transition(to) {
            return Err(DbError::InvalidTransition {
                entity: "image task",
                from: current.to_string(),
                to: to.to_string(),
            });
        }

        let row = sqlx::query_as::<_, ImageTaskRow>(&format!(
            r#"
            UPDATE image_tasks
            SET status = $2,
                output_ref = COALESCE($3, output_ref),
                error = COALESCE($4, error),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(to)
        .bind(output_ref)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ImageTaskDBResponse::from(row))
    }
}
