use crate::{
    db::{
        errors::Result,
        models::plans::{PlanCreateDBRequest, PlanDBResponse, PlanUpdateDBRequest},
    },
    types::{PlanId, PriceBookId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};

#[derive(Debug, Clone, FromRow)]
struct PlanRow {
    id: PlanId,
    price_book_id: PriceBookId,
    name: String,
    price: Decimal,
    credits: Decimal,
    external_price_id: Option<String>,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanDBResponse {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            price_book_id: row.price_book_id,
            name: row.name,
            price: row.price,
            credits: row.credits,
            external_price_id: row.external_price_id,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PLAN_COLUMNS: &str =
    "id, price_book_id, name, price, credits, external_price_id, description, is_active, created_at, updated_at";

pub struct Plans<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Plans<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &PlanCreateDBRequest) -> Result<PlanDBResponse> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            r#"
            INSERT INTO plans (price_book_id, name, price, credits, external_price_id, description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(request.price_book_id)
        .bind(&request.name)
        .bind(request.price)
        .bind(request.credits)
        .bind(&request.external_price_id)
        .bind(&request.description)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(PlanDBResponse::from(row))
    }

    pub async fn get_by_id(&mut self, plan_id: PlanId) -> Result<Option<PlanDBResponse>> {
        let row = sqlx::query_as::<_, PlanRow>(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
            .bind(plan_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(PlanDBResponse::from))
    }

    pub async fn list(&mut self, price_book_id: Option<PriceBookId>, skip: i64, limit: i64) -> Result<Vec<PlanDBResponse>> {
        let rows = sqlx::query_as::<_, PlanRow>(&format!(
            r#"
            SELECT {PLAN_COLUMNS} FROM plans
            WHERE ($1::uuid IS NULL OR price_book_id = $1)
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(price_book_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(PlanDBResponse::from).collect())
    }

    pub async fn update(&mut self, plan_id: PlanId, request: &PlanUpdateDBRequest) -> Result<Option<PlanDBResponse>> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            r#"
            UPDATE plans
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                credits = COALESCE($4, credits),
                external_price_id = COALESCE($5, external_price_id),
                description = COALESCE($6, description),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan_id)
        .bind(&request.name)
        .bind(request.price)
        .bind(request.credits)
        .bind(&request.external_price_id)
        .bind(&request.description)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row.map(PlanDBResponse::from))
    }

    pub async fn delete(&mut self, plan_id: PlanId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(plan_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
