use crate::{
    db::{
        errors::Result,
        models::price_books::{PriceBookCreateDBRequest, PriceBookDBResponse, PriceBookUpdateDBRequest},
    },
    types::PriceBookId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};

#[derive(Debug, Clone, FromRow)]
struct PriceBookRow {
    id: PriceBookId,
    version_tag: String,
    price_per_credit: Decimal,
    effective_from: DateTime<Utc>,
    terms_of_service: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PriceBookRow> for PriceBookDBResponse {
    fn from(row: PriceBookRow) -> Self {
        Self {
            id: row.id,
            version_tag: row.version_tag,
            price_per_credit: row.price_per_credit,
            effective_from: row.effective_from,
            terms_of_service: row.terms_of_service,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRICE_BOOK_COLUMNS: &str = "id, version_tag, price_per_credit, effective_from, terms_of_service, created_at, updated_at";

pub struct PriceBooks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PriceBooks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &PriceBookCreateDBRequest) -> Result<PriceBookDBResponse> {
        let row = sqlx::query_as::<_, PriceBookRow>(&format!(
            r#"
            INSERT INTO price_books (version_tag, price_per_credit, effective_from, terms_of_service)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRICE_BOOK_COLUMNS}
            "#
        ))
        .bind(&request.version_tag)
        .bind(request.price_per_credit)
        .bind(request.effective_from)
        .bind(&request.terms_of_service)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(PriceBookDBResponse::from(row))
    }

    pub async fn get_by_id(&mut self, price_book_id: PriceBookId) -> Result<Option<PriceBookDBResponse>> {
        let row = sqlx::query_as::<_, PriceBookRow>(&format!("SELECT {PRICE_BOOK_COLUMNS} FROM price_books WHERE id = $1"))
            .bind(price_book_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(PriceBookDBResponse::from))
    }

    /// The catalog version in force: latest effective_from that is not in
    /// the future.
    pub async fn current(&mut self) -> Result<Option<PriceBookDBResponse>> {
        let row = sqlx::query_as::<_, PriceBookRow>(&format!(
            r#"
            SELECT {PRICE_BOOK_COLUMNS} FROM price_books
            WHERE effective_from <= NOW()
            ORDER BY effective_from DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row.map(PriceBookDBResponse::from))
    }

    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<PriceBookDBResponse>> {
        let rows = sqlx::query_as::<_, PriceBookRow>(&format!(
            "SELECT {PRICE_BOOK_COLUMNS} FROM price_books ORDER BY effective_from DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(PriceBookDBResponse::from).collect())
    }

    pub async fn update(&mut self, price_book_id: PriceBookId, request: &PriceBookUpdateDBRequest) -> Result<Option<PriceBookDBResponse>> {
        let row = sqlx::query_as::<_, PriceBookRow>(&format!(
            r#"
            UPDATE price_books
            SET price_per_credit = COALESCE($2, price_per_credit),
                effective_from = COALESCE($3, effective_from),
                terms_of_service = COALESCE($4, terms_of_service),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRICE_BOOK_COLUMNS}
            "#
        ))
        .bind(price_book_id)
        .bind(request.price_per_credit)
        .bind(request.effective_from)
        .bind(&request.terms_of_service)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row.map(PriceBookDBResponse::from))
    }

    pub async fn delete(&mut self, price_book_id: PriceBookId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM price_books WHERE id = $1")
            .bind(price_book_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::PgPool;
    use std::str::FromStr;

    fn book(tag: &str, effective_from: DateTime<Utc>) -> PriceBookCreateDBRequest {
        PriceBookCreateDBRequest {
            version_tag: tag.to_string(),
            price_per_credit: Decimal::from_str("0.10").unwrap(),
            effective_from,
            terms_of_service: "tos".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_current_picks_latest_effective(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut books = PriceBooks::new(&mut conn);

        let now = Utc::now();
        books.create(&book("v1", now - Duration::days(30))).await.expect("create failed");
        let v2 = books.create(&book("v2", now - Duration::days(1))).await.expect("create failed");
        // Future version must not be selected yet
        books.create(&book("v3", now + Duration::days(30))).await.expect("create failed");

        let current = books.current().await.expect("query failed").expect("a current book exists");
        assert_eq!(current.id, v2.id);
        assert_eq!(current.version_tag, "v2");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_current_none_when_all_future(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut books = PriceBooks::new(&mut conn);

        books
            .create(&book("future", Utc::now() + Duration::days(7)))
            .await
            .expect("create failed");
        assert!(books.current().await.expect("query failed").is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_version_tag_unique(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut books = PriceBooks::new(&mut conn);

        books.create(&book("v1", Utc::now())).await.expect("create failed");
        let result = books.create(&book("v1", Utc::now())).await;
        assert!(matches!(result, Err(crate::db::errors::DbError::UniqueViolation { .. })));
    }
}
