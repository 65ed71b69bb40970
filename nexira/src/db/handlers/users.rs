use crate::{
    api::models::users::Role,
    db::{
        errors::Result,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    types::{PlanId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};

// Database entity model for a user row
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    password_hash: Option<String>,
    google_id: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    is_verified: bool,
    role: Role,
    referral_code: Option<String>,
    referred_by: Option<UserId>,
    credit_balance: Decimal,
    plan_id: Option<PlanId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserDBResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            google_id: row.google_id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            is_verified: row.is_verified,
            role: row.role,
            referral_code: row.referral_code,
            referred_by: row.referred_by,
            credit_balance: row.credit_balance,
            plan_id: row.plan_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, google_id, display_name, avatar_url, is_verified, \
     role, referral_code, referred_by, credit_balance, plan_id, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, google_id, display_name, avatar_url, is_verified, role, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.google_id)
        .bind(&request.display_name)
        .bind(&request.avatar_url)
        .bind(request.is_verified)
        .bind(request.role)
        .bind(request.referred_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(UserDBResponse::from(row))
    }

    pub async fn get_by_id(&mut self, user_id: UserId) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(UserDBResponse::from))
    }

    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(UserDBResponse::from))
    }

    pub async fn get_by_google_id(&mut self, google_id: &str) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"))
            .bind(google_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(UserDBResponse::from))
    }

    pub async fn get_by_referral_code(&mut self, code: &str) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(UserDBResponse::from))
    }

    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<UserDBResponse>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(UserDBResponse::from).collect())
    }

    pub async fn update(&mut self, user_id: UserId, request: &UserUpdateDBRequest) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                avatar_url = COALESCE($3, avatar_url),
                role = COALESCE($4, role),
                is_verified = COALESCE($5, is_verified),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.display_name)
        .bind(&request.avatar_url)
        .bind(request.role)
        .bind(request.is_verified)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row.map(UserDBResponse::from))
    }

    pub async fn update_password_hash(&mut self, user_id: UserId, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Attach Google identity details learned at first OAuth login.
    pub async fn link_google_identity(&mut self, user_id: UserId, google_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET google_id = $1, is_verified = TRUE, updated_at = NOW() WHERE id = $2")
            .bind(google_id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Set the referral code. Fails with UniqueViolation on collision; the
    /// caller retries with a disambiguated code.
    pub async fn set_referral_code(&mut self, user_id: UserId, code: &str) -> Result<()> {
        sqlx::query("UPDATE users SET referral_code = $1, updated_at = NOW() WHERE id = $2")
            .bind(code)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    pub async fn delete(&mut self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn new_user(email: String) -> UserCreateDBRequest {
        UserCreateDBRequest {
            email,
            password_hash: Some("hash".to_string()),
            google_id: None,
            display_name: Some("Test User".to_string()),
            avatar_url: None,
            is_verified: false,
            role: Role::User,
            referred_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_user(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);

        let email = format!("user_{}@example.com", Uuid::new_v4().simple());
        let created = users.create(&new_user(email.clone())).await.expect("Failed to create user");
        assert_eq!(created.email, email);
        assert_eq!(created.role, Role::User);
        assert_eq!(created.credit_balance, rust_decimal::Decimal::ZERO);
        assert!(created.referral_code.is_none());

        let fetched = users
            .get_by_email(&email)
            .await
            .expect("Failed to query")
            .expect("User should exist");
        assert_eq!(fetched.id, created.id);

        let by_id = users.get_by_id(created.id).await.expect("Failed to query");
        assert!(by_id.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);

        let email = format!("dup_{}@example.com", Uuid::new_v4().simple());
        users.create(&new_user(email.clone())).await.expect("Failed to create user");
        let result = users.create(&new_user(email)).await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_referral_code_unique(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);

        let a = users
            .create(&new_user(format!("a_{}@example.com", Uuid::new_v4().simple())))
            .await
            .expect("Failed to create user");
        let b = users
            .create(&new_user(format!("b_{}@example.com", Uuid::new_v4().simple())))
            .await
            .expect("Failed to create user");

        users.set_referral_code(a.id, "test-user+nexira").await.expect("Failed to set code");
        let result = users.set_referral_code(b.id, "test-user+nexira").await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));

        let found = users
            .get_by_referral_code("test-user+nexira")
            .await
            .expect("Failed to query")
            .expect("Owner should be found");
        assert_eq!(found.id, a.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);

        let user = users
            .create(&new_user(format!("u_{}@example.com", Uuid::new_v4().simple())))
            .await
            .expect("Failed to create user");

        let updated = users
            .update(
                user.id,
                &UserUpdateDBRequest {
                    display_name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to update")
            .expect("User should exist");

        assert_eq!(updated.display_name, Some("Renamed".to_string()));
        // Unspecified fields untouched
        assert_eq!(updated.role, Role::User);
        assert!(!updated.is_verified);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);

        let user = users
            .create(&new_user(format!("d_{}@example.com", Uuid::new_v4().simple())))
            .await
            .expect("Failed to create user");

        assert!(users.delete(user.id).await.expect("Failed to delete"));
        assert!(!users.delete(user.id).await.expect("Second delete should be a no-op"));
        assert!(users.get_by_id(user.id).await.expect("Failed to query").is_none());
    }
}
