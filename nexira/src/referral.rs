//! Referral code assignment.
//!
//! Codes are derived from the user's display name where possible, with a
//! uuid-based fallback. Uniqueness is enforced by the database; on
//! collision we retry with a time-derived suffix rather than probing for
//! free codes up front.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::Users,
    },
    types::UserId,
};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::warn;

const CODE_SUFFIX: &str = "+nexira";
const MAX_ATTEMPTS: u32 = 5;

/// Lowercase, strip everything but alphanumerics, join words with hyphens.
fn slugify(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Base code before collision handling.
fn base_code(display_name: Option<&str>, user_id: UserId) -> String {
    match display_name.map(slugify) {
        Some(slug) if !slug.is_empty() => format!("{slug}{CODE_SUFFIX}"),
        _ => format!("nexira-{user_id}"),
    }
}

/// Assign a unique referral code to a freshly registered user, retrying
/// on collision with a millisecond-derived suffix. The final fallback of
/// `nexira-{id}-{millis}` cannot realistically collide.
pub async fn assign_unique_referral_code(
    db: &mut PgConnection,
    user_id: UserId,
    display_name: Option<&str>,
) -> Result<String> {
    let base = base_code(display_name, user_id);
    let mut users = Users::new(db);

    for attempt in 0..MAX_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            let millis = Utc::now().timestamp_millis().to_string();
            let tail = &millis[millis.len().saturating_sub(4)..];
            format!("{base}-{tail}{attempt}")
        };

        match users.set_referral_code(user_id, &candidate).await {
            Ok(()) => return Ok(candidate),
            Err(DbError::UniqueViolation { .. }) => {
                warn!(%user_id, candidate, attempt, "referral code collision, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    let fallback = format!("nexira-{user_id}-{}", Utc::now().timestamp_millis());
    users.set_referral_code(user_id, &fallback).await?;
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
        assert_eq!(slugify("  JANE   Q.  DOE  "), "jane-q-doe");
        assert_eq!(slugify("Ünïcode Náme!"), "ncode-nme");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_base_code_from_name() {
        let id = Uuid::new_v4();
        assert_eq!(base_code(Some("Jane Doe"), id), "jane-doe+nexira");
    }

    #[test]
    fn test_base_code_fallback() {
        let id = Uuid::new_v4();
        assert_eq!(base_code(None, id), format!("nexira-{id}"));
        assert_eq!(base_code(Some("!!!"), id), format!("nexira-{id}"));
    }

    async fn create_user(pool: &PgPool) -> UserId {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, role) VALUES ($1, $2, 'user')")
            .bind(id)
            .bind(format!("ref_{}@example.com", id.simple()))
            .execute(pool)
            .await
            .expect("Failed to create user");
        id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_assigns_name_based_code(pool: PgPool) {
        let user_id = create_user(&pool).await;
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        let code = assign_unique_referral_code(&mut conn, user_id, Some("Jane Doe"))
            .await
            .expect("assignment failed");
        assert_eq!(code, "jane-doe+nexira");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_collision_gets_suffixed_code(pool: PgPool) {
        let first = create_user(&pool).await;
        let second = create_user(&pool).await;
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        assign_unique_referral_code(&mut conn, first, Some("Jane Doe"))
            .await
            .expect("assignment failed");
        let code = assign_unique_referral_code(&mut conn, second, Some("Jane Doe"))
            .await
            .expect("assignment failed");

        assert_ne!(code, "jane-doe+nexira");
        assert!(code.starts_with("jane-doe+nexira-"), "got {code}");
    }
}
