//! 促销码仓储（PostgreSQL）
//!
//! 名额占用通过单条带条件的 UPDATE 完成，并发下不会超出 max_uses

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{ApiError, Result};
use crate::models::{NewPromoCode, PromoCode, PromoCodeChanges};
use crate::repository::traits::PromoCodeRepositoryTrait;

pub struct PromoCodeRepository {
    pool: PgPool,
}

impl PromoCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromoCodeRepositoryTrait for PromoCodeRepository {
    async fn create(&self, promo: &NewPromoCode) -> Result<PromoCode> {
        let created = sqlx::query_as::<_, PromoCode>(
            r#"
            INSERT INTO promo_codes
                (stream_id, code, discount_type, discount_value, max_uses, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(promo.stream_id)
        .bind(&promo.code)
        .bind(promo.discount_type)
        .bind(promo.discount_value)
        .bind(promo.max_uses)
        .bind(promo.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::DuplicatePromoCode(promo.code.clone())
            }
            _ => ApiError::Database(e),
        })?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>("SELECT * FROM promo_codes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(promo)
    }

    async fn get_by_code(&self, stream_id: i64, code: &str) -> Result<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            "SELECT * FROM promo_codes WHERE stream_id = $1 AND code = $2",
        )
        .bind(stream_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    async fn list_by_stream(&self, stream_id: i64) -> Result<Vec<PromoCode>> {
        let promos = sqlx::query_as::<_, PromoCode>(
            "SELECT * FROM promo_codes WHERE stream_id = $1 ORDER BY id",
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(promos)
    }

    async fn update(&self, id: i64, changes: &PromoCodeChanges) -> Result<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            UPDATE promo_codes SET
                max_uses = COALESCE($2, max_uses),
                expires_at = COALESCE($3, expires_at),
                active = COALESCE($4, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.max_uses)
        .bind(changes.expires_at)
        .bind(changes.active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    async fn try_reserve(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE promo_codes
            SET used_count = used_count + 1, updated_at = $2
            WHERE id = $1
              AND active
              AND (expires_at IS NULL OR expires_at > $2)
              AND (max_uses IS NULL OR used_count < max_uses)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE promo_codes
            SET used_count = GREATEST(used_count - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
