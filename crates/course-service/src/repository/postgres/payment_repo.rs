//! 支付订单仓储（PostgreSQL）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{NewPayment, Payment, PaymentStatus, PaymentTransition};
use crate::repository::traits::PaymentRepositoryTrait;

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PaymentRepository {
    async fn create(&self, payment: &NewPayment) -> Result<Payment> {
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (user_id, stream_id, promo_code_id, original_amount, discount_amount, amount,
                 currency, status, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.stream_id)
        .bind(payment.promo_code_id)
        .bind(payment.original_amount)
        .bind(payment.discount_amount)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status)
        .bind(payment.paid_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn transition(
        &self,
        id: i64,
        transition: &PaymentTransition,
    ) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET
                status = $3,
                external_id = COALESCE($4, external_id),
                failure_reason = COALESCE($5, failure_reason),
                paid_at = COALESCE($6, paid_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.from)
        .bind(transition.to)
        .bind(&transition.external_id)
        .bind(&transition.failure_reason)
        .bind(transition.paid_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_expired_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE status = $1 AND created_at < $2
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(PaymentStatus::Pending)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}
