//! 支付订单内存仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IdSequence, MemoryStore};
use crate::error::Result;
use crate::models::{NewPayment, Payment, PaymentStatus, PaymentTransition};
use crate::repository::traits::PaymentRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryPaymentRepository {
    payments: MemoryStore<i64, Payment>,
    seq: IdSequence,
}

impl MemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepositoryTrait for MemoryPaymentRepository {
    async fn create(&self, payment: &NewPayment) -> Result<Payment> {
        let now = Utc::now();
        let created = Payment {
            id: self.seq.next(),
            user_id: payment.user_id,
            stream_id: payment.stream_id,
            promo_code_id: payment.promo_code_id,
            original_amount: payment.original_amount,
            discount_amount: payment.discount_amount,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status,
            external_id: None,
            failure_reason: None,
            paid_at: payment.paid_at,
            created_at: now,
            updated_at: now,
        };
        self.payments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Payment>> {
        Ok(self.payments.get(&id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .list_by(|p| p.external_id.as_deref() == Some(external_id))
            .into_iter()
            .next())
    }

    async fn transition(
        &self,
        id: i64,
        transition: &PaymentTransition,
    ) -> Result<Option<Payment>> {
        let applied = self.payments.update_if(&id, |p| {
            if p.status != transition.from {
                return false;
            }
            p.status = transition.to;
            if transition.external_id.is_some() {
                p.external_id = transition.external_id.clone();
            }
            if transition.failure_reason.is_some() {
                p.failure_reason = transition.failure_reason.clone();
            }
            if transition.paid_at.is_some() {
                p.paid_at = transition.paid_at;
            }
            p.updated_at = Utc::now();
            true
        });
        match applied {
            Some(true) => Ok(self.payments.get(&id)),
            _ => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Payment>> {
        let mut payments = self.payments.list_by(|p| p.user_id == user_id);
        payments.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(payments
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64> {
        Ok(self.payments.count_by(|p| p.user_id == user_id) as i64)
    }

    async fn list_expired_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>> {
        let mut payments = self
            .payments
            .list_by(|p| p.status == PaymentStatus::Pending && p.created_at < before);
        payments.sort_by_key(|p| p.id);
        payments.truncate(limit.max(0) as usize);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_payment(user_id: i64) -> NewPayment {
        NewPayment {
            user_id,
            stream_id: 1,
            promo_code_id: None,
            original_amount: 1000,
            discount_amount: 0,
            amount: 1000,
            currency: "RUB".to_string(),
            status: PaymentStatus::Pending,
            paid_at: None,
        }
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = MemoryPaymentRepository::new();
        let payment = repo.create(&new_payment(1)).await.unwrap();

        let transition = PaymentTransition {
            from: PaymentStatus::Pending,
            to: PaymentStatus::Succeeded,
            external_id: Some("tx-1".to_string()),
            failure_reason: None,
            paid_at: Some(Utc::now()),
        };
        let updated = repo.transition(payment.id, &transition).await.unwrap().unwrap();
        assert_eq!(updated.status, PaymentStatus::Succeeded);
        assert_eq!(updated.external_id.as_deref(), Some("tx-1"));

        // 第二次使用相同的 from 不再生效
        assert!(repo.transition(payment.id, &transition).await.unwrap().is_none());

        let found = repo.get_by_external_id("tx-1").await.unwrap().unwrap();
        assert_eq!(found.id, payment.id);
    }

    #[tokio::test]
    async fn test_list_expired_pending() {
        let repo = MemoryPaymentRepository::new();
        let old = repo.create(&new_payment(1)).await.unwrap();
        repo.create(&new_payment(2)).await.unwrap();

        let expired = repo
            .list_expired_pending(Utc::now() + Duration::seconds(1), 1)
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, old.id);

        let none = repo
            .list_expired_pending(old.created_at - Duration::seconds(1), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
