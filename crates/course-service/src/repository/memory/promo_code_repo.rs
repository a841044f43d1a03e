//! 促销码内存仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IdSequence, MemoryStore};
use crate::error::{ApiError, Result};
use crate::models::{NewPromoCode, PromoCode, PromoCodeChanges};
use crate::repository::traits::PromoCodeRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryPromoCodeRepository {
    promos: MemoryStore<i64, PromoCode>,
    /// (stream_id, code) -> id，保证同一学习流内促销码唯一
    codes: MemoryStore<(i64, String), i64>,
    seq: IdSequence,
}

impl MemoryPromoCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromoCodeRepositoryTrait for MemoryPromoCodeRepository {
    async fn create(&self, promo: &NewPromoCode) -> Result<PromoCode> {
        let id = self.seq.next();
        let (_, inserted) = self
            .codes
            .get_or_insert_with((promo.stream_id, promo.code.clone()), || id);
        if !inserted {
            return Err(ApiError::DuplicatePromoCode(promo.code.clone()));
        }
        let now = Utc::now();
        let created = PromoCode {
            id,
            stream_id: promo.stream_id,
            code: promo.code.clone(),
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
            max_uses: promo.max_uses,
            used_count: 0,
            expires_at: promo.expires_at,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.promos.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<PromoCode>> {
        Ok(self.promos.get(&id))
    }

    async fn get_by_code(&self, stream_id: i64, code: &str) -> Result<Option<PromoCode>> {
        Ok(self
            .promos
            .list_by(|p| p.stream_id == stream_id && p.code == code)
            .into_iter()
            .next())
    }

    async fn list_by_stream(&self, stream_id: i64) -> Result<Vec<PromoCode>> {
        let mut promos = self.promos.list_by(|p| p.stream_id == stream_id);
        promos.sort_by_key(|p| p.id);
        Ok(promos)
    }

    async fn update(&self, id: i64, changes: &PromoCodeChanges) -> Result<Option<PromoCode>> {
        Ok(self.promos.update(&id, |p| {
            if let Some(max_uses) = changes.max_uses {
                p.max_uses = Some(max_uses);
            }
            if let Some(expires_at) = changes.expires_at {
                p.expires_at = Some(expires_at);
            }
            if let Some(active) = changes.active {
                p.active = active;
            }
            p.updated_at = Utc::now();
        }))
    }

    async fn try_reserve(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let reserved = self.promos.update_if(&id, |p| {
            if p.check_available(now).is_err() {
                return false;
            }
            p.used_count += 1;
            p.updated_at = now;
            true
        });
        Ok(reserved == Some(true))
    }

    async fn release(&self, id: i64) -> Result<()> {
        self.promos.update(&id, |p| {
            p.used_count = (p.used_count - 1).max(0);
            p.updated_at = Utc::now();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiscountType;
    use std::sync::Arc;

    fn new_promo(max_uses: Option<i32>) -> NewPromoCode {
        NewPromoCode {
            stream_id: 1,
            code: "SPRING".to_string(),
            discount_type: DiscountType::Percent,
            discount_value: 10,
            max_uses,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_code_in_same_stream() {
        let repo = MemoryPromoCodeRepository::new();
        repo.create(&new_promo(None)).await.unwrap();
        let err = repo.create(&new_promo(None)).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicatePromoCode(code) if code == "SPRING"));

        let other_stream = NewPromoCode {
            stream_id: 2,
            ..new_promo(None)
        };
        assert!(repo.create(&other_stream).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_same_code() {
        let repo = Arc::new(MemoryPromoCodeRepository::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move { repo.create(&new_promo(None)).await }));
        }
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, ApiError::DuplicatePromoCode(_))),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(repo.list_by_stream(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reserve_respects_max_uses_under_concurrency() {
        let repo = Arc::new(MemoryPromoCodeRepository::new());
        let promo = repo.create(&new_promo(Some(3))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.try_reserve(promo.id, Utc::now()).await.unwrap()
            }));
        }
        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 3);
        assert_eq!(repo.get(promo.id).await.unwrap().unwrap().used_count, 3);
    }

    #[tokio::test]
    async fn test_release_floors_at_zero() {
        let repo = MemoryPromoCodeRepository::new();
        let promo = repo.create(&new_promo(Some(1))).await.unwrap();
        assert!(repo.try_reserve(promo.id, Utc::now()).await.unwrap());
        assert!(!repo.try_reserve(promo.id, Utc::now()).await.unwrap());

        repo.release(promo.id).await.unwrap();
        repo.release(promo.id).await.unwrap();
        assert_eq!(repo.get(promo.id).await.unwrap().unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_reserve_inactive_code_fails() {
        let repo = MemoryPromoCodeRepository::new();
        let promo = repo.create(&new_promo(None)).await.unwrap();
        repo.update(
            promo.id,
            &PromoCodeChanges {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!repo.try_reserve(promo.id, Utc::now()).await.unwrap());
        assert!(!repo.try_reserve(999, Utc::now()).await.unwrap());
    }
}
