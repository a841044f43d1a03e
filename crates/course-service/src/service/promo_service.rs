//! 促销码服务
//!
//! 促销码管理、报价，以及支付流程使用的名额占用与归还。
//! code 统一按大写存储与匹配。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_shared::observability::metrics;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::dto::{
    CreatePromoCodeRequest, PromoCodeDto, PromoQuoteDto, UpdatePromoCodeRequest,
    parse_optional_date,
};
use crate::error::{ApiError, Result};
use crate::models::{NewPromoCode, PromoCode, PromoCodeChanges, Stream, StreamStatus};
use crate::repository::{CourseRepositoryTrait, PromoCodeRepositoryTrait, StreamRepositoryTrait};

use super::access::StreamAccess;

/// 生成码使用的字符集，去掉了易混淆的 0/O、1/I
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GENERATED_CODE_LEN: usize = 8;
const GENERATE_ATTEMPTS: usize = 5;

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct PromoService {
    promos: Arc<dyn PromoCodeRepositoryTrait>,
    access: StreamAccess,
}

impl PromoService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
        promos: Arc<dyn PromoCodeRepositoryTrait>,
    ) -> Self {
        Self {
            promos,
            access: StreamAccess::new(courses, streams),
        }
    }

    #[instrument(skip(self, req))]
    pub async fn create(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &CreatePromoCodeRequest,
    ) -> Result<PromoCode> {
        self.access.require_author(stream_id, user_id).await?;
        let expires_at = parse_optional_date("expiresAt", req.expires_at.as_deref())?;

        let new_promo = |code: String| NewPromoCode {
            stream_id,
            code,
            discount_type: req.discount_type,
            discount_value: req.discount_value,
            max_uses: req.max_uses,
            expires_at,
        };

        let promo = match &req.code {
            Some(code) => self.promos.create(&new_promo(normalize_code(code))).await?,
            None => {
                let mut attempt = 0;
                loop {
                    attempt += 1;
                    match self.promos.create(&new_promo(generate_code())).await {
                        Err(ApiError::DuplicatePromoCode(code)) if attempt < GENERATE_ATTEMPTS => {
                            warn!(code = %code, "Generated promo code collided, retrying");
                        }
                        other => break other?,
                    }
                }
            }
        };

        info!(promo_id = promo.id, stream_id, code = %promo.code, "Promo code created");
        Ok(promo)
    }

    pub async fn list(&self, user_id: i64, stream_id: i64) -> Result<Vec<PromoCodeDto>> {
        self.access.require_author(stream_id, user_id).await?;
        Ok(self
            .promos
            .list_by_stream(stream_id)
            .await?
            .into_iter()
            .map(PromoCodeDto::from)
            .collect())
    }

    pub async fn update(
        &self,
        user_id: i64,
        promo_id: i64,
        req: &UpdatePromoCodeRequest,
    ) -> Result<PromoCode> {
        let promo = self
            .promos
            .get(promo_id)
            .await?
            .ok_or_else(|| ApiError::PromoCodeNotFound(promo_id.to_string()))?;
        self.access.require_author(promo.stream_id, user_id).await?;

        let changes = PromoCodeChanges {
            max_uses: req.max_uses,
            expires_at: parse_optional_date("expiresAt", req.expires_at.as_deref())?,
            active: req.active,
        };
        let updated = self
            .promos
            .update(promo_id, &changes)
            .await?
            .ok_or_else(|| ApiError::PromoCodeNotFound(promo_id.to_string()))?;

        info!(promo_id, "Promo code updated");
        Ok(updated)
    }

    async fn find_available(&self, stream_id: i64, code: &str, now: DateTime<Utc>) -> Result<PromoCode> {
        let code = normalize_code(code);
        let promo = self
            .promos
            .get_by_code(stream_id, &code)
            .await?
            .ok_or(ApiError::PromoCodeNotFound(code))?;
        promo.check_available(now)?;
        Ok(promo)
    }

    /// 计算折后价格，不占用名额
    pub async fn check(
        &self,
        user_id: i64,
        stream_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<PromoQuoteDto> {
        let (stream, course) = self.access.load(stream_id).await?;
        if stream.status == StreamStatus::Draft && !course.is_author(user_id) {
            return Err(ApiError::StreamNotFound(stream_id));
        }
        let promo = self.find_available(stream_id, code, now).await?;
        Ok(PromoQuoteDto {
            quote: promo.quote(stream.price),
            currency: stream.currency,
            remaining_uses: promo.remaining_uses(),
            code: promo.code,
        })
    }

    /// 原子占用一次名额
    ///
    /// 预检查给出具体的不可用原因；预检查通过但占用失败说明名额被并发用尽
    #[instrument(skip(self, stream))]
    pub async fn reserve(&self, stream: &Stream, code: &str, now: DateTime<Utc>) -> Result<PromoCode> {
        let promo = match self.find_available(stream.id, code, now).await {
            Ok(promo) => promo,
            Err(e) => {
                metrics::record_promo_redemption("rejected");
                return Err(e);
            }
        };

        if !self.promos.try_reserve(promo.id, now).await? {
            metrics::record_promo_redemption("rejected");
            let latest = self.promos.get(promo.id).await?.unwrap_or(promo);
            latest.check_available(now)?;
            return Err(ApiError::PromoCodeExhausted);
        }

        metrics::record_promo_redemption("reserved");
        info!(promo_id = promo.id, stream_id = stream.id, "Promo code reserved");
        Ok(promo)
    }

    /// 归还名额（支付失败、取消、超时或退款）
    pub async fn release(&self, promo_id: i64) -> Result<()> {
        self.promos.release(promo_id).await?;
        metrics::record_promo_redemption("released");
        info!(promo_id, "Promo code reservation released");
        Ok(())
    }
}
