//! 支付服务
//!
//! ## 订单状态机
//!
//! ```text
//! pending ──> succeeded ──> refunded
//!    │
//!    ├──> failed
//!    └──> canceled
//! ```
//!
//! 状态迁移都是比较并设置（CAS），并发回调只有一个能生效。
//! 促销码名额在创建订单时占用，订单失败、取消、超时或退款时归还。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use course_shared::config::PaymentsConfig;
use course_shared::observability::metrics;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::dto::{
    CreatePaymentRequest, PageResponse, PaginationParams, PaymentCallbackRequest,
    PaymentCreatedDto, parse_optional_date,
};
use crate::error::{ApiError, Result};
use crate::models::{NewPayment, Payment, PaymentStatus, PaymentTransition, PriceQuote};
use crate::repository::{CourseRepositoryTrait, PaymentRepositoryTrait, StreamRepositoryTrait};

use super::access::StreamAccess;
use super::promo_service::PromoService;
use super::stream_service::check_enrollable;

type HmacSha256 = Hmac<Sha256>;

const AMOUNT_MISMATCH_REASON: &str = "回调金额或币种与订单不一致";
const EXPIRED_REASON: &str = "支付超时";
const EXPIRY_BATCH: i64 = 100;

/// 计算回调签名：hex(HMAC-SHA256(secret, body))
pub fn sign_callback(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 常量时间比较签名
fn verify_callback_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    if secret.is_empty() {
        warn!("Payment callback secret is not configured, rejecting callback");
        return Err(ApiError::InvalidSignature);
    }
    let expected = hex::decode(signature.trim()).map_err(|_| ApiError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ApiError::InvalidSignature)
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepositoryTrait>,
    streams: Arc<dyn StreamRepositoryTrait>,
    promos: Arc<PromoService>,
    access: StreamAccess,
    callback_secret: String,
    reservation_ttl: Duration,
}

impl PaymentService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
        payments: Arc<dyn PaymentRepositoryTrait>,
        promos: Arc<PromoService>,
        config: &PaymentsConfig,
    ) -> Self {
        Self {
            access: StreamAccess::new(courses, streams.clone()),
            payments,
            streams,
            promos,
            callback_secret: config.callback_secret.clone(),
            reservation_ttl: Duration::seconds(config.reservation_ttl_secs),
        }
    }

    /// 创建支付订单
    ///
    /// 折后价格为 0 时订单直接成功并完成报名
    #[instrument(skip(self, req), fields(stream_id = req.stream_id))]
    pub async fn create_payment(
        &self,
        user_id: i64,
        req: &CreatePaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentCreatedDto> {
        let (stream, _course) = self.access.load(req.stream_id).await?;
        check_enrollable(self.streams.as_ref(), &stream, user_id).await?;

        let (quote, promo_code_id) = match req.promo_code.as_deref() {
            Some(code) => {
                let promo = self.promos.reserve(&stream, code, now).await?;
                (promo.quote(stream.price), Some(promo.id))
            }
            None => (PriceQuote::full(stream.price), None),
        };

        let free = quote.amount == 0;
        let new_payment = NewPayment {
            user_id,
            stream_id: stream.id,
            promo_code_id,
            original_amount: quote.original_amount,
            discount_amount: quote.discount_amount,
            amount: quote.amount,
            currency: stream.currency.clone(),
            status: if free {
                PaymentStatus::Succeeded
            } else {
                PaymentStatus::Pending
            },
            paid_at: free.then_some(now),
        };

        let payment = match self.payments.create(&new_payment).await {
            Ok(payment) => payment,
            Err(e) => {
                if let Some(promo_id) = promo_code_id {
                    self.release_promo(promo_id).await;
                }
                return Err(e);
            }
        };

        if free {
            self.streams
                .enroll(stream.id, user_id, Some(payment.id))
                .await?;
            info!(payment_id = payment.id, user_id, "Free payment succeeded, student enrolled");
        } else {
            info!(
                payment_id = payment.id,
                user_id,
                amount = payment.amount,
                currency = %payment.currency,
                "Payment created"
            );
        }
        metrics::record_payment(payment.status.as_str());

        Ok(PaymentCreatedDto {
            enrolled: free,
            return_url: req.return_url.clone(),
            payment,
        })
    }

    /// 处理支付渠道回调
    ///
    /// 签名校验通过后才解析请求体；重复回调返回当前订单，不产生副作用
    #[instrument(skip_all)]
    pub async fn handle_callback(
        &self,
        signature: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        verify_callback_signature(&self.callback_secret, body, signature)?;

        let req: PaymentCallbackRequest = serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("回调请求体无效: {}", e)))?;
        req.validate()?;

        let payment = self
            .payments
            .get(req.payment_id)
            .await?
            .ok_or(ApiError::PaymentNotFound(req.payment_id))?;

        check_external_id(&payment, &req.external_id)?;

        let requested: PaymentStatus = req.status.into();
        if self.is_repeated_callback(&payment, requested) {
            info!(payment_id = payment.id, status = payment.status.as_str(), "Repeated callback ignored");
            return Ok(payment);
        }
        if !payment.status.can_transition_to(requested) {
            return Err(ApiError::InvalidPaymentTransition {
                from: payment.status,
                to: requested,
            });
        }

        let amount_matches = req.amount == payment.amount
            && req.currency.eq_ignore_ascii_case(&payment.currency);
        let transition = match requested {
            PaymentStatus::Succeeded if !amount_matches => {
                warn!(
                    payment_id = payment.id,
                    expected = payment.amount,
                    received = req.amount,
                    currency = %req.currency,
                    "Callback amount mismatch, failing payment"
                );
                PaymentTransition {
                    from: payment.status,
                    to: PaymentStatus::Failed,
                    external_id: Some(req.external_id.clone()),
                    failure_reason: Some(AMOUNT_MISMATCH_REASON.to_string()),
                    paid_at: None,
                }
            }
            PaymentStatus::Succeeded => PaymentTransition {
                from: payment.status,
                to: requested,
                external_id: Some(req.external_id.clone()),
                failure_reason: None,
                paid_at: Some(parse_optional_date("paidAt", req.paid_at.as_deref())?.unwrap_or(now)),
            },
            _ => PaymentTransition {
                from: payment.status,
                to: requested,
                external_id: Some(req.external_id.clone()),
                failure_reason: req.reason.clone(),
                paid_at: None,
            },
        };

        let updated = match self.payments.transition(payment.id, &transition).await? {
            Some(updated) => updated,
            None => {
                // 并发回调已修改订单状态
                let current = self
                    .payments
                    .get(payment.id)
                    .await?
                    .ok_or(ApiError::PaymentNotFound(payment.id))?;
                check_external_id(&current, &req.external_id)?;
                if self.is_repeated_callback(&current, requested) {
                    return Ok(current);
                }
                return Err(ApiError::InvalidPaymentTransition {
                    from: current.status,
                    to: requested,
                });
            }
        };

        self.apply_effects(&updated).await?;
        metrics::record_payment(updated.status.as_str());
        info!(
            payment_id = updated.id,
            from = payment.status.as_str(),
            to = updated.status.as_str(),
            "Payment status changed"
        );
        Ok(updated)
    }

    fn is_repeated_callback(&self, payment: &Payment, requested: PaymentStatus) -> bool {
        payment.status == requested
            || (requested == PaymentStatus::Succeeded
                && payment.status == PaymentStatus::Failed
                && payment.failure_reason.as_deref() == Some(AMOUNT_MISMATCH_REASON))
    }

    async fn apply_effects(&self, payment: &Payment) -> Result<()> {
        match payment.status {
            PaymentStatus::Succeeded => {
                self.streams
                    .enroll(payment.stream_id, payment.user_id, Some(payment.id))
                    .await?;
                info!(payment_id = payment.id, user_id = payment.user_id, "Student enrolled after payment");
            }
            PaymentStatus::Failed | PaymentStatus::Canceled => {
                if let Some(promo_id) = payment.promo_code_id {
                    self.release_promo(promo_id).await;
                }
            }
            PaymentStatus::Refunded => {
                self.streams
                    .remove_enrollment(payment.stream_id, payment.user_id)
                    .await?;
                if let Some(promo_id) = payment.promo_code_id {
                    self.release_promo(promo_id).await;
                }
                info!(payment_id = payment.id, user_id = payment.user_id, "Enrollment revoked after refund");
            }
            PaymentStatus::Pending => {}
        }
        Ok(())
    }

    /// 归还名额失败只记录日志，不影响订单状态
    async fn release_promo(&self, promo_id: i64) {
        if let Err(e) = self.promos.release(promo_id).await {
            error!(promo_id, error = %e, "Failed to release promo code reservation");
        }
    }

    /// 订单只对本人可见
    pub async fn get_payment(&self, user_id: i64, id: i64) -> Result<Payment> {
        self.payments
            .get(id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or(ApiError::PaymentNotFound(id))
    }

    pub async fn list_my_payments(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> Result<PageResponse<Payment>> {
        let items = self
            .payments
            .list_by_user(user_id, params.limit(), params.offset())
            .await?;
        let total = self.payments.count_by_user(user_id).await?;
        Ok(PageResponse::new(items, total, params.page, params.limit()))
    }

    /// 取消超时的待支付订单并归还促销码名额，返回取消数量
    #[instrument(skip(self))]
    pub async fn expire_stale_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = now - self.reservation_ttl;
        let stale = self
            .payments
            .list_expired_pending(before, EXPIRY_BATCH)
            .await?;

        let mut canceled = 0;
        for payment in stale {
            let transition = PaymentTransition {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Canceled,
                external_id: None,
                failure_reason: Some(EXPIRED_REASON.to_string()),
                paid_at: None,
            };
            // 回调可能已抢先修改状态
            if let Some(updated) = self.payments.transition(payment.id, &transition).await? {
                self.apply_effects(&updated).await?;
                metrics::record_payment(updated.status.as_str());
                canceled += 1;
            }
        }

        if canceled > 0 {
            info!(canceled, "Expired stale pending payments");
        }
        Ok(canceled)
    }
}

/// 订单已绑定的交易号必须与回调一致
fn check_external_id(payment: &Payment, external_id: &str) -> Result<()> {
    match payment.external_id.as_deref() {
        Some(bound) if bound != external_id => {
            warn!(
                payment_id = payment.id,
                bound,
                received = %external_id,
                "Callback external id does not match payment"
            );
            Err(ApiError::PaymentConflict(format!(
                "订单 {} 已绑定交易号 {}",
                payment.id, bound
            )))
        }
        _ => Ok(()),
    }
}
