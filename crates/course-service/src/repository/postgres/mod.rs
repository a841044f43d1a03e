//! PostgreSQL 仓储实现
//!
//! 使用 SQLx 运行时查询，表结构见仓库根目录 `migrations/`

mod chat_repo;
mod course_repo;
mod notification_repo;
mod payment_repo;
mod promo_code_repo;
mod stream_repo;

pub use chat_repo::ChatRepository;
pub use course_repo::CourseRepository;
pub use notification_repo::NotificationRepository;
pub use payment_repo::PaymentRepository;
pub use promo_code_repo::PromoCodeRepository;
pub use stream_repo::StreamRepository;

#[cfg(test)]
mod tests {
    //! 需要真实数据库，运行方式：
    //! DATABASE_URL=postgres://... cargo test -p course-service -- --ignored

    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    use super::*;
    use crate::models::{DiscountType, NewCourse, NewPromoCode, NewStream};
    use crate::repository::traits::{
        CourseRepositoryTrait, PromoCodeRepositoryTrait, StreamRepositoryTrait,
    };

    async fn setup() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("../../migrations").run(&pool).await.expect("migrate");
        pool
    }

    async fn seed_stream(pool: &PgPool) -> i64 {
        let courses = CourseRepository::new(pool.clone());
        let course = courses
            .create_course(&NewCourse {
                author_id: 1,
                title: "integration".to_string(),
                description: None,
                cover_url: None,
                price: 1000,
                currency: "RUB".to_string(),
            })
            .await
            .unwrap();
        StreamRepository::new(pool.clone())
            .create_stream(&NewStream {
                course_id: course.id,
                name: "it".to_string(),
                start_date: Utc::now(),
                end_date: None,
                price: 1000,
                currency: "RUB".to_string(),
                max_students: None,
                notify_on_release: true,
                timezone: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_promo_reserve_limit() {
        let pool = setup().await;
        let stream_id = seed_stream(&pool).await;
        let repo = PromoCodeRepository::new(pool);

        let promo = repo
            .create(&NewPromoCode {
                stream_id,
                code: "ONCE".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: 100,
                max_uses: Some(1),
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(repo.try_reserve(promo.id, Utc::now()).await.unwrap());
        assert!(!repo.try_reserve(promo.id, Utc::now()).await.unwrap());
        repo.release(promo.id).await.unwrap();
        assert!(repo.try_reserve(promo.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_enroll_and_schedule_claim() {
        let pool = setup().await;
        let stream_id = seed_stream(&pool).await;
        let repo = StreamRepository::new(pool.clone());

        repo.enroll(stream_id, 5, None).await.unwrap();
        repo.enroll(stream_id, 5, None).await.unwrap();
        assert_eq!(repo.count_enrollments(stream_id).await.unwrap(), 1);

        let courses = CourseRepository::new(pool);
        let stream = repo.get_stream(stream_id).await.unwrap().unwrap();
        let block = courses
            .create_block(&crate::models::NewBlock {
                course_id: stream.course_id,
                title: "b".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let lesson = courses
            .create_lesson(&crate::models::NewLesson {
                block_id: block.id,
                title: "l".to_string(),
                content: None,
                video_url: None,
                duration_minutes: None,
                lesson_type: Default::default(),
                position: None,
            })
            .await
            .unwrap();

        let now = Utc::now();
        repo.upsert_schedule(stream_id, lesson.id, now - Duration::minutes(1))
            .await
            .unwrap();
        let claimed = repo.claim_due_releases(now, 100).await.unwrap();
        assert!(claimed.iter().any(|s| s.lesson_id == lesson.id));
        let again = repo.claim_due_releases(now, 100).await.unwrap();
        assert!(!again.iter().any(|s| s.lesson_id == lesson.id));
    }
}
