//! 学习流内存仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IdSequence, MemoryStore};
use crate::error::Result;
use crate::models::{Enrollment, LessonSchedule, NewStream, Stream, StreamChanges, StreamStatus};
use crate::repository::traits::StreamRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryStreamRepository {
    streams: MemoryStore<i64, Stream>,
    enrollments: MemoryStore<(i64, i64), Enrollment>,
    schedules: MemoryStore<(i64, i64), LessonSchedule>,
    seq: IdSequence,
}

impl MemoryStreamRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamRepositoryTrait for MemoryStreamRepository {
    async fn create_stream(&self, stream: &NewStream) -> Result<Stream> {
        let now = Utc::now();
        let created = Stream {
            id: self.seq.next(),
            course_id: stream.course_id,
            name: stream.name.clone(),
            start_date: stream.start_date,
            end_date: stream.end_date,
            price: stream.price,
            currency: stream.currency.clone(),
            max_students: stream.max_students,
            notify_on_release: stream.notify_on_release,
            timezone: stream.timezone.clone(),
            status: StreamStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.streams.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_stream(&self, id: i64) -> Result<Option<Stream>> {
        Ok(self.streams.get(&id))
    }

    async fn list_streams_by_course(&self, course_id: i64) -> Result<Vec<Stream>> {
        let mut streams = self.streams.list_by(|s| s.course_id == course_id);
        streams.sort_by_key(|s| (s.start_date, s.id));
        Ok(streams)
    }

    async fn count_streams_by_course(&self, course_id: i64) -> Result<i64> {
        Ok(self.streams.count_by(|s| s.course_id == course_id) as i64)
    }

    async fn update_stream(&self, id: i64, changes: &StreamChanges) -> Result<Option<Stream>> {
        Ok(self.streams.update(&id, |s| {
            if let Some(name) = &changes.name {
                s.name = name.clone();
            }
            if let Some(start_date) = changes.start_date {
                s.start_date = start_date;
            }
            if let Some(end_date) = changes.end_date {
                s.end_date = Some(end_date);
            }
            if let Some(price) = changes.price {
                s.price = price;
            }
            if let Some(currency) = &changes.currency {
                s.currency = currency.clone();
            }
            if let Some(max_students) = changes.max_students {
                s.max_students = Some(max_students);
            }
            if let Some(notify) = changes.notify_on_release {
                s.notify_on_release = notify;
            }
            if let Some(timezone) = &changes.timezone {
                s.timezone = Some(timezone.clone());
            }
            if let Some(status) = changes.status {
                s.status = status;
            }
            s.updated_at = Utc::now();
        }))
    }

    async fn transition_status(
        &self,
        id: i64,
        from: StreamStatus,
        to: StreamStatus,
    ) -> Result<Option<Stream>> {
        let applied = self.streams.update_if(&id, |s| {
            if s.status != from {
                return false;
            }
            s.status = to;
            s.updated_at = Utc::now();
            true
        });
        match applied {
            Some(true) => Ok(self.streams.get(&id)),
            _ => Ok(None),
        }
    }

    async fn enroll(
        &self,
        stream_id: i64,
        user_id: i64,
        payment_id: Option<i64>,
    ) -> Result<Enrollment> {
        let (enrollment, _) = self.enrollments.get_or_insert_with((stream_id, user_id), || {
            Enrollment {
                stream_id,
                user_id,
                payment_id,
                enrolled_at: Utc::now(),
            }
        });
        Ok(enrollment)
    }

    async fn remove_enrollment(&self, stream_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.enrollments.remove(&(stream_id, user_id)).is_some())
    }

    async fn is_enrolled(&self, stream_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.enrollments.contains(&(stream_id, user_id)))
    }

    async fn list_enrolled_user_ids(&self, stream_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .enrollments
            .list_by(|e| e.stream_id == stream_id)
            .into_iter()
            .map(|e| e.user_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn count_enrollments(&self, stream_id: i64) -> Result<i64> {
        Ok(self.enrollments.count_by(|e| e.stream_id == stream_id) as i64)
    }

    async fn upsert_schedule(
        &self,
        stream_id: i64,
        lesson_id: i64,
        release_at: DateTime<Utc>,
    ) -> Result<LessonSchedule> {
        let key = (stream_id, lesson_id);
        let updated = self.schedules.update(&key, |s| {
            if s.release_at != release_at {
                s.release_at = release_at;
                s.released_at = None;
            }
        });
        if let Some(schedule) = updated {
            return Ok(schedule);
        }
        let schedule = LessonSchedule {
            stream_id,
            lesson_id,
            release_at,
            released_at: None,
        };
        self.schedules.insert(key, schedule.clone());
        Ok(schedule)
    }

    async fn list_schedules(&self, stream_id: i64) -> Result<Vec<LessonSchedule>> {
        let mut schedules = self.schedules.list_by(|s| s.stream_id == stream_id);
        schedules.sort_by_key(|s| (s.release_at, s.lesson_id));
        Ok(schedules)
    }

    async fn delete_schedule(&self, stream_id: i64, lesson_id: i64) -> Result<bool> {
        Ok(self.schedules.remove(&(stream_id, lesson_id)).is_some())
    }

    async fn claim_due_releases(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LessonSchedule>> {
        let mut candidates = self
            .schedules
            .list_by(|s| s.released_at.is_none() && s.release_at <= now);
        candidates.sort_by_key(|s| (s.release_at, s.stream_id, s.lesson_id));

        let mut claimed = Vec::new();
        for candidate in candidates {
            if claimed.len() as i64 >= limit {
                break;
            }
            let key = (candidate.stream_id, candidate.lesson_id);
            // 锁内二次检查，同一排期不会被两次领取
            let won = self.schedules.update_if(&key, |s| {
                if s.released_at.is_some() || s.release_at > now {
                    return false;
                }
                s.released_at = Some(now);
                true
            });
            if won == Some(true) {
                if let Some(schedule) = self.schedules.get(&key) {
                    claimed.push(schedule);
                }
            }
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_stream() -> NewStream {
        NewStream {
            course_id: 1,
            name: "Весна".to_string(),
            start_date: Utc::now(),
            end_date: None,
            price: 0,
            currency: "RUB".to_string(),
            max_students: None,
            notify_on_release: true,
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let repo = MemoryStreamRepository::new();
        let stream = repo.create_stream(&new_stream()).await.unwrap();

        let first = repo.enroll(stream.id, 42, Some(1)).await.unwrap();
        let second = repo.enroll(stream.id, 42, Some(2)).await.unwrap();
        assert_eq!(first.payment_id, second.payment_id);
        assert_eq!(repo.count_enrollments(stream.id).await.unwrap(), 1);

        assert!(repo.remove_enrollment(stream.id, 42).await.unwrap());
        assert!(!repo.is_enrolled(stream.id, 42).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enroll_keeps_first_payment() {
        let repo = std::sync::Arc::new(MemoryStreamRepository::new());
        let stream = repo.create_stream(&new_stream()).await.unwrap();

        let mut handles = Vec::new();
        for payment_id in 1..=16 {
            let repo = std::sync::Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.enroll(stream.id, 42, Some(payment_id)).await.unwrap()
            }));
        }
        let mut payment_ids = Vec::new();
        for handle in handles {
            payment_ids.push(handle.await.unwrap().payment_id);
        }
        payment_ids.dedup();
        assert_eq!(payment_ids.len(), 1);
        assert_eq!(repo.count_enrollments(stream.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transition_status_compare_and_set() {
        let repo = MemoryStreamRepository::new();
        let stream = repo.create_stream(&new_stream()).await.unwrap();

        let opened = repo
            .transition_status(stream.id, StreamStatus::Draft, StreamStatus::Open)
            .await
            .unwrap();
        assert_eq!(opened.unwrap().status, StreamStatus::Open);

        let stale = repo
            .transition_status(stream.id, StreamStatus::Draft, StreamStatus::Canceled)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_claim_due_releases_once() {
        let repo = MemoryStreamRepository::new();
        let now = Utc::now();
        repo.upsert_schedule(1, 10, now - Duration::minutes(5)).await.unwrap();
        repo.upsert_schedule(1, 11, now + Duration::hours(1)).await.unwrap();
        repo.upsert_schedule(2, 10, now - Duration::minutes(1)).await.unwrap();

        let claimed = repo.claim_due_releases(now, 1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!((claimed[0].stream_id, claimed[0].lesson_id), (1, 10));

        let claimed = repo.claim_due_releases(now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].stream_id, 2);

        assert!(repo.claim_due_releases(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_resets_release_marker() {
        let repo = MemoryStreamRepository::new();
        let now = Utc::now();
        repo.upsert_schedule(1, 10, now - Duration::minutes(5)).await.unwrap();
        assert_eq!(repo.claim_due_releases(now, 10).await.unwrap().len(), 1);

        let same = repo.upsert_schedule(1, 10, now - Duration::minutes(5)).await.unwrap();
        assert!(same.released_at.is_some());

        let moved = repo.upsert_schedule(1, 10, now + Duration::days(1)).await.unwrap();
        assert!(moved.released_at.is_none());
        assert_eq!(repo.list_schedules(1).await.unwrap().len(), 1);
    }
}
