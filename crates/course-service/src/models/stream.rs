//! 学习流（班期）相关实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::StreamStatus;

/// 学习流：课程的一期开班，拥有独立的价格、排期与通知设置
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    #[sqlx(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub price: i64,
    pub currency: String,
    #[sqlx(default)]
    pub max_students: Option<i32>,
    /// 课时开放时是否自动通知学员
    pub notify_on_release: bool,
    /// 展示用时区标签，所有时间均以 UTC 存储
    #[sqlx(default)]
    pub timezone: Option<String>,
    pub status: StreamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stream {
    /// 是否还有名额
    pub fn has_capacity(&self, enrolled: i64) -> bool {
        self.max_students
            .is_none_or(|max| enrolled < i64::from(max))
    }
}

/// 报名记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub stream_id: i64,
    pub user_id: i64,
    #[sqlx(default)]
    pub payment_id: Option<i64>,
    pub enrolled_at: DateTime<Utc>,
}

/// 课时排期：控制课时对某个学习流的学员何时可见
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LessonSchedule {
    pub stream_id: i64,
    pub lesson_id: i64,
    pub release_at: DateTime<Utc>,
    /// Worker 处理开放事件的时间，None 表示尚未处理
    #[sqlx(default)]
    pub released_at: Option<DateTime<Utc>>,
}

/// 新建学习流
#[derive(Debug, Clone)]
pub struct NewStream {
    pub course_id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub price: i64,
    pub currency: String,
    pub max_students: Option<i32>,
    pub notify_on_release: bool,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamChanges {
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub max_students: Option<i32>,
    pub notify_on_release: Option<bool>,
    pub timezone: Option<String>,
    pub status: Option<StreamStatus>,
}

/// 课时对学员的开放时间：有排期用排期时间，否则随学习流开始时间开放
pub fn lesson_open_at(
    schedule: Option<&LessonSchedule>,
    stream_start: DateTime<Utc>,
) -> DateTime<Utc> {
    schedule.map_or(stream_start, |s| s.release_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn stream(max_students: Option<i32>) -> Stream {
        let now = Utc::now();
        Stream {
            id: 1,
            course_id: 1,
            name: "Spring".to_string(),
            start_date: now,
            end_date: None,
            price: 0,
            currency: "RUB".to_string(),
            max_students,
            notify_on_release: true,
            timezone: None,
            status: StreamStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_has_capacity() {
        assert!(stream(None).has_capacity(10_000));
        assert!(stream(Some(2)).has_capacity(1));
        assert!(!stream(Some(2)).has_capacity(2));
    }

    #[test]
    fn test_lesson_open_at() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(lesson_open_at(None, start), start);

        let schedule = LessonSchedule {
            stream_id: 1,
            lesson_id: 2,
            release_at: start + Duration::days(7),
            released_at: None,
        };
        assert_eq!(lesson_open_at(Some(&schedule), start), start + Duration::days(7));
    }
}
