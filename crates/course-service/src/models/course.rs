//! 课程内容实体
//!
//! 三层结构：Course（课程）-> CourseBlock（模块）-> Lesson（课时）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{CourseStatus, LessonType};

/// 课程
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    /// 作者的 Telegram 用户 ID
    pub author_id: i64,
    pub title: String,
    #[sqlx(default)]
    pub description: Option<String>,
    #[sqlx(default)]
    pub cover_url: Option<String>,
    /// 新建学习流的默认价格（最小货币单位）
    pub price: i64,
    pub currency: String,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_author(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }
}

/// 课程模块
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseBlock {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 排序位置，数值越小越靠前
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 课时
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub block_id: i64,
    pub title: String,
    #[sqlx(default)]
    pub content: Option<String>,
    #[sqlx(default)]
    pub video_url: Option<String>,
    #[sqlx(default)]
    pub duration_minutes: Option<i32>,
    pub lesson_type: LessonType,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建课程
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub author_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price: i64,
    pub currency: String,
}

/// 课程字段更新（None 表示保持不变）
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<CourseStatus>,
}

/// 新建模块
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// None 时追加到末尾
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
}

/// 新建课时
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub block_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub lesson_type: LessonType,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub lesson_type: Option<LessonType>,
    pub position: Option<i32>,
}

/// 按 position、id 排序，保证输出稳定
pub fn sort_blocks(blocks: &mut [CourseBlock]) {
    blocks.sort_by_key(|b| (b.position, b.id));
}

pub fn sort_lessons(lessons: &mut [Lesson]) {
    lessons.sort_by_key(|l| (l.position, l.id));
}

/// 课程大纲：课程 -> 模块 -> 课时
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutline {
    pub course: Course,
    pub blocks: Vec<BlockOutline>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOutline {
    #[serde(flatten)]
    pub block: CourseBlock,
    pub lessons: Vec<Lesson>,
}

impl CourseOutline {
    /// 由平铺的模块与课时组装大纲，两级均按 position、id 排序
    pub fn assemble(course: Course, mut blocks: Vec<CourseBlock>, mut lessons: Vec<Lesson>) -> Self {
        sort_blocks(&mut blocks);
        sort_lessons(&mut lessons);
        let blocks = blocks
            .into_iter()
            .map(|block| {
                let lessons = lessons
                    .iter()
                    .filter(|l| l.block_id == block.id)
                    .cloned()
                    .collect();
                BlockOutline { block, lessons }
            })
            .collect();
        Self { course, blocks }
    }
}

/// 检查 `ids` 是否恰好是 `existing` 的一个排列
pub fn is_permutation(existing: &[i64], ids: &[i64]) -> bool {
    if existing.len() != ids.len() {
        return false;
    }
    let mut a = existing.to_vec();
    let mut b = ids.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permutation() {
        assert!(is_permutation(&[1, 2, 3], &[3, 1, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2]));
        assert!(!is_permutation(&[1, 2, 3], &[1, 2, 2]));
        assert!(!is_permutation(&[1, 2], &[1, 4]));
        assert!(is_permutation(&[], &[]));
    }

    #[test]
    fn test_assemble_outline_orders_blocks_and_lessons() {
        let now = Utc::now();
        let course = Course {
            id: 1,
            author_id: 10,
            title: "Rust".to_string(),
            description: None,
            cover_url: None,
            price: 0,
            currency: "RUB".to_string(),
            status: CourseStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let block = |id, position| CourseBlock {
            id,
            course_id: 1,
            title: format!("block {id}"),
            description: None,
            position,
            created_at: now,
            updated_at: now,
        };
        let lesson = |id, block_id, position| Lesson {
            id,
            course_id: 1,
            block_id,
            title: format!("lesson {id}"),
            content: None,
            video_url: None,
            duration_minutes: None,
            lesson_type: LessonType::Text,
            position,
            created_at: now,
            updated_at: now,
        };

        let outline = CourseOutline::assemble(
            course,
            vec![block(2, 1), block(1, 0)],
            vec![lesson(3, 1, 1), lesson(4, 2, 0), lesson(5, 1, 0), lesson(6, 1, 0)],
        );
        let block_ids: Vec<i64> = outline.blocks.iter().map(|b| b.block.id).collect();
        assert_eq!(block_ids, vec![1, 2]);
        let lesson_ids: Vec<i64> = outline.blocks[0].lessons.iter().map(|l| l.id).collect();
        assert_eq!(lesson_ids, vec![5, 6, 3]);
        assert_eq!(outline.blocks[1].lessons.len(), 1);
    }
}
