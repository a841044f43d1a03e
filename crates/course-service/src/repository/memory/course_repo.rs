//! 课程内容内存仓储

use async_trait::async_trait;
use chrono::Utc;

use super::{IdSequence, MemoryStore};
use crate::error::{ApiError, Result};
use crate::models::{
    BlockChanges, Course, CourseBlock, CourseChanges, CourseOutline, Lesson, LessonChanges,
    NewBlock, NewCourse, NewLesson, sort_blocks, sort_lessons,
};
use crate::repository::traits::CourseRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryCourseRepository {
    courses: MemoryStore<i64, Course>,
    blocks: MemoryStore<i64, CourseBlock>,
    lessons: MemoryStore<i64, Lesson>,
    course_seq: IdSequence,
    block_seq: IdSequence,
    lesson_seq: IdSequence,
}

impl MemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_block_position(&self, course_id: i64) -> i32 {
        self.blocks
            .list_by(|b| b.course_id == course_id)
            .iter()
            .map(|b| b.position + 1)
            .max()
            .unwrap_or(0)
    }

    fn next_lesson_position(&self, block_id: i64) -> i32 {
        self.lessons
            .list_by(|l| l.block_id == block_id)
            .iter()
            .map(|l| l.position + 1)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CourseRepositoryTrait for MemoryCourseRepository {
    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let now = Utc::now();
        let created = Course {
            id: self.course_seq.next(),
            author_id: course.author_id,
            title: course.title.clone(),
            description: course.description.clone(),
            cover_url: course.cover_url.clone(),
            price: course.price,
            currency: course.currency.clone(),
            status: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.courses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_course(&self, id: i64) -> Result<Option<Course>> {
        Ok(self.courses.get(&id))
    }

    async fn list_courses_by_author(
        &self,
        author_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>> {
        let mut courses = self.courses.list_by(|c| c.author_id == author_id);
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(courses
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_courses_by_author(&self, author_id: i64) -> Result<i64> {
        Ok(self.courses.count_by(|c| c.author_id == author_id) as i64)
    }

    async fn update_course(&self, id: i64, changes: &CourseChanges) -> Result<Option<Course>> {
        Ok(self.courses.update(&id, |c| {
            if let Some(title) = &changes.title {
                c.title = title.clone();
            }
            if let Some(description) = &changes.description {
                c.description = Some(description.clone());
            }
            if let Some(cover_url) = &changes.cover_url {
                c.cover_url = Some(cover_url.clone());
            }
            if let Some(price) = changes.price {
                c.price = price;
            }
            if let Some(currency) = &changes.currency {
                c.currency = currency.clone();
            }
            if let Some(status) = changes.status {
                c.status = status;
            }
            c.updated_at = Utc::now();
        }))
    }

    async fn delete_course(&self, id: i64) -> Result<bool> {
        if self.courses.remove(&id).is_none() {
            return Ok(false);
        }
        self.lessons.remove_by(|l| l.course_id == id);
        self.blocks.remove_by(|b| b.course_id == id);
        Ok(true)
    }

    async fn create_block(&self, block: &NewBlock) -> Result<CourseBlock> {
        if !self.courses.contains(&block.course_id) {
            return Err(ApiError::CourseNotFound(block.course_id));
        }
        let now = Utc::now();
        let created = CourseBlock {
            id: self.block_seq.next(),
            course_id: block.course_id,
            title: block.title.clone(),
            description: block.description.clone(),
            position: block
                .position
                .unwrap_or_else(|| self.next_block_position(block.course_id)),
            created_at: now,
            updated_at: now,
        };
        self.blocks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_block(&self, id: i64) -> Result<Option<CourseBlock>> {
        Ok(self.blocks.get(&id))
    }

    async fn list_blocks(&self, course_id: i64) -> Result<Vec<CourseBlock>> {
        let mut blocks = self.blocks.list_by(|b| b.course_id == course_id);
        sort_blocks(&mut blocks);
        Ok(blocks)
    }

    async fn update_block(&self, id: i64, changes: &BlockChanges) -> Result<Option<CourseBlock>> {
        Ok(self.blocks.update(&id, |b| {
            if let Some(title) = &changes.title {
                b.title = title.clone();
            }
            if let Some(description) = &changes.description {
                b.description = Some(description.clone());
            }
            if let Some(position) = changes.position {
                b.position = position;
            }
            b.updated_at = Utc::now();
        }))
    }

    async fn delete_block(&self, id: i64) -> Result<bool> {
        if self.blocks.remove(&id).is_none() {
            return Ok(false);
        }
        self.lessons.remove_by(|l| l.block_id == id);
        Ok(true)
    }

    async fn reorder_blocks(&self, course_id: i64, ids: &[i64]) -> Result<()> {
        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            self.blocks.update_if(id, |b| {
                if b.course_id != course_id {
                    return false;
                }
                b.position = position as i32;
                b.updated_at = now;
                true
            });
        }
        Ok(())
    }

    async fn create_lesson(&self, lesson: &NewLesson) -> Result<Lesson> {
        let block = self
            .blocks
            .get(&lesson.block_id)
            .ok_or(ApiError::BlockNotFound(lesson.block_id))?;
        let now = Utc::now();
        let created = Lesson {
            id: self.lesson_seq.next(),
            course_id: block.course_id,
            block_id: block.id,
            title: lesson.title.clone(),
            content: lesson.content.clone(),
            video_url: lesson.video_url.clone(),
            duration_minutes: lesson.duration_minutes,
            lesson_type: lesson.lesson_type,
            position: lesson
                .position
                .unwrap_or_else(|| self.next_lesson_position(block.id)),
            created_at: now,
            updated_at: now,
        };
        self.lessons.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>> {
        Ok(self.lessons.get(&id))
    }

    async fn list_lessons_by_block(&self, block_id: i64) -> Result<Vec<Lesson>> {
        let mut lessons = self.lessons.list_by(|l| l.block_id == block_id);
        sort_lessons(&mut lessons);
        Ok(lessons)
    }

    async fn list_lessons_by_course(&self, course_id: i64) -> Result<Vec<Lesson>> {
        let mut lessons = self.lessons.list_by(|l| l.course_id == course_id);
        sort_lessons(&mut lessons);
        Ok(lessons)
    }

    async fn update_lesson(&self, id: i64, changes: &LessonChanges) -> Result<Option<Lesson>> {
        Ok(self.lessons.update(&id, |l| {
            if let Some(title) = &changes.title {
                l.title = title.clone();
            }
            if let Some(content) = &changes.content {
                l.content = Some(content.clone());
            }
            if let Some(video_url) = &changes.video_url {
                l.video_url = Some(video_url.clone());
            }
            if let Some(duration) = changes.duration_minutes {
                l.duration_minutes = Some(duration);
            }
            if let Some(lesson_type) = changes.lesson_type {
                l.lesson_type = lesson_type;
            }
            if let Some(position) = changes.position {
                l.position = position;
            }
            l.updated_at = Utc::now();
        }))
    }

    async fn delete_lesson(&self, id: i64) -> Result<bool> {
        Ok(self.lessons.remove(&id).is_some())
    }

    async fn reorder_lessons(&self, block_id: i64, ids: &[i64]) -> Result<()> {
        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            self.lessons.update_if(id, |l| {
                if l.block_id != block_id {
                    return false;
                }
                l.position = position as i32;
                l.updated_at = now;
                true
            });
        }
        Ok(())
    }

    async fn course_outline(&self, course_id: i64) -> Result<Option<CourseOutline>> {
        let Some(course) = self.courses.get(&course_id) else {
            return Ok(None);
        };
        let blocks = self.blocks.list_by(|b| b.course_id == course_id);
        let lessons = self.lessons.list_by(|l| l.course_id == course_id);
        Ok(Some(CourseOutline::assemble(course, blocks, lessons)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LessonType;

    fn new_course() -> NewCourse {
        NewCourse {
            author_id: 7,
            title: "Rust".to_string(),
            description: None,
            cover_url: None,
            price: 1000,
            currency: "RUB".to_string(),
        }
    }

    fn new_lesson(block_id: i64, title: &str) -> NewLesson {
        NewLesson {
            block_id,
            title: title.to_string(),
            content: None,
            video_url: None,
            duration_minutes: None,
            lesson_type: LessonType::Text,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_positions_append_and_reorder() {
        let repo = MemoryCourseRepository::new();
        let course = repo.create_course(&new_course()).await.unwrap();

        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let block = repo
                .create_block(&NewBlock {
                    course_id: course.id,
                    title: title.to_string(),
                    description: None,
                    position: None,
                })
                .await
                .unwrap();
            ids.push(block.id);
        }
        let positions: Vec<i32> = repo
            .list_blocks(course.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);

        ids.reverse();
        repo.reorder_blocks(course.id, &ids).await.unwrap();
        let ordered: Vec<i64> = repo
            .list_blocks(course.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ordered, ids);
    }

    #[tokio::test]
    async fn test_lesson_inherits_course_and_cascade_delete() {
        let repo = MemoryCourseRepository::new();
        let course = repo.create_course(&new_course()).await.unwrap();
        let block = repo
            .create_block(&NewBlock {
                course_id: course.id,
                title: "intro".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let lesson = repo.create_lesson(&new_lesson(block.id, "hello")).await.unwrap();
        assert_eq!(lesson.course_id, course.id);

        let missing = repo.create_lesson(&new_lesson(999, "x")).await;
        assert!(matches!(missing, Err(ApiError::BlockNotFound(999))));

        let outline = repo.course_outline(course.id).await.unwrap().unwrap();
        assert_eq!(outline.blocks.len(), 1);
        assert_eq!(outline.blocks[0].lessons.len(), 1);

        assert!(repo.delete_course(course.id).await.unwrap());
        assert!(repo.get_lesson(lesson.id).await.unwrap().is_none());
        assert!(repo.get_block(block.id).await.unwrap().is_none());
        assert!(repo.course_outline(course.id).await.unwrap().is_none());
    }
}
