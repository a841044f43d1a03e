//! 学习流聊天

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::dto::{ChatHistoryQuery, SendChatMessageRequest};
use crate::error::{ApiError, Result};
use crate::models::{ChatMessage, NewChatMessage};
use crate::repository::{ChatRepositoryTrait, CourseRepositoryTrait, StreamRepositoryTrait};

use super::access::StreamAccess;

pub struct ChatService {
    chat: Arc<dyn ChatRepositoryTrait>,
    access: StreamAccess,
}

impl ChatService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
        chat: Arc<dyn ChatRepositoryTrait>,
    ) -> Self {
        Self {
            chat,
            access: StreamAccess::new(courses, streams),
        }
    }

    /// 发送消息，仅作者与已报名学员可用
    #[instrument(skip(self, req))]
    pub async fn send(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &SendChatMessageRequest,
    ) -> Result<ChatMessage> {
        self.access.require_member(stream_id, user_id).await?;

        // 回复的消息必须属于同一学习流
        if let Some(reply_to_id) = req.reply_to_id {
            let target = self.chat.get(reply_to_id).await?;
            if target.is_none_or(|m| m.stream_id != stream_id) {
                return Err(ApiError::MessageNotFound(reply_to_id));
            }
        }

        let message = self
            .chat
            .create(&NewChatMessage {
                stream_id,
                user_id,
                text: req.text.trim().to_string(),
                reply_to_id: req.reply_to_id,
            })
            .await?;
        debug!(message_id = message.id, stream_id, "Chat message sent");
        Ok(message)
    }

    /// 按时间倒序返回历史消息
    pub async fn history(
        &self,
        user_id: i64,
        stream_id: i64,
        query: &ChatHistoryQuery,
    ) -> Result<Vec<ChatMessage>> {
        self.access.require_member(stream_id, user_id).await?;
        self.chat
            .list(stream_id, query.before_id, query.limit.clamp(1, 100))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCourse, NewStream, Stream};
    use crate::repository::memory::{
        MemoryChatRepository, MemoryCourseRepository, MemoryStreamRepository,
    };
    use chrono::Utc;

    const AUTHOR: i64 = 1;
    const STUDENT: i64 = 2;
    const OUTSIDER: i64 = 3;

    async fn setup() -> (ChatService, Arc<MemoryStreamRepository>, Stream, Stream) {
        let courses = Arc::new(MemoryCourseRepository::new());
        let streams = Arc::new(MemoryStreamRepository::new());
        let course = courses
            .create_course(&NewCourse {
                author_id: AUTHOR,
                title: "Rust".to_string(),
                description: None,
                cover_url: None,
                price: 0,
                currency: "RUB".to_string(),
            })
            .await
            .unwrap();
        let mut created = Vec::new();
        for name in ["a", "b"] {
            created.push(
                streams
                    .create_stream(&NewStream {
                        course_id: course.id,
                        name: name.to_string(),
                        start_date: Utc::now(),
                        end_date: None,
                        price: 0,
                        currency: "RUB".to_string(),
                        max_students: None,
                        notify_on_release: false,
                        timezone: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let second = created.pop().unwrap();
        let first = created.pop().unwrap();
        streams.enroll(first.id, STUDENT, None).await.unwrap();

        let service = ChatService::new(courses, streams.clone(), Arc::new(MemoryChatRepository::new()));
        (service, streams, first, second)
    }

    fn message(text: &str, reply_to_id: Option<i64>) -> SendChatMessageRequest {
        SendChatMessageRequest {
            text: text.to_string(),
            reply_to_id,
        }
    }

    #[tokio::test]
    async fn test_members_can_chat() {
        let (service, _, stream, _) = setup().await;

        let question = service
            .send(STUDENT, stream.id, &message("  Когда следующий урок?  ", None))
            .await
            .unwrap();
        assert_eq!(question.text, "Когда следующий урок?");

        let answer = service
            .send(AUTHOR, stream.id, &message("Завтра", Some(question.id)))
            .await
            .unwrap();
        assert_eq!(answer.reply_to_id, Some(question.id));

        let err = service
            .send(OUTSIDER, stream.id, &message("hi", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_reply_must_be_in_same_stream() {
        let (service, _, first, second) = setup().await;
        let original = service
            .send(AUTHOR, second.id, &message("other stream", None))
            .await
            .unwrap();

        let err = service
            .send(STUDENT, first.id, &message("reply", Some(original.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MessageNotFound(id) if id == original.id));

        let err = service
            .send(STUDENT, first.id, &message("reply", Some(999)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MessageNotFound(999)));
    }

    #[tokio::test]
    async fn test_history_cursor() {
        let (service, _, stream, _) = setup().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                service
                    .send(STUDENT, stream.id, &message(&format!("m{}", i), None))
                    .await
                    .unwrap()
                    .id,
            );
        }

        let page = service
            .history(AUTHOR, stream.id, &ChatHistoryQuery { before_id: None, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let older = service
            .history(
                STUDENT,
                stream.id,
                &ChatHistoryQuery {
                    before_id: Some(ids[3]),
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(older.len(), 3);
        assert_eq!(older[0].id, ids[2]);

        assert!(matches!(
            service
                .history(OUTSIDER, stream.id, &ChatHistoryQuery { before_id: None, limit: 10 })
                .await,
            Err(ApiError::Forbidden(_))
        ));
    }
}
