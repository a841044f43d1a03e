//! 聊天消息内存仓储

use async_trait::async_trait;
use chrono::Utc;

use super::{IdSequence, MemoryStore};
use crate::error::Result;
use crate::models::{ChatMessage, NewChatMessage};
use crate::repository::traits::ChatRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryChatRepository {
    messages: MemoryStore<i64, ChatMessage>,
    seq: IdSequence,
}

impl MemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepositoryTrait for MemoryChatRepository {
    async fn create(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        let created = ChatMessage {
            id: self.seq.next(),
            stream_id: message.stream_id,
            user_id: message.user_id,
            text: message.text.clone(),
            reply_to_id: message.reply_to_id,
            created_at: Utc::now(),
        };
        self.messages.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<ChatMessage>> {
        Ok(self.messages.get(&id))
    }

    async fn list(
        &self,
        stream_id: i64,
        before_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = self.messages.list_by(|m| {
            m.stream_id == stream_id && before_id.is_none_or(|before| m.id < before)
        });
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        messages.truncate(limit.max(0) as usize);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_newest_first_with_cursor() {
        let repo = MemoryChatRepository::new();
        for i in 0..5 {
            repo.create(&NewChatMessage {
                stream_id: 1,
                user_id: 1,
                text: format!("msg {i}"),
                reply_to_id: None,
            })
            .await
            .unwrap();
        }
        repo.create(&NewChatMessage {
            stream_id: 2,
            user_id: 1,
            text: "other".to_string(),
            reply_to_id: None,
        })
        .await
        .unwrap();

        let page: Vec<i64> = repo.list(1, None, 2).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(page, vec![5, 4]);

        let page: Vec<i64> = repo.list(1, Some(4), 10).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(page, vec![3, 2, 1]);
    }
}
