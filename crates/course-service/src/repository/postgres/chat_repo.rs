//! 聊天消息仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{ChatMessage, NewChatMessage};
use crate::repository::traits::ChatRepositoryTrait;

pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepositoryTrait for ChatRepository {
    async fn create(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        let created = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (stream_id, user_id, text, reply_to_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(message.stream_id)
        .bind(message.user_id)
        .bind(&message.text)
        .bind(message.reply_to_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<ChatMessage>> {
        let message = sqlx::query_as::<_, ChatMessage>("SELECT * FROM chat_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    async fn list(
        &self,
        stream_id: i64,
        before_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM chat_messages
            WHERE stream_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(stream_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
