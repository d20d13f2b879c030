//! # Redis 通知キュー
//!
//! Redis リストを使用した通知キューの実装。
//!
//! ## 設計方針
//!
//! - **LPUSH / BRPOP**: リストの左へ積み右から取り出す FIFO キュー
//! - **ConnectionManager**: 切断時に自動再接続するコネクション管理
//! - **JSON ペイロード**: `QueuedNotification` を JSON 文字列として格納
//!
//! ## 不正メッセージの扱い
//!
//! JSON として解釈できないメッセージは再試行しても失敗が確定しているため、
//! 警告ログを出して破棄する（キューには戻さない）。

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use super::{NotificationQueue, QueuedNotification};
use crate::error::InfraError;

/// 既定のキューキー名
pub const DEFAULT_QUEUE_KEY: &str = "stellarsplit:email_queue";

/// Redis リストを使用した通知キュー
pub struct RedisNotificationQueue {
   conn:          ConnectionManager,
   blocking_conn: ConnectionManager,
   key:           String,
}

impl RedisNotificationQueue {
   /// 新しい RedisNotificationQueue を作成する
   ///
   /// # 引数
   ///
   /// - `redis_url`: Redis 接続 URL（例: `redis://localhost:6379`）
   pub async fn new(redis_url: &str) -> Result<Self, InfraError> {
      Self::with_key(redis_url, DEFAULT_QUEUE_KEY).await
   }

   /// キューキー名を指定して作成する
   ///
   /// 複数環境が同じ Redis を共有する場合やテストでキーを分離する場合に使用する。
   pub async fn with_key(redis_url: &str, key: impl Into<String>) -> Result<Self, InfraError> {
      let client = redis::Client::open(redis_url)?;
      let conn = ConnectionManager::new(client.clone()).await?;
      // BRPOP はサーバー側で接続単位にブロックするため、
      // LPUSH / PING と接続を分ける
      let blocking_conn = ConnectionManager::new(client).await?;
      Ok(Self {
         conn,
         blocking_conn,
         key: key.into(),
      })
   }

   /// キューキー名を返す
   pub fn key(&self) -> &str {
      &self.key
   }
}

#[async_trait]
impl NotificationQueue for RedisNotificationQueue {
   async fn enqueue(&self, item: &QueuedNotification) -> Result<(), InfraError> {
      let payload = serde_json::to_string(item)?;

      let mut conn = self.conn.clone();
      let _: () = conn.lpush(&self.key, payload).await?;

      Ok(())
   }

   async fn dequeue(&self, timeout: Duration) -> Result<Option<QueuedNotification>, InfraError> {
      // BRPOP のタイムアウト 0 は無限ブロックを意味するため最小値に丸める
      let timeout_secs = timeout.as_secs_f64().max(0.1);

      let mut conn = self.blocking_conn.clone();
      let result: Option<(String, String)> = conn.brpop(&self.key, timeout_secs).await?;

      match result {
         Some((_, payload)) => match serde_json::from_str(&payload) {
            Ok(item) => Ok(Some(item)),
            Err(error) => {
               tracing::warn!(
                  error = %error,
                  queue.key = %self.key,
                  "キューから解釈できないメッセージを取り出したため破棄します"
               );
               Ok(None)
            }
         },
         None => Ok(None),
      }
   }

   async fn health_check(&self) -> Result<(), InfraError> {
      let mut conn = self.conn.clone();
      let _: String = redis::cmd("PING").query_async(&mut conn).await?;
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;

   use super::*;

   #[test]
   fn test_既定のキューキー名は固定文字列() {
      assert_eq!(DEFAULT_QUEUE_KEY, "stellarsplit:email_queue");
   }

   #[test]
   fn test_redisキューはsendかつsync() {
      fn assert_send_sync<T: Send + Sync>() {}

      assert_send_sync::<RedisNotificationQueue>();
   }
}
