//! # 通知キュー
//!
//! 通知ジョブを非同期に受け渡すキューの抽象化と実装。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationQueue` trait でキュー操作を抽象化
//! - **2 つの実装**: Redis リスト（本番用）、インメモリ（開発・テスト用）
//! - **環境変数切替**: `QUEUE_BACKEND` でランタイム選択
//!
//! ## 配信保証
//!
//! At-least-once。エンキューはブローカーへの書き込み完了後に返り、
//! デキューで取り出したメッセージの処理がクラッシュした場合は失われる。
//! 送信の再試行はワーカー側の再エンキューで実現するため、
//! 同一ジョブが複数回配信される可能性がある。

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
pub use memory::InMemoryNotificationQueue;
pub use redis::{DEFAULT_QUEUE_KEY, RedisNotificationQueue};
use serde::{Deserialize, Serialize};
use stellarsplit_domain::notification::NotificationJob;

use crate::error::InfraError;

/// キューに積まれる通知ジョブの封筒
///
/// ジョブ本体に加えて試行回数を保持する。初回投入時は `attempt = 0`、
/// 再試行のたびにインクリメントされる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedNotification {
   pub job:     NotificationJob,
   pub attempt: u32,
}

impl QueuedNotification {
   /// 初回投入用の封筒を作成する
   pub fn new(job: NotificationJob) -> Self {
      Self { job, attempt: 0 }
   }

   /// 試行回数を 1 増やした封筒を返す（再エンキュー用）
   pub fn next_attempt(self) -> Self {
      Self {
         attempt: self.attempt + 1,
         ..self
      }
   }
}

/// 通知キュートレイト
///
/// プロデューサ（API ハンドラ）とコンシューマ（ワーカー）の間で
/// 通知ジョブを受け渡す。
#[async_trait]
pub trait NotificationQueue: Send + Sync {
   /// ジョブをキューの末尾に追加する
   ///
   /// ブローカーがメッセージを受理した時点で成功を返す。
   async fn enqueue(&self, item: &QueuedNotification) -> Result<(), InfraError>;

   /// キューの先頭からジョブを 1 件取り出す
   ///
   /// キューが空の場合は `timeout` までブロックし、期限内に
   /// メッセージが到着しなければ `None` を返す。
   /// `timeout` には正の値を渡すこと（無限待ちはサポートしない）。
   async fn dequeue(&self, timeout: Duration) -> Result<Option<QueuedNotification>, InfraError>;

   /// キューとの疎通を確認する（Readiness Check 用）
   ///
   /// インメモリ実装は常に成功する。
   async fn health_check(&self) -> Result<(), InfraError> {
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;
   use serde_json::Map;
   use stellarsplit_domain::{notification::NotificationKind, user::Email};

   use super::*;

   fn sample_job() -> NotificationJob {
      let email = Email::new("taro@example.com").unwrap();
      NotificationJob::new(email, NotificationKind::Reminder, Map::new())
   }

   #[test]
   fn test_初回投入の封筒は試行回数0で作られる() {
      let queued = QueuedNotification::new(sample_job());

      assert_eq!(queued.attempt, 0);
   }

   #[test]
   fn test_next_attemptは試行回数を1増やしジョブを保持する() {
      let queued = QueuedNotification::new(sample_job());
      let job = queued.job.clone();

      let retried = queued.next_attempt();

      assert_eq!(retried.attempt, 1);
      assert_eq!(retried.job, job);

      let retried_again = retried.next_attempt();
      assert_eq!(retried_again.attempt, 2);
   }

   #[test]
   fn test_封筒はjsonで往復できる() {
      let queued = QueuedNotification {
         job:     sample_job(),
         attempt: 2,
      };

      let json = serde_json::to_string(&queued).unwrap();
      let restored: QueuedNotification = serde_json::from_str(&json).unwrap();

      assert_eq!(restored, queued);
   }
}
