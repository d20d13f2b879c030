//! # インメモリ通知キュー
//!
//! プロセス内メモリ上で完結する通知キューの実装。
//!
//! ## 設計方針
//!
//! - **`VecDeque` による FIFO**: 投入順に取り出す
//! - **`Notify` による待機**: 空キューでのデキューは投入通知を待つ。
//!   ロックは await をまたがないため `std::sync::Mutex` を使用する
//! - **開発・テスト用途**: プロセス再起動でメッセージは消える

use std::{
   collections::VecDeque,
   sync::{Arc, Mutex},
   time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{NotificationQueue, QueuedNotification};
use crate::error::InfraError;

/// プロセス内メモリ上の通知キュー
///
/// `Clone` はキューの実体を共有する。プロデューサとワーカーに
/// 同じインスタンスのクローンを渡して使う。
#[derive(Clone, Default)]
pub struct InMemoryNotificationQueue {
   inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
   items:  Mutex<VecDeque<QueuedNotification>>,
   notify: Notify,
}

impl InMemoryNotificationQueue {
   /// 新しい空のキューを作成する
   pub fn new() -> Self {
      Self::default()
   }

   /// キュー内のメッセージ件数を返す
   pub fn len(&self) -> usize {
      self.inner.items.lock().unwrap().len()
   }

   /// キューが空かどうかを返す
   pub fn is_empty(&self) -> bool {
      self.inner.items.lock().unwrap().is_empty()
   }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
   async fn enqueue(&self, item: &QueuedNotification) -> Result<(), InfraError> {
      self.inner.items.lock().unwrap().push_back(item.clone());
      self.inner.notify.notify_one();
      Ok(())
   }

   async fn dequeue(&self, timeout: Duration) -> Result<Option<QueuedNotification>, InfraError> {
      let deadline = tokio::time::Instant::now() + timeout;

      loop {
         if let Some(item) = self.inner.items.lock().unwrap().pop_front() {
            return Ok(Some(item));
         }

         // 投入通知か期限切れのどちらか早い方まで待つ。
         // 通知を受けてもループ先頭で再確認する（通知は permit として
         // 蓄積されるため、取りこぼしは起きない）
         let notified = self.inner.notify.notified();
         if tokio::time::timeout_at(deadline, notified).await.is_err() {
            return Ok(None);
         }
      }
   }
}
