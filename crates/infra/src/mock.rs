//! # テスト用モック実装
//!
//! ユースケース・配信パイプラインのテストで使用するインメモリモック。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! stellarsplit-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{
   Arc,
   Mutex,
   atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stellarsplit_domain::{
   notification::{EmailMessage, NotificationError},
   preferences::NotificationPreferences,
   user::{Email, UserAccount, UserId},
};

use crate::{error::InfraError, mail::MailTransport, repository::UserRepository};

// ===== MockUserRepository =====

/// インメモリの受信者リポジトリモック
///
/// `fail_last_sent_updates` を立てると最終通知送信日時の更新だけが
/// 失敗するようになる（ベストエフォート更新の検証用）。
#[derive(Clone, Default)]
pub struct MockUserRepository {
   accounts: Arc<Mutex<Vec<UserAccount>>>,
   fail_last_sent_updates: Arc<Mutex<bool>>,
}

impl MockUserRepository {
   pub fn new() -> Self {
      Self {
         accounts: Arc::new(Mutex::new(Vec::new())),
         fail_last_sent_updates: Arc::new(Mutex::new(false)),
      }
   }

   pub fn add_account(&self, account: UserAccount) {
      self.accounts.lock().unwrap().push(account);
   }

   /// 最終通知送信日時の更新を失敗させる
   pub fn fail_last_sent_updates(&self) {
      *self.fail_last_sent_updates.lock().unwrap() = true;
   }

   /// 格納中のアカウントを ID で取得する（検証用）
   pub fn account(&self, id: &UserId) -> Option<UserAccount> {
      self
         .accounts
         .lock()
         .unwrap()
         .iter()
         .find(|a| a.id() == id)
         .cloned()
   }
}

#[async_trait]
impl UserRepository for MockUserRepository {
   async fn find_by_email(&self, email: &Email) -> Result<Option<UserAccount>, InfraError> {
      Ok(self
         .accounts
         .lock()
         .unwrap()
         .iter()
         .find(|a| a.email() == email)
         .cloned())
   }

   async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, InfraError> {
      Ok(self
         .accounts
         .lock()
         .unwrap()
         .iter()
         .find(|a| a.id() == id)
         .cloned())
   }

   async fn update_preferences(
      &self,
      id: &UserId,
      preferences: &NotificationPreferences,
   ) -> Result<(), InfraError> {
      let mut accounts = self.accounts.lock().unwrap();
      let Some(pos) = accounts.iter().position(|a| a.id() == id) else {
         return Err(InfraError::not_found("UserAccount", id.to_string()));
      };

      accounts[pos] = accounts[pos].clone().with_preferences(*preferences, Utc::now());
      Ok(())
   }

   async fn update_last_notification_sent_at(
      &self,
      id: &UserId,
      sent_at: DateTime<Utc>,
   ) -> Result<(), InfraError> {
      if *self.fail_last_sent_updates.lock().unwrap() {
         return Err(InfraError::unexpected("injected failure"));
      }

      let mut accounts = self.accounts.lock().unwrap();
      let Some(pos) = accounts.iter().position(|a| a.id() == id) else {
         return Err(InfraError::not_found("UserAccount", id.to_string()));
      };

      accounts[pos] = accounts[pos].clone().with_notification_sent(sent_at);
      Ok(())
   }
}

// ===== MockMailTransport =====

/// 送信されたメールを記録するトランスポートモック
///
/// `fail_next(n)` で次の n 回の送信を失敗させられる（再試行の検証用）。
#[derive(Clone, Default)]
pub struct MockMailTransport {
   sent: Arc<Mutex<Vec<EmailMessage>>>,
   failures_remaining: Arc<AtomicU32>,
}

impl MockMailTransport {
   pub fn new() -> Self {
      Self {
         sent: Arc::new(Mutex::new(Vec::new())),
         failures_remaining: Arc::new(AtomicU32::new(0)),
      }
   }

   /// 次の n 回の送信を失敗させる
   pub fn fail_next(&self, n: u32) {
      self.failures_remaining.store(n, Ordering::SeqCst);
   }

   /// 送信されたメールのスナップショットを返す
   pub fn sent_emails(&self) -> Vec<EmailMessage> {
      self.sent.lock().unwrap().clone()
   }

   pub fn sent_count(&self) -> usize {
      self.sent.lock().unwrap().len()
   }
}

#[async_trait]
impl MailTransport for MockMailTransport {
   async fn send(&self, email: &EmailMessage) -> Result<(), NotificationError> {
      let remaining = self.failures_remaining.load(Ordering::SeqCst);
      if remaining > 0 {
         self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
         return Err(NotificationError::Transport("injected failure".to_string()));
      }

      self.sent.lock().unwrap().push(email.clone());
      Ok(())
   }
}
