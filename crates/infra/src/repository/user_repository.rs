//! # UserRepository
//!
//! 受信者アカウント情報の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **ランタイムクエリ**: `query_as` + 行構造体でマッピング
//! - **通知設定は JSONB**: `email_preferences` カラムに JSON で格納し、
//!   欠けたキーはデシリアライズ時に既定値（有効）で補完
//! - **更新系は件数検証**: 0 行更新は `NotFound` として返す

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stellarsplit_domain::{
   preferences::NotificationPreferences,
   user::{Email, UserAccount, UserId},
};
use uuid::Uuid;

use crate::error::InfraError;

/// 受信者アカウントリポジトリトレイト
///
/// 受信者アカウントの検索・通知設定の更新操作を定義する。
/// インフラ層で具体的な実装を提供し、ユースケース層から利用する。
#[async_trait]
pub trait UserRepository: Send + Sync {
   /// メールアドレスで受信者を検索
   ///
   /// # 戻り値
   ///
   /// - `Ok(Some(account))`: 受信者が見つかった場合
   /// - `Ok(None)`: 受信者が見つからない場合
   /// - `Err(_)`: データベースエラー
   async fn find_by_email(&self, email: &Email) -> Result<Option<UserAccount>, InfraError>;

   /// ID で受信者を検索
   async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, InfraError>;

   /// 通知設定を更新
   ///
   /// 受信者が存在しない場合は `NotFound` を返す。
   async fn update_preferences(
      &self,
      id: &UserId,
      preferences: &NotificationPreferences,
   ) -> Result<(), InfraError>;

   /// 最終通知送信日時を更新
   ///
   /// レートリミット判定の基準となるタイムスタンプを記録する。
   /// 受信者が存在しない場合は `NotFound` を返す。
   async fn update_last_notification_sent_at(
      &self,
      id: &UserId,
      sent_at: DateTime<Utc>,
   ) -> Result<(), InfraError>;
}

/// users テーブルの行
#[derive(sqlx::FromRow)]
struct UserAccountRow {
   id:                        Uuid,
   email:                     String,
   email_preferences:         serde_json::Value,
   last_notification_sent_at: Option<DateTime<Utc>>,
   created_at:                DateTime<Utc>,
   updated_at:                DateTime<Utc>,
}

impl UserAccountRow {
   /// 行をドメインエンティティに変換する
   fn into_account(self) -> Result<UserAccount, InfraError> {
      let email =
         Email::new(&self.email).map_err(|e| InfraError::unexpected(e.to_string()))?;
      let preferences: NotificationPreferences = serde_json::from_value(self.email_preferences)?;

      Ok(UserAccount::from_db(
         UserId::from_uuid(self.id),
         email,
         preferences,
         self.last_notification_sent_at,
         self.created_at,
         self.updated_at,
      ))
   }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT
        id,
        email,
        email_preferences,
        last_notification_sent_at,
        created_at,
        updated_at
    FROM users
"#;

/// PostgreSQL 実装の UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
   pool: PgPool,
}

impl PostgresUserRepository {
   /// 新しいリポジトリインスタンスを作成
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
   async fn find_by_email(&self, email: &Email) -> Result<Option<UserAccount>, InfraError> {
      let query = format!("{SELECT_ACCOUNT} WHERE email = $1");
      let row = sqlx::query_as::<_, UserAccountRow>(&query)
         .bind(email.as_str())
         .fetch_optional(&self.pool)
         .await?;

      row.map(UserAccountRow::into_account).transpose()
   }

   async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, InfraError> {
      let query = format!("{SELECT_ACCOUNT} WHERE id = $1");
      let row = sqlx::query_as::<_, UserAccountRow>(&query)
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(UserAccountRow::into_account).transpose()
   }

   async fn update_preferences(
      &self,
      id: &UserId,
      preferences: &NotificationPreferences,
   ) -> Result<(), InfraError> {
      let json = serde_json::to_value(preferences)?;

      let result = sqlx::query(
         r#"
            UPDATE users
            SET email_preferences = $2, updated_at = NOW()
            WHERE id = $1
            "#,
      )
      .bind(id.as_uuid())
      .bind(json)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::not_found("UserAccount", id.to_string()));
      }

      Ok(())
   }

   async fn update_last_notification_sent_at(
      &self,
      id: &UserId,
      sent_at: DateTime<Utc>,
   ) -> Result<(), InfraError> {
      let result = sqlx::query(
         r#"
            UPDATE users
            SET last_notification_sent_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
      )
      .bind(id.as_uuid())
      .bind(sent_at)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::not_found("UserAccount", id.to_string()));
      }

      Ok(())
   }
}
