//! # 受信者アカウント
//!
//! 通知の受信者となるユーザーアカウントと、関連する値オブジェクトを定義する。
//!
//! ## 設計方針
//!
//! - **Newtype パターン**: UserId は UUID をラップし、型安全性を確保
//! - **不変性**: エンティティフィールドは不変、変更は `with_*` メソッド経由
//! - **バリデーション**: 値オブジェクトの生成時に検証ロジックを実行
//! - **未登録アドレスも送信可能**: 通知はアカウントの存在を前提としない。
//!   ゲート判定（レート制限・通知設定）は登録済みアカウントにのみ適用される

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, preferences::NotificationPreferences};

define_uuid_id! {
    /// ユーザー ID（一意識別子）
    ///
    /// UUID v7 を使用し、生成順にソート可能。
    pub struct UserId;
}

/// メールアドレス（値オブジェクト）
///
/// 生成時にバリデーションを実行し、不正な値の作成を防ぐ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - `local@domain` の形式（両側が非空）
    /// - 最大 255 文字
    ///
    /// # エラー
    ///
    /// バリデーションに失敗した場合は `DomainError::Validation` を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        // 基本的な構造検証: local@domain の形式であること
        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有権を持つ文字列に変換する
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 受信者アカウントエンティティ
///
/// 通知設定と直近の通知送信時刻を保持する。レートゲート・設定ゲートの
/// 判定材料はすべてこのエンティティから供給される。
///
/// # 不変条件
///
/// - `email` はシステム内で一意
/// - 新規作成時の通知設定はすべて有効
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    id: UserId,
    email: Email,
    preferences: NotificationPreferences,
    last_notification_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// 新しい受信者アカウントを作成する
    ///
    /// # 不変条件
    ///
    /// - 通知設定はすべて有効で初期化される
    /// - `last_notification_sent_at` は None
    pub fn new(id: UserId, email: Email, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            preferences: NotificationPreferences::default(),
            last_notification_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 既存のデータからアカウントを復元する（データベースから取得時）
    pub fn from_db(
        id: UserId,
        email: Email,
        preferences: NotificationPreferences,
        last_notification_sent_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            preferences,
            last_notification_sent_at,
            created_at,
            updated_at,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn preferences(&self) -> &NotificationPreferences {
        &self.preferences
    }

    pub fn last_notification_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_notification_sent_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ビジネスロジックメソッド

    /// 通知設定を更新した新しいインスタンスを返す
    pub fn with_preferences(
        self,
        preferences: NotificationPreferences,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            preferences,
            updated_at: now,
            ..self
        }
    }

    /// 通知送信時刻を記録した新しいインスタンスを返す
    pub fn with_notification_sent(self, at: DateTime<Utc>) -> Self {
        Self {
            last_notification_sent_at: Some(at),
            updated_at: at,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    // Email のテスト

    #[test]
    fn test_有効なメールアドレスを作成できる() {
        let email = Email::new("user@example.com").unwrap();

        assert_eq!(email.as_str(), "user@example.com");
        assert_eq!(email.to_string(), "user@example.com");
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("no-at-sign", "@記号なし")]
    #[case("@", "@のみ")]
    #[case("@example.com", "ローカル部分が空")]
    #[case("user@", "ドメイン部分が空")]
    #[case(&format!("{}@example.com", "a".repeat(256)), "255文字超過")]
    fn test_メールアドレスは不正な形式を拒否する(
        #[case] input: &str,
        #[case] _reason: &str,
    ) {
        assert!(Email::new(input).is_err());
    }

    // UserAccount のテスト

    /// テスト用の固定タイムスタンプ
    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn account(now: DateTime<Utc>) -> UserAccount {
        UserAccount::new(UserId::new(), Email::new("user@example.com").unwrap(), now)
    }

    #[rstest]
    fn test_新規アカウントは全通知が有効(account: UserAccount) {
        assert_eq!(*account.preferences(), NotificationPreferences::default());
    }

    #[rstest]
    fn test_新規アカウントは送信履歴なし(account: UserAccount) {
        assert_eq!(account.last_notification_sent_at(), None);
    }

    #[rstest]
    fn test_送信時刻の記録で履歴と更新日時が変わる(
        account: UserAccount,
        now: DateTime<Utc>,
    ) {
        let sent_at = now + chrono::Duration::minutes(5);

        let updated = account.with_notification_sent(sent_at);

        assert_eq!(updated.last_notification_sent_at(), Some(sent_at));
        assert_eq!(updated.updated_at(), sent_at);
    }

    #[rstest]
    fn test_通知設定の更新は他のフィールドを変えない(
        account: UserAccount,
        now: DateTime<Utc>,
    ) {
        let id = account.id().clone();
        let disabled = NotificationPreferences {
            reminders: false,
            ..Default::default()
        };

        let updated = account.with_preferences(disabled, now);

        assert_eq!(updated.id(), &id);
        assert!(!updated.preferences().reminders);
        assert!(updated.preferences().invitations);
    }
}
