//! # Notification Service 設定
//!
//! 環境変数から Notification Service サーバーの設定を読み込む。

use std::env;

/// 既定の送信元メールアドレス
pub const DEFAULT_FROM_ADDRESS: &str = r#""StellarSplit" <noreply@stellarsplit.com>"#;

/// Notification Service サーバーの設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// データベース接続 URL
    pub database_url: String,
    /// キュー設定
    pub queue: QueueConfig,
    /// 通知設定
    pub notification: NotificationConfig,
    /// ワーカー設定
    pub worker: WorkerConfig,
}

/// 通知キューの設定
///
/// `QUEUE_BACKEND` 環境変数でバックエンドを切り替える:
/// - `redis`: Redis リスト経由（本番）
/// - `memory`: プロセス内キュー（開発・単一プロセス）
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// キューバックエンド（"redis" | "memory"）
    pub backend:   String,
    /// Redis 接続 URL（backend=redis の場合に使用）
    pub redis_url: String,
}

/// 通知配信の設定
///
/// `NOTIFICATION_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `ses`: Amazon SES v2 経由で送信（本番）
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// 送信バックエンド（"smtp" | "ses" | "noop"）
    pub backend:       String,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:     String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:     u16,
    /// SMTP 認証ユーザー（未設定なら認証なし）
    pub smtp_user:     Option<String>,
    /// SMTP 認証パスワード
    pub smtp_password: Option<String>,
    /// 送信元メールアドレス
    pub from_address:  String,
    /// 受信者単位のクールダウン（ミリ秒）
    pub cooldown_ms:   i64,
}

/// 配信ワーカーの設定
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 同時配信数
    pub concurrency:   u32,
    /// 初回を含む最大試行回数
    pub max_attempts:  u32,
    /// 再試行バックオフの初期値（ミリ秒）
    pub retry_base_ms: u64,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8083".to_string())
                .parse()
                .expect("PORT は有効なポート番号である必要があります"),
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL が設定されていません（just setup-env を実行してください）"),
            queue: QueueConfig::from_env(),
            notification: NotificationConfig::from_env(),
            worker: WorkerConfig::from_env(),
        })
    }
}

impl QueueConfig {
    /// 環境変数からキュー設定を読み込む
    fn from_env() -> Self {
        Self {
            backend:   env::var("QUEUE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        }
    }
}

impl NotificationConfig {
    /// 環境変数から通知設定を読み込む
    fn from_env() -> Self {
        Self {
            backend:       env::var("NOTIFICATION_BACKEND").unwrap_or_else(|_| "noop".to_string()),
            smtp_host:     env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port:     env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .expect("SMTP_PORT は有効なポート番号である必要があります"),
            smtp_user:     env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            from_address:  env::var("NOTIFICATION_FROM_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            cooldown_ms:   env::var("NOTIFICATION_COOLDOWN_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .expect("NOTIFICATION_COOLDOWN_MS は整数である必要があります"),
        }
    }
}

impl WorkerConfig {
    /// 環境変数からワーカー設定を読み込む
    fn from_env() -> Self {
        Self {
            concurrency:   env::var("WORKER_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .expect("WORKER_CONCURRENCY は正の整数である必要があります"),
            max_attempts:  env::var("NOTIFICATION_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("NOTIFICATION_MAX_ATTEMPTS は正の整数である必要があります"),
            retry_base_ms: env::var("NOTIFICATION_RETRY_BASE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("NOTIFICATION_RETRY_BASE_MS は整数である必要があります"),
        }
    }
}

#[cfg(test)]
mod tests {
    // 環境変数を読むテストはテスト間で競合するため、
    // 既定値の契約は定数側で検証する
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_既定の送信元アドレスは固定の文言() {
        assert_eq!(
            DEFAULT_FROM_ADDRESS,
            r#""StellarSplit" <noreply@stellarsplit.com>"#
        );
    }
}
