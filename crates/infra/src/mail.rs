//! # メールトランスポート
//!
//! メール通知の送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `MailTransport` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（Mailpit 開発用 / リレー）、SES（本番用）、Noop（既定）
//! - **環境変数切替**: `NOTIFICATION_BACKEND` でランタイム選択

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopMailTransport;
pub use ses::{SesMailTransport, create_client as create_ses_client};
pub use smtp::SmtpMailTransport;
use stellarsplit_domain::notification::{EmailMessage, NotificationError};

/// メール送信トレイト
///
/// 配信パイプラインの末端。メール送信の具体的な方法を抽象化する。
/// SMTP / SES / Noop の 3 実装を環境変数で切り替える。
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// メールを送信する
    ///
    /// 戻り値の `Ok(())` はトランスポートへの引き渡し成功を意味し、
    /// 最終的な到達は保証しない。
    async fn send(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}
