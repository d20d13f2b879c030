//! SMTP メールトランスポート実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 開発環境では Mailpit（ローカル SMTP サーバー）、テスト環境では
//! 認証付き SMTP リレーに接続する。

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Message, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use stellarsplit_domain::notification::{EmailMessage, NotificationError};

use super::MailTransport;

/// SMTP 接続・送信のタイムアウト
///
/// ワーカーの 1 試行が無期限にブロックしないよう上限を設ける。
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// SMTP メールトランスポート
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
/// Mailpit（開発）や認証付き SMTP リレーで使用する。
pub struct SmtpMailTransport {
    transport:    AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailTransport {
    /// 認証なしの SMTP 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    /// - `from_address`: 送信元メールアドレス
    pub fn new(host: &str, port: u16, from_address: String) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Self {
            transport,
            from_address,
        }
    }

    /// 認証付きの SMTP 送信インスタンスを作成
    ///
    /// SMTP リレー（Mailtrap 等）で使用する。
    pub fn with_credentials(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from_address: String,
    ) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Self {
            transport,
            from_address,
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(self
                .from_address
                .parse()
                .map_err(|e| NotificationError::Transport(format!("送信元アドレス不正: {e}")))?)
            .to(email
                .to
                .parse()
                .map_err(|e| NotificationError::Transport(format!("宛先アドレス不正: {e}")))?)
            .subject(&email.subject)
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(email.html_body.clone()),
            )
            .map_err(|e| NotificationError::Transport(format!("メッセージ構築失敗: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}
