//! # StellarSplit インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! このクレートはドメイン層で定義されたインターフェース（リポジトリ・
//! トランスポート・キューのトレイト）の具体的な実装を提供する。
//! 外部システムの詳細をカプセル化し、ドメイン層をインフラの変更から保護する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理
//! - **通知キュー**: Redis リストによるジョブキュー（開発用インメモリ実装あり）
//! - **リポジトリ実装**: 受信者アカウントの永続化
//! - **メールトランスポート**: SMTP / SES / Noop の送信実装
//!
//! ## 依存関係
//!
//! ```text
//! app → infra → domain
//! ```
//!
//! インフラ層は `domain` に依存する。
//! ドメイン層はインフラ層に依存しない（依存性逆転の原則）。
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`mail`] - メールトランスポート実装
//! - [`queue`] - 通知キュー実装
//! - [`repository`] - リポジトリ実装

pub mod db;
pub mod error;
pub mod mail;
pub mod queue;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::InfraError;
pub use mail::{MailTransport, NoopMailTransport, SesMailTransport, SmtpMailTransport};
pub use queue::{NotificationQueue, QueuedNotification};
