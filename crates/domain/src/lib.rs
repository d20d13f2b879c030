//! # StellarSplit ドメイン層
//!
//! 通知配信のビジネスルールを担うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: UserAccount）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: Email,
//!   NotificationPreferences）
//! - **ドメインルール**: レート制限・通知設定などの純粋な判定ロジック
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! app → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、Redis、SMTP）には一切依存しない。
//! レートゲート・設定ゲートは純粋関数として実装され、
//! 時刻は [`clock::Clock`] 経由で注入される。
//!
//! ## モジュール構成
//!
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`notification`] - 通知種別・通知ジョブ・配信結果
//! - [`preferences`] - 受信者の通知設定と設定ゲート
//! - [`rate_limit`] - 受信者単位のクールダウン判定
//! - [`user`] - 受信者アカウントとメールアドレス
//! - [`clock`] - テスト可能な時刻プロバイダ
//!
//! ## 使用例
//!
//! ```rust
//! use stellarsplit_domain::{
//!     notification::NotificationKind,
//!     preferences::NotificationPreferences,
//! };
//!
//! let preferences = NotificationPreferences::default();
//! assert!(preferences.allows(NotificationKind::Invitation));
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod notification;
pub mod preferences;
pub mod rate_limit;
pub mod user;

pub use error::DomainError;
