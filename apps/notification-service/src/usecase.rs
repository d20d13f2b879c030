//! # ユースケース層
//!
//! Notification Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・キュー・トランスポートを `Arc<dyn Trait>` で
//!   外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - `notification`: 通知ジョブの投入・配信・再試行
//! - `preferences`: 受信者の通知設定の取得・部分更新

pub mod notification;
pub mod preferences;

pub use notification::{
    DispatchWorker,
    Dispatcher,
    NotificationProducer,
    RetryPolicy,
    TemplateStore,
    TeraTemplateStore,
};
pub use preferences::PreferenceUseCaseImpl;
