//! # 通知ユースケース
//!
//! 通知ジョブの投入から配信までを実装する。
//!
//! ## モジュール構成
//!
//! - [`producer`] - 種別ごとに型付けされたジョブ投入 API
//! - [`template_store`] - tera テンプレートエンジンによる本文生成
//! - [`dispatcher`] - ゲート判定・レンダリング・送信のパイプライン
//! - [`worker`] - キュー消費と再試行

pub mod dispatcher;
pub mod producer;
pub mod template_store;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use producer::{
    CompletedContext,
    ConfirmationContext,
    InvitationContext,
    NotificationProducer,
    ReminderContext,
};
pub use template_store::{TemplateStore, TeraTemplateStore};
pub use worker::{DispatchWorker, RetryPolicy};
