//! # Notification Service ライブラリ
//!
//! 通知サービスのユースケースとハンドラを公開する。
//! テスト用に内部モジュールへのアクセスを提供する。

pub mod error;
pub mod handler;
pub mod usecase;
