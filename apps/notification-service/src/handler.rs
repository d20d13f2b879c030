//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、ビジネスロジックはユースケース層に委譲

pub mod health;
pub mod notifications;
pub mod preferences;

pub use health::{ReadinessState, health_check, readiness_check};
pub use notifications::{
    NotificationState,
    send_completed,
    send_confirmation,
    send_invitation,
    send_reminder,
};
pub use preferences::{PreferenceState, get_preferences, update_preferences};
