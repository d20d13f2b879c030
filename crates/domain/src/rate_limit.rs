//! # レート制限
//!
//! 受信者単位のクールダウン判定（レートゲート）を定義する。
//!
//! ## 設計方針
//!
//! - **純粋な判定**: 時刻は引数で受け取り、副作用を持たない
//! - **境界は送信許可**: 経過時間がちょうどウィンドウと等しい場合は許可する
//! - **履歴なしは許可**: 送信記録のない受信者は常に許可する

use chrono::{DateTime, Duration, Utc};

/// 既定のクールダウンウィンドウ（ミリ秒）
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;

/// 受信者単位のクールダウンポリシー
///
/// 直近の送信時刻からウィンドウが経過するまで、同一受信者への
/// 送信を抑止する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    window: Duration,
}

impl RateLimitPolicy {
    /// 指定されたウィンドウでポリシーを作成する
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// ミリ秒指定でポリシーを作成する
    pub fn from_millis(millis: i64) -> Self {
        Self::new(Duration::milliseconds(millis))
    }

    /// クールダウンウィンドウを返す
    pub fn window(&self) -> Duration {
        self.window
    }

    /// 送信を許可するかを返す（レートゲート）
    ///
    /// `last_sent_at` が `None`（送信履歴なし）の場合は常に許可。
    /// 経過時間がウィンドウ以上であれば許可する（境界を含む）。
    pub fn allows(&self, last_sent_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_sent_at {
            None => true,
            Some(last) => now - last >= self.window,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_millis(DEFAULT_COOLDOWN_MS)
    }
}
