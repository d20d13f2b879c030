//! # 通知設定
//!
//! 受信者ごとの通知オプトイン設定と、種別ごとの許可判定（設定ゲート）を
//! 定義する。
//!
//! ## 設計方針
//!
//! - **全種別デフォルト有効**: 未設定の受信者はすべての通知を受け取る
//! - **キー名は公開契約**: 永続化と API の両方で camelCase のキー名
//!   （`invitations` / `reminders` / `receivedConfirmation` / `completion`）
//!   を使用し、変更しない
//! - **部分更新はマージ**: [`PreferencePatch`] に含まれるフィールドだけを
//!   上書きし、残りは既存値を維持する

use serde::{Deserialize, Serialize};

use crate::notification::NotificationKind;

/// 受信者の通知設定
///
/// 種別ごとのオプトインを表す。永続化・API 応答の両方で使用されるため、
/// serde のキー名は固定の公開契約として扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    /// Split 招待を受け取るか
    pub invitations:           bool,
    /// 支払いリマインドを受け取るか
    pub reminders:             bool,
    /// 受領確認を受け取るか
    pub received_confirmation: bool,
    /// Split 完了通知を受け取るか
    pub completion:            bool,
}

impl Default for NotificationPreferences {
    /// すべての種別を有効にした設定を返す
    fn default() -> Self {
        Self {
            invitations:           true,
            reminders:             true,
            received_confirmation: true,
            completion:            true,
        }
    }
}

impl NotificationPreferences {
    /// 指定された通知種別の受信を許可しているかを返す（設定ゲート）
    ///
    /// 種別と設定フィールドの対応は固定:
    ///
    /// | 種別 | フィールド |
    /// |---|---|
    /// | Invitation | `invitations` |
    /// | Reminder | `reminders` |
    /// | Confirmation | `receivedConfirmation` |
    /// | Completed | `completion` |
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Invitation => self.invitations,
            NotificationKind::Reminder => self.reminders,
            NotificationKind::Confirmation => self.received_confirmation,
            NotificationKind::Completed => self.completion,
        }
    }

    /// 部分更新をマージした新しい設定を返す
    ///
    /// パッチに含まれないフィールドは現在の値を維持する。
    pub fn apply(&self, patch: &PreferencePatch) -> Self {
        Self {
            invitations:           patch.invitations.unwrap_or(self.invitations),
            reminders:             patch.reminders.unwrap_or(self.reminders),
            received_confirmation: patch
                .received_confirmation
                .unwrap_or(self.received_confirmation),
            completion:            patch.completion.unwrap_or(self.completion),
        }
    }
}

/// 通知設定の部分更新
///
/// API 層で型検証を通過した後の形。`None` のフィールドは「変更しない」を
/// 意味する。未知のキーや真偽値以外の値はこの型に到達する前に拒否される。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferencePatch {
    pub invitations:           Option<bool>,
    pub reminders:             Option<bool>,
    pub received_confirmation: Option<bool>,
    pub completion:            Option<bool>,
}
