//! # 通知
//!
//! メール通知に関するドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`NotificationKind`] | 通知種別 | 4 種類: Split 招待、支払いリマインド、受領確認、Split 完了 |
//! | [`NotificationJob`] | 通知ジョブ | キューに投入される配信単位。投入後は不変 |
//! | [`DispatchOutcome`] | 配信結果 | 送信 / スキップ（スキップは正常系） |
//!
//! ## 設計方針
//!
//! - **enum による通知種別**: 件名・テンプレート名・コンテキスト変数の
//!   対応表を種別に紐付け、分岐漏れをコンパイル時に検出する
//! - **スキップは正常系**: レート制限・受信者設定による抑止はエラーではなく
//!   [`DispatchOutcome::Skipped`] として返す
//! - **テンプレート分離**: 通知ジョブとメール生成は分離
//!   （TemplateStore は notification-service 側）

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::user::Email;

define_uuid_id! {
    /// 通知ジョブ ID（一意識別子）
    ///
    /// キュー投入時に採番され、ログの相関キーとして使用される。
    /// UUID v7 を使用。
    pub struct NotificationJobId;
}

/// 通知配信エラー
///
/// 配信パイプラインの 1 試行を失敗させるエラー。スキップ
/// （レート制限・受信者設定）はエラーではなく [`DispatchOutcome`] で表現する。
#[derive(Debug, Error)]
pub enum NotificationError {
    /// テンプレートが登録されていない
    ///
    /// デプロイ構成の欠陥であり、リトライしても回復しない。
    #[error("テンプレートが見つかりません: {template}")]
    TemplateNotFound {
        /// 解決に失敗したテンプレート名
        template: String,
    },

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateRender(String),

    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    Transport(String),

    /// 受信者ストアへのアクセスに失敗
    #[error("受信者ストアへのアクセスに失敗: {0}")]
    RecipientStore(String),
}

impl NotificationError {
    /// 再配信で回復しうるエラーかどうかを返す
    ///
    /// テンプレート系のエラーは構成欠陥のためリトライ対象外。
    /// トランスポート・ストアの失敗は一時障害とみなしリトライ対象とする。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TemplateNotFound { .. } | Self::TemplateRender(_) => false,
            Self::Transport(_) | Self::RecipientStore(_) => true,
        }
    }
}

/// 通知種別
///
/// キューのペイロードでは snake_case でシリアライズされる。
/// 件名・テンプレート名・コンテキスト変数の対応表を保持する。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// Split 招待: 新しい Split への参加依頼 → 招待された相手に送信
    Invitation,
    /// 支払いリマインド: 未払い分の催促 → 参加者に送信
    Reminder,
    /// 受領確認: 支払いの着金確認 → 支払った本人に送信
    Confirmation,
    /// Split 完了: 全員の支払いが揃った通知 → 参加者に送信
    Completed,
}

impl NotificationKind {
    /// メール件名を返す
    ///
    /// 文言は外部に公開された契約であり、一字一句変更しない。
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Invitation => "Invitation to join a new Split on StellarSplit",
            Self::Reminder => "Payment Reminder for StellarSplit",
            Self::Confirmation => "Payment Received Confirmation",
            Self::Completed => "Split Completed!",
        }
    }

    /// テンプレート名（拡張子なし）を返す
    ///
    /// TemplateStore 側がファイル拡張子を付与して解決する。
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Reminder => "reminder",
            Self::Confirmation => "confirmation",
            Self::Completed => "completed",
        }
    }

    /// テンプレートが参照しうるコンテキスト変数名を返す
    ///
    /// ジョブのコンテキストに欠けている変数は空文字列で補完され、
    /// レンダリングを失敗させない。
    pub fn expected_context_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Invitation => &["inviterName", "splitDescription", "amount", "joinLink"],
            Self::Reminder => &[
                "participantName",
                "splitDescription",
                "amountDue",
                "paymentLink",
            ],
            Self::Confirmation => &["amount", "splitDescription", "txHash"],
            Self::Completed => &["splitDescription", "totalAmount"],
        }
    }
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力。MailTransport に渡される。
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
}

/// 通知ジョブ
///
/// キューに投入される配信単位。投入後は不変であり、
/// 再配信されても同じ内容が処理される。
///
/// # 不変条件
///
/// - `recipient` は形式検証済みのメールアドレス
/// - `context` はテンプレート変数（camelCase キー）の JSON オブジェクト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    /// ジョブ ID（キュー投入時に採番）
    pub id:        NotificationJobId,
    /// 送信先メールアドレス
    pub recipient: Email,
    /// 通知種別
    pub kind:      NotificationKind,
    /// テンプレートに渡す変数
    pub context:   Map<String, Value>,
}

impl NotificationJob {
    /// 新しい通知ジョブを作成する
    pub fn new(recipient: Email, kind: NotificationKind, context: Map<String, Value>) -> Self {
        Self {
            id: NotificationJobId::new(),
            recipient,
            kind,
            context,
        }
    }
}

/// 配信パイプラインの結果
///
/// スキップは正常系であり、`Result` の `Ok` 側で表現される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// トランスポートへの引き渡しに成功
    Sent,
    /// ゲート判定により送信せず終了
    Skipped(SkipReason),
}

/// 送信をスキップした理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// クールダウン期間内の再送を抑止
    RateLimited,
    /// 受信者が該当種別の通知を無効化している
    PreferenceDisabled,
}
