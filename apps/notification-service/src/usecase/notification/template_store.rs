//! # テンプレートストア
//!
//! tera テンプレートエンジンで通知メールの HTML 本文を生成する。
//!
//! ## 設計方針
//!
//! - **`include_str!` によるコンパイル時埋め込み**: テンプレートはバイナリに埋め込まれる
//! - **欠落変数の補完**: コンテキストに無い変数は空文字列として描画し、
//!   レンダリングを失敗させない
//! - **未登録テンプレートは構成欠陥**: `TemplateNotFound` として返し、
//!   ワーカー側でリトライせず破棄させる

use serde_json::{Map, Value};
use stellarsplit_domain::notification::{NotificationError, NotificationKind};
use tera::{Context, Tera};

/// テンプレートストアトレイト
///
/// 通知種別とコンテキストから HTML 本文を生成する。
/// テストではインメモリの代替実装に差し替えられる。
pub trait TemplateStore: Send + Sync {
    /// 通知種別とコンテキストから HTML 本文を生成する
    fn render(
        &self,
        kind: NotificationKind,
        context: &Map<String, Value>,
    ) -> Result<String, NotificationError>;
}

/// tera によるテンプレートストア実装
pub struct TeraTemplateStore {
    engine: Tera,
}

impl TeraTemplateStore {
    /// 新しいストアインスタンスを作成
    ///
    /// `include_str!` で埋め込んだ 4 種のテンプレートを tera に登録する。
    pub fn new() -> Result<Self, NotificationError> {
        Self::with_raw_templates(vec![
            (
                "invitation.html",
                include_str!("../../../templates/notifications/invitation.html"),
            ),
            (
                "reminder.html",
                include_str!("../../../templates/notifications/reminder.html"),
            ),
            (
                "confirmation.html",
                include_str!("../../../templates/notifications/confirmation.html"),
            ),
            (
                "completed.html",
                include_str!("../../../templates/notifications/completed.html"),
            ),
        ])
    }

    /// テンプレートを直接指定してストアを作成する（テスト用）
    pub fn with_raw_templates(
        templates: Vec<(&str, &str)>,
    ) -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(templates)
            .map_err(|e| NotificationError::TemplateRender(e.to_string()))?;

        Ok(Self { engine })
    }
}

impl TemplateStore for TeraTemplateStore {
    /// ジョブのコンテキストをそのままテンプレート変数として渡し、
    /// 種別が期待する変数のうち欠けているものは空文字列で補完する。
    fn render(
        &self,
        kind: NotificationKind,
        context: &Map<String, Value>,
    ) -> Result<String, NotificationError> {
        let template_file = format!("{}.html", kind.template_name());

        if !self.engine.get_template_names().any(|n| n == template_file) {
            return Err(NotificationError::TemplateNotFound {
                template: template_file,
            });
        }

        let mut tera_context = Context::new();
        for (key, value) in context {
            tera_context.insert(key.as_str(), value);
        }
        for key in kind.expected_context_keys() {
            if !context.contains_key(*key) {
                tera_context.insert(*key, "");
            }
        }

        self.engine
            .render(&template_file, &tera_context)
            .map_err(|e| NotificationError::TemplateRender(e.to_string()))
    }
}
