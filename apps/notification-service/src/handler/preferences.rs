//! # 通知設定ハンドラ
//!
//! 受信者の通知設定を取得・更新する内部 API。
//!
//! ## エンドポイント
//!
//! - `GET   /internal/notifications/preferences/{user_id}` - 設定取得
//! - `PATCH /internal/notifications/preferences/{user_id}` - 部分更新
//!
//! ## 部分更新の制約
//!
//! リクエストボディは既知の 4 フィールドの真偽値だけを受け付ける。
//! 未知のキーや真偽値以外の値はマージを行う前に 4xx で拒否される。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use stellarsplit_domain::{preferences::PreferencePatch, user::UserId};
use stellarsplit_shared::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, usecase::PreferenceUseCaseImpl};

/// 通知設定 API の共有状態
pub struct PreferenceState {
    pub usecase: PreferenceUseCaseImpl,
}

// --- リクエスト型 ---

/// 通知設定の部分更新リクエスト
///
/// `deny_unknown_fields` により、契約外のキーはデシリアライズの時点で
/// 拒否される。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePreferencesRequest {
    pub invitations:           Option<bool>,
    pub reminders:             Option<bool>,
    pub received_confirmation: Option<bool>,
    pub completion:            Option<bool>,
}

impl From<UpdatePreferencesRequest> for PreferencePatch {
    fn from(request: UpdatePreferencesRequest) -> Self {
        Self {
            invitations:           request.invitations,
            reminders:             request.reminders,
            received_confirmation: request.received_confirmation,
            completion:            request.completion,
        }
    }
}

// --- ハンドラ ---

/// GET /internal/notifications/preferences/{user_id}
///
/// ## レスポンス
///
/// - `200 OK`: 現在の通知設定
/// - `404 Not Found`: ユーザーが存在しない
#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn get_preferences(
    State(state): State<Arc<PreferenceState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::from_uuid(user_id);

    let preferences = state.usecase.get_preferences(&user_id).await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(preferences))))
}

/// PATCH /internal/notifications/preferences/{user_id}
///
/// 含まれるフィールドだけを上書きし、マージ後の設定を返す。
///
/// ## レスポンス
///
/// - `200 OK`: マージ後の通知設定
/// - `404 Not Found`: ユーザーが存在しない
/// - `422 Unprocessable Entity`: 未知のキー・真偽値以外の値
#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn update_preferences(
    State(state): State<Arc<PreferenceState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::from_uuid(user_id);
    let patch = PreferencePatch::from(request);

    let merged = state.usecase.update_preferences(&user_id, &patch).await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(merged))))
}
