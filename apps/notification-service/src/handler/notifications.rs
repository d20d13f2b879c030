//! # 通知投入ハンドラ
//!
//! 他サービスが通知メールを発行するための内部 API。
//! 投入に成功した時点で 202 を返し、配信はワーカーが非同期に行う。
//!
//! ## エンドポイント
//!
//! - `POST /internal/notifications/invitation` - Split 招待
//! - `POST /internal/notifications/reminder` - 支払いリマインド
//! - `POST /internal/notifications/confirmation` - 受領確認
//! - `POST /internal/notifications/completed` - Split 完了

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use stellarsplit_domain::{notification::NotificationJobId, user::Email};
use stellarsplit_shared::ApiResponse;

use crate::{
    error::ApiError,
    usecase::notification::{
        CompletedContext,
        ConfirmationContext,
        InvitationContext,
        NotificationProducer,
        ReminderContext,
    },
};

/// 通知投入 API の共有状態
pub struct NotificationState {
    pub producer: NotificationProducer,
}

// --- リクエスト型 ---

/// Split 招待の投入リクエスト
#[derive(Debug, Deserialize)]
pub struct SendInvitationRequest {
    pub to:      String,
    #[serde(flatten)]
    pub context: InvitationContext,
}

/// 支払いリマインドの投入リクエスト
#[derive(Debug, Deserialize)]
pub struct SendReminderRequest {
    pub to:      String,
    #[serde(flatten)]
    pub context: ReminderContext,
}

/// 受領確認の投入リクエスト
#[derive(Debug, Deserialize)]
pub struct SendConfirmationRequest {
    pub to:      String,
    #[serde(flatten)]
    pub context: ConfirmationContext,
}

/// Split 完了の投入リクエスト
#[derive(Debug, Deserialize)]
pub struct SendCompletedRequest {
    pub to:      String,
    #[serde(flatten)]
    pub context: CompletedContext,
}

// --- レスポンス型 ---

/// 受理されたジョブの DTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedJobDto {
    pub job_id: NotificationJobId,
}

// --- ハンドラ ---

/// POST /internal/notifications/invitation
///
/// ## レスポンス
///
/// - `202 Accepted`: ジョブを受理
/// - `400 Bad Request`: 宛先メールアドレスが不正
#[tracing::instrument(skip_all)]
pub async fn send_invitation(
    State(state): State<Arc<NotificationState>>,
    Json(request): Json<SendInvitationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let to = parse_recipient(request.to)?;

    let job_id = state.producer.send_invitation(to, request.context).await?;

    Ok(accepted(job_id))
}

/// POST /internal/notifications/reminder
#[tracing::instrument(skip_all)]
pub async fn send_reminder(
    State(state): State<Arc<NotificationState>>,
    Json(request): Json<SendReminderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let to = parse_recipient(request.to)?;

    let job_id = state
        .producer
        .send_payment_reminder(to, request.context)
        .await?;

    Ok(accepted(job_id))
}

/// POST /internal/notifications/confirmation
#[tracing::instrument(skip_all)]
pub async fn send_confirmation(
    State(state): State<Arc<NotificationState>>,
    Json(request): Json<SendConfirmationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let to = parse_recipient(request.to)?;

    let job_id = state
        .producer
        .send_payment_confirmation(to, request.context)
        .await?;

    Ok(accepted(job_id))
}

/// POST /internal/notifications/completed
#[tracing::instrument(skip_all)]
pub async fn send_completed(
    State(state): State<Arc<NotificationState>>,
    Json(request): Json<SendCompletedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let to = parse_recipient(request.to)?;

    let job_id = state
        .producer
        .send_split_completed(to, request.context)
        .await?;

    Ok(accepted(job_id))
}

fn parse_recipient(to: String) -> Result<Email, ApiError> {
    Email::new(to).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn accepted(job_id: NotificationJobId) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(EnqueuedJobDto { job_id })),
    )
}
