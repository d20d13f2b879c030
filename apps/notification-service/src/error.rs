//! # Notification Service エラー定義
//!
//! サービス固有のエラーと、HTTP レスポンスへの変換を定義する。

use axum::{
   Json,
   http::StatusCode,
   response::{IntoResponse, Response},
};
use stellarsplit_shared::ErrorResponse;
use thiserror::Error;

/// Notification Service で発生するエラー
#[derive(Debug, Error)]
pub enum ApiError {
   /// リソースが見つからない
   #[error("リソースが見つかりません: {0}")]
   NotFound(String),

   /// 不正なリクエスト
   #[error("不正なリクエスト: {0}")]
   BadRequest(String),

   /// データベース・キューなどのインフラエラー
   #[error("インフラエラー: {0}")]
   Infra(#[from] stellarsplit_infra::InfraError),

   /// 内部エラー
   #[error("内部エラー: {0}")]
   Internal(String),
}

impl IntoResponse for ApiError {
   fn into_response(self) -> Response {
      let (status, body) = match &self {
         ApiError::NotFound(msg) => {
            (StatusCode::NOT_FOUND, ErrorResponse::not_found(msg.clone()))
         }
         ApiError::BadRequest(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::bad_request(msg.clone()),
         ),
         ApiError::Infra(e) => {
            tracing::error!("インフラエラー: {}", e);
            (
               StatusCode::INTERNAL_SERVER_ERROR,
               ErrorResponse::internal_error(),
            )
         }
         ApiError::Internal(msg) => {
            tracing::error!("内部エラー: {}", msg);
            (
               StatusCode::INTERNAL_SERVER_ERROR,
               ErrorResponse::internal_error(),
            )
         }
      };

      (status, Json(body)).into_response()
   }
}
