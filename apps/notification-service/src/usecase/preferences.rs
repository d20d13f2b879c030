//! 通知設定ユースケース

use std::sync::Arc;

use stellarsplit_domain::{
    preferences::{NotificationPreferences, PreferencePatch},
    user::UserId,
};
use stellarsplit_infra::repository::UserRepository;
use stellarsplit_shared::{event_log::event, log_business_event};

use crate::error::ApiError;

/// 通知設定ユースケース
pub struct PreferenceUseCaseImpl {
    user_repository: Arc<dyn UserRepository>,
}

impl PreferenceUseCaseImpl {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// 受信者の通知設定を取得する
    pub async fn get_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<NotificationPreferences, ApiError> {
        let account = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("ユーザーが見つかりません".to_string()))?;

        Ok(*account.preferences())
    }

    /// 通知設定を部分更新し、マージ後の設定を返す
    ///
    /// パッチに含まれないフィールドは現在の値を維持する。
    pub async fn update_preferences(
        &self,
        user_id: &UserId,
        patch: &PreferencePatch,
    ) -> Result<NotificationPreferences, ApiError> {
        let account = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("ユーザーが見つかりません".to_string()))?;

        let merged = account.preferences().apply(patch);
        self.user_repository
            .update_preferences(user_id, &merged)
            .await?;

        log_business_event!(
            event.category = event::category::PREFERENCE,
            event.action = event::action::PREFERENCES_UPDATED,
            event.result = event::result::SUCCESS,
            user.id = %user_id,
            "通知設定を更新しました"
        );

        Ok(merged)
    }
}
