//! # 配信パイプライン
//!
//! キューから取り出した通知ジョブを 1 件処理する。
//!
//! ## 処理順序
//!
//! 1. 受信者検索（メールアドレス）
//! 2. レートゲート（クールダウン窓内ならスキップ）
//! 3. 設定ゲート（種別がオプトアウトされていればスキップ）
//! 4. テンプレートレンダリング
//! 5. メール送信
//! 6. 最終送信日時の記録（ベストエフォート）
//!
//! ## 設計方針
//!
//! - **スキップは正常系**: ゲート判定による送信抑止は `Ok(Skipped(_))` で返し、
//!   リトライさせない
//! - **未知の受信者は常に送信**: レコードが無い宛先はゲートを通らず配信され、
//!   送信日時の記録も行わない
//! - **送信後の記録失敗は警告のみ**: 送信自体は成功しているため、
//!   記録の失敗でジョブを失敗させると重複送信のリスクになる

use std::sync::Arc;

use stellarsplit_domain::{
    clock::Clock,
    notification::{
        DispatchOutcome,
        EmailMessage,
        NotificationError,
        NotificationJob,
        SkipReason,
    },
    rate_limit::RateLimitPolicy,
    user::UserAccount,
};
use stellarsplit_infra::{mail::MailTransport, repository::UserRepository};
use stellarsplit_shared::{event_log::event, log_business_event};

use super::TemplateStore;

/// 配信パイプライン
///
/// 受信者ストア・メールトランスポート・テンプレートストアを束ね、
/// ジョブ 1 件をゲート判定からメール送信まで処理する。
pub struct Dispatcher {
    user_repository: Arc<dyn UserRepository>,
    mail_transport:  Arc<dyn MailTransport>,
    template_store:  Arc<dyn TemplateStore>,
    rate_limit:      RateLimitPolicy,
    clock:           Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        mail_transport: Arc<dyn MailTransport>,
        template_store: Arc<dyn TemplateStore>,
        rate_limit: RateLimitPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            mail_transport,
            template_store,
            rate_limit,
            clock,
        }
    }

    /// 通知ジョブを 1 件処理する
    ///
    /// # 戻り値
    ///
    /// - `Ok(Sent)`: トランスポートへの引き渡しに成功
    /// - `Ok(Skipped(_))`: ゲート判定により送信せず終了（正常系）
    /// - `Err(_)`: 処理失敗。`is_retryable()` に応じてワーカーが再試行する
    #[tracing::instrument(skip_all, fields(job_id = %job.id, kind = %job.kind))]
    pub async fn process(
        &self,
        job: &NotificationJob,
    ) -> Result<DispatchOutcome, NotificationError> {
        // 1. 受信者検索。レコードが無くても配信は続行する
        let recipient = self
            .user_repository
            .find_by_email(&job.recipient)
            .await
            .map_err(|e| NotificationError::RecipientStore(e.to_string()))?;

        if let Some(account) = &recipient {
            if let Some(reason) = self.gate(account, job) {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SKIPPED,
                    event.result = event::result::SUCCESS,
                    notification.kind = %job.kind,
                    notification.recipient = %job.recipient,
                    skip.reason = %reason,
                    "通知をスキップしました"
                );
                return Ok(DispatchOutcome::Skipped(reason));
            }
        }

        // 4. テンプレートレンダリング
        let html_body = self.template_store.render(job.kind, &job.context)?;

        let email = EmailMessage {
            to:        job.recipient.as_str().to_string(),
            subject:   job.kind.subject().to_string(),
            html_body,
        };

        // 5. メール送信
        self.mail_transport.send(&email).await?;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_SENT,
            event.result = event::result::SUCCESS,
            notification.kind = %job.kind,
            notification.recipient = %job.recipient,
            "通知メールを送信しました"
        );

        // 6. 最終送信日時の記録（ベストエフォート）
        if let Some(account) = &recipient {
            if let Err(e) = self
                .user_repository
                .update_last_notification_sent_at(account.id(), self.clock.now())
                .await
            {
                tracing::warn!(
                    error = %e,
                    recipient = %job.recipient,
                    "最終送信日時の記録に失敗しましたが、送信済みのため再試行しません"
                );
            }
        }

        Ok(DispatchOutcome::Sent)
    }

    /// レートゲート（2）と設定ゲート（3）を順に判定する
    ///
    /// スキップすべき場合はその理由を返す。
    fn gate(&self, account: &UserAccount, job: &NotificationJob) -> Option<SkipReason> {
        let now = self.clock.now();

        if !self
            .rate_limit
            .allows(account.last_notification_sent_at(), now)
        {
            return Some(SkipReason::RateLimited);
        }

        if !account.preferences().allows(job.kind) {
            return Some(SkipReason::PreferenceDisabled);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use stellarsplit_domain::{
        clock::FixedClock,
        notification::NotificationKind,
        preferences::NotificationPreferences,
        user::{Email, UserId},
    };
    use stellarsplit_infra::mock::{MockMailTransport, MockUserRepository};

    use super::*;
    use crate::usecase::notification::TeraTemplateStore;

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_dispatcher(
        repo: MockUserRepository,
        transport: MockMailTransport,
    ) -> Dispatcher {
        Dispatcher::new(
            Arc::new(repo),
            Arc::new(transport),
            Arc::new(TeraTemplateStore::new().unwrap()),
            RateLimitPolicy::default(),
            Arc::new(FixedClock::new(fixed_now())),
        )
    }

    fn make_account(
        email: &str,
        preferences: NotificationPreferences,
        last_sent_at: Option<chrono::DateTime<Utc>>,
    ) -> UserAccount {
        let created = fixed_now() - Duration::days(30);
        UserAccount::from_db(
            UserId::new(),
            Email::new(email).unwrap(),
            preferences,
            last_sent_at,
            created,
            created,
        )
    }

    fn invitation_job(to: &str) -> NotificationJob {
        let context = match json!({
            "inviterName": "John",
            "splitDescription": "Dinner",
            "amount": 42.5,
            "joinLink": "https://stellarsplit.com/join/abc",
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        NotificationJob::new(Email::new(to).unwrap(), NotificationKind::Invitation, context)
    }

    #[tokio::test]
    async fn 既知の受信者に送信され送信日時が記録される() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        let account = make_account("a@x.com", NotificationPreferences::default(), None);
        let account_id = account.id().clone();
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo.clone(), transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);

        let sent = transport.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(
            sent[0].subject,
            "Invitation to join a new Split on StellarSplit"
        );
        assert!(sent[0].html_body.contains("John"));

        let stored = repo.account(&account_id).unwrap();
        assert_eq!(stored.last_notification_sent_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn 未知の受信者にも送信され日時記録は行われない() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&invitation_job("nobody@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn クールダウン窓内の受信者はスキップされる() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        // 30 秒前に送信済み（クールダウンは 60 秒）
        let last_sent = fixed_now() - Duration::seconds(30);
        let account =
            make_account("a@x.com", NotificationPreferences::default(), Some(last_sent));
        let account_id = account.id().clone();
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo.clone(), transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::RateLimited));
        assert_eq!(transport.sent_count(), 0);

        // 送信日時も更新されない
        let stored = repo.account(&account_id).unwrap();
        assert_eq!(stored.last_notification_sent_at(), Some(last_sent));
    }

    #[tokio::test]
    async fn クールダウン境界ちょうどの受信者は送信される() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        // ちょうど 60 秒前（境界は送信を許可する）
        let last_sent = fixed_now() - Duration::seconds(60);
        let account =
            make_account("a@x.com", NotificationPreferences::default(), Some(last_sent));
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn オプトアウトした種別はレート状態に関わらずスキップされる() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        let preferences = NotificationPreferences {
            invitations: false,
            ..NotificationPreferences::default()
        };
        let account = make_account("a@x.com", preferences, None);
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped(SkipReason::PreferenceDisabled)
        );
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn レートゲートが設定ゲートより先に判定される() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        // クールダウン窓内かつオプトアウト → RateLimited が返る
        let preferences = NotificationPreferences {
            invitations: false,
            ..NotificationPreferences::default()
        };
        let last_sent = fixed_now() - Duration::seconds(10);
        let account = make_account("a@x.com", preferences, Some(last_sent));
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::RateLimited));
    }

    #[tokio::test]
    async fn トランスポート失敗はリトライ可能なエラーとして返る() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        transport.fail_next(1);
        repo.add_account(make_account(
            "a@x.com",
            NotificationPreferences::default(),
            None,
        ));

        let dispatcher = make_dispatcher(repo.clone(), transport);
        let result = dispatcher.process(&invitation_job("a@x.com")).await;

        let error = result.unwrap_err();
        assert!(matches!(error, NotificationError::Transport(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn 送信失敗時は送信日時が記録されない() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        transport.fail_next(1);
        let account = make_account("a@x.com", NotificationPreferences::default(), None);
        let account_id = account.id().clone();
        repo.add_account(account);

        let dispatcher = make_dispatcher(repo.clone(), transport);
        let _ = dispatcher.process(&invitation_job("a@x.com")).await;

        let stored = repo.account(&account_id).unwrap();
        assert_eq!(stored.last_notification_sent_at(), None);
    }

    #[tokio::test]
    async fn 送信日時の記録失敗でも送信成功として扱う() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        repo.add_account(make_account(
            "a@x.com",
            NotificationPreferences::default(),
            None,
        ));
        repo.fail_last_sent_updates();

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&invitation_job("a@x.com")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn 同一ジョブの再配信は一度目の記録後にレートスキップされる() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        repo.add_account(make_account(
            "a@x.com",
            NotificationPreferences::default(),
            None,
        ));

        let dispatcher = make_dispatcher(repo, transport.clone());
        let job = invitation_job("a@x.com");

        let first = dispatcher.process(&job).await.unwrap();
        let second = dispatcher.process(&job).await.unwrap();

        assert_eq!(first, DispatchOutcome::Sent);
        assert_eq!(second, DispatchOutcome::Skipped(SkipReason::RateLimited));
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn コンテキストが欠けていてもレンダリングは失敗しない() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();

        let job = NotificationJob::new(
            Email::new("a@x.com").unwrap(),
            NotificationKind::Invitation,
            match json!({ "inviterName": "John" }) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            },
        );

        let dispatcher = make_dispatcher(repo, transport.clone());
        let outcome = dispatcher.process(&job).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert!(transport.sent_emails()[0].html_body.contains("John"));
    }

    #[tokio::test]
    async fn 未登録テンプレートはリトライ不可のエラーとして返る() {
        let repo = MockUserRepository::new();
        let transport = MockMailTransport::new();
        let store = TeraTemplateStore::with_raw_templates(vec![("invitation.html", "<p>x</p>")])
            .unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(repo),
            Arc::new(transport),
            Arc::new(store),
            RateLimitPolicy::default(),
            Arc::new(FixedClock::new(fixed_now())),
        );

        let job = NotificationJob::new(
            Email::new("a@x.com").unwrap(),
            NotificationKind::Reminder,
            Map::new(),
        );
        let result = dispatcher.process(&job).await;

        let error = result.unwrap_err();
        assert!(matches!(
            error,
            NotificationError::TemplateNotFound { .. }
        ));
        assert!(!error.is_retryable());
    }
}
