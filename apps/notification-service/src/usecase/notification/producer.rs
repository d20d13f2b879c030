//! # 通知ジョブの投入
//!
//! 通知種別ごとに型付けされたコンテキストを受け取り、ジョブとして
//! キューに登録する。投入成功はあくまで「受理」であり、配信の成否は
//! ワーカー側で決まる。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stellarsplit_domain::{
    notification::{NotificationJob, NotificationJobId, NotificationKind},
    user::Email,
};
use stellarsplit_infra::{
    error::InfraError,
    queue::{NotificationQueue, QueuedNotification},
};
use stellarsplit_shared::{event_log::event, log_business_event};

/// Split 招待のコンテキスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationContext {
    pub inviter_name:      String,
    pub split_description: String,
    pub amount:            f64,
    pub join_link:         String,
}

/// 支払いリマインドのコンテキスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderContext {
    pub participant_name:  String,
    pub split_description: String,
    pub amount_due:        f64,
    pub payment_link:      String,
}

/// 受領確認のコンテキスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationContext {
    pub amount:            f64,
    pub split_description: String,
    pub tx_hash:           String,
}

/// Split 完了のコンテキスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedContext {
    pub split_description: String,
    pub total_amount:      f64,
}

/// 通知ジョブの投入 API
///
/// 種別ごとのメソッドでコンテキストの型を固定し、テンプレート変数の
/// 渡し漏れをコンパイル時に防ぐ。
pub struct NotificationProducer {
    queue: Arc<dyn NotificationQueue>,
}

impl NotificationProducer {
    pub fn new(queue: Arc<dyn NotificationQueue>) -> Self {
        Self { queue }
    }

    /// Split 招待メールのジョブを投入する
    pub async fn send_invitation(
        &self,
        to: Email,
        context: InvitationContext,
    ) -> Result<NotificationJobId, InfraError> {
        self.enqueue_job(to, NotificationKind::Invitation, serde_json::to_value(&context)?)
            .await
    }

    /// 支払いリマインドメールのジョブを投入する
    pub async fn send_payment_reminder(
        &self,
        to: Email,
        context: ReminderContext,
    ) -> Result<NotificationJobId, InfraError> {
        self.enqueue_job(to, NotificationKind::Reminder, serde_json::to_value(&context)?)
            .await
    }

    /// 受領確認メールのジョブを投入する
    pub async fn send_payment_confirmation(
        &self,
        to: Email,
        context: ConfirmationContext,
    ) -> Result<NotificationJobId, InfraError> {
        self.enqueue_job(
            to,
            NotificationKind::Confirmation,
            serde_json::to_value(&context)?,
        )
        .await
    }

    /// Split 完了メールのジョブを投入する
    pub async fn send_split_completed(
        &self,
        to: Email,
        context: CompletedContext,
    ) -> Result<NotificationJobId, InfraError> {
        self.enqueue_job(to, NotificationKind::Completed, serde_json::to_value(&context)?)
            .await
    }

    async fn enqueue_job(
        &self,
        to: Email,
        kind: NotificationKind,
        context: serde_json::Value,
    ) -> Result<NotificationJobId, InfraError> {
        let serde_json::Value::Object(context) = context else {
            return Err(InfraError::unexpected(
                "通知コンテキストは JSON オブジェクトにシリアライズされる必要があります",
            ));
        };

        let job = NotificationJob::new(to, kind, context);
        let job_id = job.id.clone();
        let item = QueuedNotification::new(job);

        self.queue.enqueue(&item).await?;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_ENQUEUED,
            event.result = event::result::SUCCESS,
            notification.kind = %kind,
            notification.recipient = %item.job.recipient,
            notification.job_id = %job_id,
            "通知ジョブをキューに登録しました"
        );

        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stellarsplit_infra::queue::InMemoryNotificationQueue;

    use super::*;

    fn make_producer() -> (NotificationProducer, InMemoryNotificationQueue) {
        let queue = InMemoryNotificationQueue::new();
        let producer = NotificationProducer::new(Arc::new(queue.clone()));
        (producer, queue)
    }

    async fn take_one(queue: &InMemoryNotificationQueue) -> QueuedNotification {
        queue
            .dequeue(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("ジョブが投入されているはず")
    }

    #[tokio::test]
    async fn 招待ジョブがキャメルケースのコンテキストで投入される() {
        let (producer, queue) = make_producer();

        let job_id = producer
            .send_invitation(
                Email::new("friend@example.com").unwrap(),
                InvitationContext {
                    inviter_name:      "Alice".to_string(),
                    split_description: "Trip to Kyoto".to_string(),
                    amount:            120.0,
                    join_link:         "https://stellarsplit.com/join/xyz".to_string(),
                },
            )
            .await
            .unwrap();

        let item = take_one(&queue).await;
        assert_eq!(item.attempt, 0);
        assert_eq!(item.job.id, job_id);
        assert_eq!(item.job.recipient.as_str(), "friend@example.com");
        assert_eq!(item.job.kind, NotificationKind::Invitation);
        assert_eq!(
            serde_json::Value::Object(item.job.context),
            json!({
                "inviterName": "Alice",
                "splitDescription": "Trip to Kyoto",
                "amount": 120.0,
                "joinLink": "https://stellarsplit.com/join/xyz",
            })
        );
    }

    #[tokio::test]
    async fn リマインドジョブが投入される() {
        let (producer, queue) = make_producer();

        producer
            .send_payment_reminder(
                Email::new("bob@example.com").unwrap(),
                ReminderContext {
                    participant_name:  "Bob".to_string(),
                    split_description: "Dinner".to_string(),
                    amount_due:        42.5,
                    payment_link:      "https://stellarsplit.com/pay/abc".to_string(),
                },
            )
            .await
            .unwrap();

        let item = take_one(&queue).await;
        assert_eq!(item.job.kind, NotificationKind::Reminder);
        assert_eq!(
            serde_json::Value::Object(item.job.context),
            json!({
                "participantName": "Bob",
                "splitDescription": "Dinner",
                "amountDue": 42.5,
                "paymentLink": "https://stellarsplit.com/pay/abc",
            })
        );
    }

    #[tokio::test]
    async fn 受領確認ジョブが投入される() {
        let (producer, queue) = make_producer();

        producer
            .send_payment_confirmation(
                Email::new("carol@example.com").unwrap(),
                ConfirmationContext {
                    amount:            10.0,
                    split_description: "Groceries".to_string(),
                    tx_hash:           "0xabc123".to_string(),
                },
            )
            .await
            .unwrap();

        let item = take_one(&queue).await;
        assert_eq!(item.job.kind, NotificationKind::Confirmation);
        assert_eq!(
            serde_json::Value::Object(item.job.context),
            json!({
                "amount": 10.0,
                "splitDescription": "Groceries",
                "txHash": "0xabc123",
            })
        );
    }

    #[tokio::test]
    async fn 完了ジョブが投入される() {
        let (producer, queue) = make_producer();

        producer
            .send_split_completed(
                Email::new("dave@example.com").unwrap(),
                CompletedContext {
                    split_description: "Office lunch".to_string(),
                    total_amount:      88.8,
                },
            )
            .await
            .unwrap();

        let item = take_one(&queue).await;
        assert_eq!(item.job.kind, NotificationKind::Completed);
        assert_eq!(
            serde_json::Value::Object(item.job.context),
            json!({
                "splitDescription": "Office lunch",
                "totalAmount": 88.8,
            })
        );
    }

    #[tokio::test]
    async fn ジョブごとに異なるidが払い出される() {
        let (producer, queue) = make_producer();
        let context = CompletedContext {
            split_description: "x".to_string(),
            total_amount:      1.0,
        };

        let first = producer
            .send_split_completed(Email::new("a@x.com").unwrap(), context.clone())
            .await
            .unwrap();
        let second = producer
            .send_split_completed(Email::new("a@x.com").unwrap(), context)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(take_one(&queue).await.job.id, first);
        assert_eq!(take_one(&queue).await.job.id, second);
    }
}
