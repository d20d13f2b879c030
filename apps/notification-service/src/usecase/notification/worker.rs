//! # 配信ワーカー
//!
//! キューを消費して配信パイプラインを駆動する。
//!
//! ## 設計方針
//!
//! - **有界並行**: `Semaphore` で同時配信数を制限する。取得待ちの間は
//!   新しいジョブを取り出さない（バックプレッシャー）
//! - **再試行はループを塞がない**: バックオフ待ちは独立タスクで行い、
//!   経過後に試行回数を進めて再投入する
//! - **デッドレターなし**: リトライ不能または上限到達のジョブは
//!   ログに記録して破棄する

use std::sync::Arc;
use std::time::Duration;

use stellarsplit_domain::notification::NotificationError;
use stellarsplit_infra::queue::{NotificationQueue, QueuedNotification};
use stellarsplit_shared::{event_log::event, log_business_event};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::Dispatcher;

/// キューが空のときの待ち受け時間
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// 再試行ポリシー
///
/// バックオフは `initial_backoff * 2^attempt`（上限 `max_backoff`）。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 初回を含む最大試行回数
    pub max_attempts:    u32,
    /// 初回失敗後のバックオフ
    pub initial_backoff: Duration,
    /// バックオフの上限
    pub max_backoff:     Duration,
}

impl RetryPolicy {
    /// attempt 回目（0 始まり）の失敗後に待つ時間を返す
    pub fn backoff(&self, attempt: u32) -> Duration {
        // 2^attempt はシフトで計算し、32 以上は飽和させて上限に丸める
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:    3,
            initial_backoff: Duration::from_secs(1),
            max_backoff:     Duration::from_secs(60),
        }
    }
}

/// 配信ワーカー
///
/// 1 プロセスに 1 つ起動し、`run()` を `tokio::spawn` で回す。
pub struct DispatchWorker {
    queue:       Arc<dyn NotificationQueue>,
    dispatcher:  Arc<Dispatcher>,
    retry:       RetryPolicy,
    semaphore:   Arc<Semaphore>,
    concurrency: u32,
    shutdown:    CancellationToken,
}

impl DispatchWorker {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        dispatcher: Arc<Dispatcher>,
        retry: RetryPolicy,
        concurrency: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            retry,
            semaphore: Arc::new(Semaphore::new(concurrency as usize)),
            concurrency,
            shutdown,
        }
    }

    /// 消費ループ
    ///
    /// キャンセル後は新規ジョブの取得を止め、処理中のジョブの完了を
    /// 待ってから戻る。
    pub async fn run(self) {
        tracing::info!(concurrency = self.concurrency, "配信ワーカーを開始します");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                dequeued = self.queue.dequeue(DEQUEUE_TIMEOUT) => match dequeued {
                    Ok(Some(item)) => self.handle(item).await,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(
                            error.category = "infrastructure",
                            error.kind = "queue",
                            error = %e,
                            "キューからの取得に失敗しました"
                        );
                        // 接続障害時にホットループへ陥らないよう間を置く
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }

        // 処理中のジョブが permit を返すまで待つ
        let _ = self.semaphore.acquire_many(self.concurrency).await;
        tracing::info!("配信ワーカーを停止しました");
    }

    /// ジョブ 1 件を同時実行数の範囲内で処理する
    async fn handle(&self, item: QueuedNotification) {
        let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            // Semaphore は close しないため到達しない
            return;
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let queue = Arc::clone(&self.queue);
        let retry = self.retry.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = dispatcher.process(&item.job).await {
                handle_failure(queue, retry, shutdown, item, e);
            }
        });
    }
}

/// 配信失敗時の再試行判定
///
/// 再試行する場合、バックオフ待ちはコンシュームループおよび permit と
/// 切り離したタスクで行う。シャットダウン時は待たずに即座へ再投入し、
/// ジョブをキューに残す。
fn handle_failure(
    queue: Arc<dyn NotificationQueue>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
    item: QueuedNotification,
    error: NotificationError,
) {
    if error.is_retryable() && item.attempt + 1 < retry.max_attempts {
        let delay = retry.backoff(item.attempt);
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_FAILED,
            event.result = event::result::FAILURE,
            notification.kind = %item.job.kind,
            notification.job_id = %item.job.id,
            notification.attempt = item.attempt,
            retry.delay_ms = delay.as_millis() as u64,
            error = %error,
            "配信に失敗したため再試行を予約します"
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }

            let next = item.next_attempt();
            if let Err(e) = queue.enqueue(&next).await {
                tracing::error!(
                    error.category = "infrastructure",
                    error.kind = "queue",
                    error = %e,
                    job_id = %next.job.id,
                    "再試行ジョブの投入に失敗しました"
                );
            }
        });
    } else {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_DROPPED,
            event.result = event::result::FAILURE,
            notification.kind = %item.job.kind,
            notification.job_id = %item.job.id,
            notification.attempt = item.attempt,
            error = %error,
            "リトライ不能または上限到達のため通知ジョブを破棄します"
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stellarsplit_domain::{
        clock::SystemClock,
        notification::{NotificationJob, NotificationKind},
        rate_limit::RateLimitPolicy,
        user::Email,
    };
    use stellarsplit_infra::{
        mock::{MockMailTransport, MockUserRepository},
        queue::InMemoryNotificationQueue,
    };

    use super::*;
    use crate::usecase::notification::TeraTemplateStore;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts:    3,
            initial_backoff: Duration::from_millis(10),
            max_backoff:     Duration::from_millis(50),
        }
    }

    fn make_dispatcher(transport: MockMailTransport) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(transport),
            Arc::new(TeraTemplateStore::new().unwrap()),
            RateLimitPolicy::default(),
            Arc::new(SystemClock),
        ))
    }

    fn completed_job(to: &str) -> QueuedNotification {
        let context = match json!({ "splitDescription": "Dinner", "totalAmount": 10.0 }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        QueuedNotification::new(NotificationJob::new(
            Email::new(to).unwrap(),
            NotificationKind::Completed,
            context,
        ))
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("条件が時間内に満たされませんでした");
    }

    #[tokio::test]
    async fn キューのジョブが配信される() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            make_dispatcher(transport.clone()),
            fast_retry(),
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        wait_for(|| transport.sent_count() == 1).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(transport.sent_count(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn リトライ可能な失敗は再試行されて成功する() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();
        transport.fail_next(1);

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            make_dispatcher(transport.clone()),
            fast_retry(),
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // 1 回目は失敗し、バックオフ後の 2 回目で届く
        wait_for(|| transport.sent_count() == 1).await;

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn リトライ不能な失敗は再試行されず破棄される() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();

        // completed テンプレートを持たないストアで TemplateNotFound を誘発する
        let store = TeraTemplateStore::with_raw_templates(vec![("invitation.html", "<p>x</p>")])
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(transport.clone()),
            Arc::new(store),
            RateLimitPolicy::default(),
            Arc::new(SystemClock),
        ));

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            dispatcher,
            fast_retry(),
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        wait_for(|| queue.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(transport.sent_count(), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn リトライ上限に達したジョブは破棄される() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();
        transport.fail_next(10);

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            make_dispatcher(transport.clone()),
            fast_retry(),
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // 3 回の試行（10ms + 20ms のバックオフ）が完了するのを待つ
        tokio::time::sleep(Duration::from_millis(300)).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(transport.sent_count(), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn シャットダウン後は新規ジョブを取得しない() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            make_dispatcher(transport.clone()),
            fast_retry(),
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ワーカーが停止するはず")
            .unwrap();

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.sent_count(), 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn シャットダウン時は保留中の再試行が即座に再投入される() {
        let queue = InMemoryNotificationQueue::new();
        let transport = MockMailTransport::new();
        let shutdown = CancellationToken::new();
        transport.fail_next(1);

        // バックオフを長くして、再試行がスリープ中の状態を作る
        let slow_retry = RetryPolicy {
            max_attempts:    3,
            initial_backoff: Duration::from_secs(60),
            max_backoff:     Duration::from_secs(60),
        };

        queue.enqueue(&completed_job("a@x.com")).await.unwrap();

        let worker = DispatchWorker::new(
            Arc::new(queue.clone()),
            make_dispatcher(transport.clone()),
            slow_retry,
            4,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // 1 回目の失敗が処理されるまで待つ
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        wait_for(|| !queue.is_empty()).await;
        let item = queue
            .dequeue(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("再投入されたジョブがあるはず");
        assert_eq!(item.attempt, 1);
    }

    #[test]
    fn バックオフは指数的に増加する() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn バックオフは上限で頭打ちになる() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(6), Duration::from_secs(60));
        assert_eq!(policy.backoff(31), Duration::from_secs(60));
        // シフトが飽和する領域でも落ちない
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn 既定の再試行ポリシー() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
        assert_eq!(policy.max_backoff, Duration::from_secs(60));
    }
}
