//! # Notification Service サーバー
//!
//! メール通知の受付・配信を担当する内部 API サーバー。
//!
//! ## 役割
//!
//! Notification Service は通知ドメインを専門的に担当する:
//!
//! - **通知の受付**: 他サービスからの enqueue API（202 Accepted で即時応答）
//! - **非同期配信**: バックグラウンドワーカーがキューを消費してメール送信
//! - **通知設定管理**: 受信者ごとの種別別オプトアウトの参照・更新
//!
//! ## アーキテクチャ
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  他サービス  │────▶│ Notification │────▶│    Queue     │
//! │  (Core 等)   │     │   Service    │     │(Redis/Memory)│
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                  │
//!                                           ┌──────▼───────┐
//!                                           │DispatchWorker│──▶ SMTP / SES
//!                                           └──────────────┘
//! ```
//!
//! ## アクセス制御
//!
//! Notification Service は内部ネットワークからのみアクセス可能とする。
//! 外部に公開する API は持たない。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `PORT` | No | ポート番号（デフォルト: `8083`） |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `QUEUE_BACKEND` | No | `redis` \| `memory`（デフォルト: `memory`） |
//! | `REDIS_URL` | No | Redis 接続 URL |
//! | `NOTIFICATION_BACKEND` | No | `smtp` \| `ses` \| `noop`（デフォルト: `noop`） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | SMTP 接続先（デフォルト: Mailpit） |
//! | `SMTP_USER` / `SMTP_PASSWORD` | No | SMTP 認証情報（両方指定時のみ使用） |
//! | `NOTIFICATION_FROM_ADDRESS` | No | 送信元メールアドレス |
//! | `NOTIFICATION_COOLDOWN_MS` | No | 受信者単位のクールダウン（デフォルト: `60000`） |
//! | `WORKER_CONCURRENCY` | No | ワーカーの同時配信数（デフォルト: `4`） |
//! | `NOTIFICATION_MAX_ATTEMPTS` | No | 配信の最大試行回数（デフォルト: `3`） |
//! | `NOTIFICATION_RETRY_BASE_MS` | No | 再試行バックオフ初期値（デフォルト: `1000`） |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env ファイルを使用）
//! cargo run -p stellarsplit-notification-service
//!
//! # 本番環境（環境変数を直接指定）
//! PORT=8083 DATABASE_URL=postgres://... QUEUE_BACKEND=redis \
//!   NOTIFICATION_BACKEND=ses cargo run -p stellarsplit-notification-service --release
//! ```

mod config;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use config::AppConfig;
use handler::{
    NotificationState,
    PreferenceState,
    ReadinessState,
    get_preferences,
    health_check,
    readiness_check,
    send_completed,
    send_confirmation,
    send_invitation,
    send_reminder,
    update_preferences,
};
use stellarsplit_domain::{clock::SystemClock, rate_limit::RateLimitPolicy};
use stellarsplit_infra::{
    MailTransport,
    NoopMailTransport,
    NotificationQueue,
    SesMailTransport,
    SmtpMailTransport,
    db,
    mail,
    queue::{InMemoryNotificationQueue, RedisNotificationQueue},
    repository::{PostgresUserRepository, UserRepository},
};
use stellarsplit_notification_service::{handler, usecase};
use stellarsplit_shared::observability::TracingConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use usecase::{
    DispatchWorker,
    Dispatcher,
    NotificationProducer,
    PreferenceUseCaseImpl,
    RetryPolicy,
    TemplateStore,
    TeraTemplateStore,
};

/// Notification Service サーバーのエントリーポイント
///
/// 以下の順序で初期化を行う:
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. アプリケーション設定の読み込み
/// 4. キュー・トランスポートのバックエンド選択
/// 5. 配信ワーカーの起動
/// 6. HTTP サーバーの起動
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    let tracing_config = TracingConfig::from_env("notification-service");
    stellarsplit_shared::observability::init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "notification-service").entered();

    // 設定読み込み
    let config = AppConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "Notification Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    tracing::info!("データベースに接続しました");

    // マイグレーション実行
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの実行に失敗しました");
    tracing::info!("マイグレーションを適用しました");

    // 通知キューを初期化（QUEUE_BACKEND で切り替え）
    let queue: Arc<dyn NotificationQueue> = match config.queue.backend.as_str() {
        "redis" => {
            let queue = RedisNotificationQueue::new(&config.queue.redis_url)
                .await
                .expect("Redis への接続に失敗しました");
            tracing::info!("Redis キューに接続しました");
            Arc::new(queue)
        }
        "memory" => {
            tracing::warn!("インメモリキューを使用します（再起動で未処理ジョブは失われます）");
            Arc::new(InMemoryNotificationQueue::new())
        }
        other => anyhow::bail!("未知の QUEUE_BACKEND です: {other}"),
    };

    // メールトランスポートを初期化（NOTIFICATION_BACKEND で切り替え）
    let mail_transport: Arc<dyn MailTransport> = match config.notification.backend.as_str() {
        "smtp" => {
            let notification = &config.notification;
            let transport = match (&notification.smtp_user, &notification.smtp_password) {
                (Some(user), Some(password)) => SmtpMailTransport::with_credentials(
                    &notification.smtp_host,
                    notification.smtp_port,
                    user.clone(),
                    password.clone(),
                    notification.from_address.clone(),
                ),
                _ => SmtpMailTransport::new(
                    &notification.smtp_host,
                    notification.smtp_port,
                    notification.from_address.clone(),
                ),
            };
            tracing::info!(
                "SMTP トランスポートを使用します: {}:{}",
                notification.smtp_host,
                notification.smtp_port
            );
            Arc::new(transport)
        }
        "ses" => {
            let client = mail::create_ses_client().await;
            tracing::info!("SES トランスポートを使用します");
            Arc::new(SesMailTransport::new(
                client,
                config.notification.from_address.clone(),
            ))
        }
        "noop" => {
            tracing::warn!("Noop トランスポートを使用します（メールは送信されません）");
            Arc::new(NoopMailTransport)
        }
        other => anyhow::bail!("未知の NOTIFICATION_BACKEND です: {other}"),
    };

    // Readiness Check 用 State（pool と queue が move される前に clone）
    let readiness_state = Arc::new(ReadinessState {
        pool:  pool.clone(),
        queue: Arc::clone(&queue),
    });

    // 依存コンポーネントを初期化
    let user_repository: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool));
    let template_store: Arc<dyn TemplateStore> =
        Arc::new(TeraTemplateStore::new().expect("メールテンプレートの初期化に失敗しました"));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&user_repository),
        mail_transport,
        template_store,
        RateLimitPolicy::from_millis(config.notification.cooldown_ms),
        Arc::new(SystemClock),
    ));

    // 配信ワーカーを起動
    let shutdown = CancellationToken::new();
    let retry_policy = RetryPolicy {
        max_attempts:    config.worker.max_attempts,
        initial_backoff: Duration::from_millis(config.worker.retry_base_ms),
        ..RetryPolicy::default()
    };
    let worker = DispatchWorker::new(
        Arc::clone(&queue),
        dispatcher,
        retry_policy,
        config.worker.concurrency,
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let notification_state = Arc::new(NotificationState {
        producer: NotificationProducer::new(queue),
    });
    let preference_state = Arc::new(PreferenceState {
        usecase: PreferenceUseCaseImpl::new(user_repository),
    });

    // ルーター構築
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        .merge(
            Router::new()
                .route("/internal/notifications/invitation", post(send_invitation))
                .route("/internal/notifications/reminder", post(send_reminder))
                .route(
                    "/internal/notifications/confirmation",
                    post(send_confirmation),
                )
                .route("/internal/notifications/completed", post(send_completed))
                .with_state(notification_state),
        )
        .merge(
            Router::new()
                .route(
                    "/internal/notifications/preferences/{user_id}",
                    get(get_preferences).patch(update_preferences),
                )
                .with_state(preference_state),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Notification Service サーバーが起動しました: {}", addr);

    // シグナル受信でワーカーへキャンセルを伝播し、API の受付を止める
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // 処理中のジョブと保留中の再試行の退避が終わるまで待つ
    worker_handle.await?;
    tracing::info!("Notification Service サーバーを停止しました");

    Ok(())
}

/// シャットダウンシグナルを待ち、ワーカーへキャンセルを伝播する
///
/// SIGINT（Ctrl+C）と SIGTERM の両方を受け付ける。
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("SIGTERM ハンドラの登録に失敗しました");

        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await.expect("SIGINT ハンドラの登録に失敗しました");

    tracing::info!("シャットダウンシグナルを受信しました");
    shutdown.cancel();
}
