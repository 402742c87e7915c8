use std::{process, sync::Arc};

use shopkeep::{
    application::{
        error::AppError,
        notify::{NotificationDispatcher, NotificationPublisher},
        records::RecordService,
        repos::{DocumentStore, RepoError},
    },
    cache::{CacheAside, CacheConfig},
    config,
    infra::{
        db::PostgresDocumentStore,
        error::InfraError,
        http::{self, HttpState},
        notify::{LogPublisher, WebhookPublisher},
        telemetry,
    },
};
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings).await?;
    tokio::time::timeout(settings.database.operation_timeout, store.health_check())
        .await
        .unwrap_or(Err(RepoError::Timeout))
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let (notifier, notifier_handle) = init_notifier(&settings)?;
    let state = build_http_state(store, notifier, &settings);

    let result = serve_http(&settings, state).await;

    // The router owned the last dispatcher handles; let the worker drain what is queued.
    if let Some(handle) = notifier_handle
        && tokio::time::timeout(settings.server.graceful_shutdown, handle)
            .await
            .is_err()
    {
        warn!(
            target = "shopkeep::notify",
            "notification worker did not drain before the shutdown deadline"
        );
    }

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_store(&settings).await?;
    info!(target = "shopkeep::migrate", "Migrations applied");
    Ok(())
}

async fn init_store(settings: &config::Settings) -> Result<Arc<PostgresDocumentStore>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresDocumentStore::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresDocumentStore::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresDocumentStore::new(pool)))
}

fn init_notifier(
    settings: &config::Settings,
) -> Result<(Option<NotificationDispatcher>, Option<JoinHandle<()>>), AppError> {
    let notifications = &settings.notifications;
    if !notifications.enabled {
        info!(target = "shopkeep::notify", "Notifications disabled");
        return Ok((None, None));
    }

    let publisher: Arc<dyn NotificationPublisher> = match notifications.webhook_url.as_ref() {
        Some(url) => {
            info!(target = "shopkeep::notify", endpoint = %url, "Publishing notifications to webhook");
            Arc::new(WebhookPublisher::new(url.clone(), notifications.request_timeout)?)
        }
        None => Arc::new(LogPublisher),
    };

    let (dispatcher, handle) = NotificationDispatcher::spawn(
        publisher,
        notifications.queue_capacity,
        notifications.topic.as_str(),
    );
    Ok((Some(dispatcher), Some(handle)))
}

fn build_http_state(
    store: Arc<PostgresDocumentStore>,
    notifier: Option<NotificationDispatcher>,
    settings: &config::Settings,
) -> HttpState {
    let store: Arc<dyn DocumentStore> = store;
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = CacheAside::from_config(&cache_config);
    let timeout = settings.database.operation_timeout;

    info!(
        target = "shopkeep::cache",
        enabled = cache_config.enabled,
        capacity = cache_config.capacity,
        ttl_seconds = cache_config.ttl_seconds,
        "Record cache configured"
    );

    HttpState {
        users: RecordService::new(store.clone(), cache.clone(), timeout).with_notifier_opt(notifier),
        products: RecordService::new(store.clone(), cache.clone(), timeout),
        orders: RecordService::new(store.clone(), cache, timeout),
        store,
        operation_timeout: timeout,
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, settings.cors.allowed_origin.clone());

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "shopkeep::http", addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "shopkeep::http", "Shutdown signal received");
}
