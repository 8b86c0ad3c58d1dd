use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use lanehaul_core::config::{AppConfig, ConfigError, EmailConfig, LoadOptions, SmsConfig};
use lanehaul_db::repositories::{
    SqlNotificationRepository, SqlPartyRepository, SqlQuoteRequestRepository,
    SqlQuoteResponseRepository, SqlShipmentRepository, SqlSyncQueueRepository,
};
use lanehaul_db::{connect_with_settings, migrations, BookingLifecycle, DbPool};
use lanehaul_notify::{
    DispatcherHandle, EmailGateway, HttpEmailGateway, HttpSmsGateway, NoopEmailGateway,
    NoopSmsGateway, NotificationDispatcher, SmsGateway,
};

use crate::auth::AuthVerifier;
use crate::fanout::SqlInAppSink;
use crate::{health, notifications, quotes, transporter};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub lifecycle: Arc<BookingLifecycle>,
    pub quote_requests: Arc<SqlQuoteRequestRepository>,
    pub quote_responses: Arc<SqlQuoteResponseRepository>,
    pub shipments: Arc<SqlShipmentRepository>,
    pub notifications: Arc<SqlNotificationRepository>,
    pub sync_queue: Arc<SqlSyncQueueRepository>,
    pub dispatcher: DispatcherHandle,
    pub auth: Arc<AuthVerifier>,
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
    pub dispatcher_task: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let email = email_gateway(&config.email);
    let sms = sms_gateway(&config.sms);

    let (state, dispatcher_task) = assemble_state(
        db_pool.clone(),
        config.consent.sla_minutes,
        &config.auth.token_secret,
        email,
        sms,
    );

    Ok(Application { config, db_pool, state, dispatcher_task })
}

/// Wire the shared state and spawn the dispatcher. Split out so tests can
/// supply recording gateways over an in-memory pool.
pub fn assemble_state(
    db_pool: DbPool,
    consent_sla_minutes: i64,
    token_secret: &SecretString,
    email: Arc<dyn EmailGateway>,
    sms: Arc<dyn SmsGateway>,
) -> (AppState, JoinHandle<()>) {
    let in_app = SqlInAppSink::new(
        SqlNotificationRepository::new(db_pool.clone()),
        SqlPartyRepository::new(db_pool.clone()),
    );
    let (dispatcher, handle) = NotificationDispatcher::new(Arc::new(in_app), email, sms);
    let dispatcher_task = dispatcher.spawn();

    let state = AppState {
        db_pool: db_pool.clone(),
        lifecycle: Arc::new(BookingLifecycle::new(db_pool.clone(), consent_sla_minutes)),
        quote_requests: Arc::new(SqlQuoteRequestRepository::new(db_pool.clone())),
        quote_responses: Arc::new(SqlQuoteResponseRepository::new(db_pool.clone())),
        shipments: Arc::new(SqlShipmentRepository::new(db_pool.clone())),
        notifications: Arc::new(SqlNotificationRepository::new(db_pool.clone())),
        sync_queue: Arc::new(SqlSyncQueueRepository::new(db_pool.clone())),
        dispatcher: handle,
        auth: Arc::new(AuthVerifier::new(token_secret)),
    };

    (state, dispatcher_task)
}

fn email_gateway(config: &EmailConfig) -> Arc<dyn EmailGateway> {
    match (&config.api_url, &config.api_key) {
        (Some(api_url), Some(api_key)) if config.enabled => Arc::new(HttpEmailGateway::new(
            api_url.clone(),
            api_key.clone(),
            config.from_address.clone(),
        )),
        _ => Arc::new(NoopEmailGateway),
    }
}

fn sms_gateway(config: &SmsConfig) -> Arc<dyn SmsGateway> {
    match (&config.api_url, &config.api_key) {
        (Some(api_url), Some(api_key)) if config.enabled => Arc::new(HttpSmsGateway::new(
            api_url.clone(),
            api_key.clone(),
            config.sender_id.clone(),
        )),
        _ => Arc::new(NoopSmsGateway),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(quotes::router(state.clone()))
        .merge(transporter::router(state.clone()))
        .merge(notifications::router(state))
}
